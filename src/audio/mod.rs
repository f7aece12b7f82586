//! Audio engine for mixer playback.
//!
//! This module provides per-track synthesis and mixing with audio output
//! via rodio. It supports:
//! - A fixed table of built-in synthesized instruments
//! - SoundFont presets played through rustysynth
//! - Per-track channels with volume, mute and solo
//! - A shared transport with play, pause, stop and seek

pub mod builtin;
pub mod channel;
pub mod engine;
pub mod graph;
pub mod part;
pub mod soundfont;
pub mod voice;

pub use builtin::BuiltinInstrument;
pub use channel::{Channel, MAX_VOLUME_DB, MIN_VOLUME_DB};
pub use engine::{AudioEngine, SAMPLE_RATE};
pub use graph::TransportState;
pub use soundfont::{PresetBank, PresetInfo, SoundFontBank, SoundFontError};
pub use voice::Voice;
