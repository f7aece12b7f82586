//! midimix - A terminal MIDI file player with a per-track mixer.
//!
//! This library provides the decoding, audio and mixer core of the app.

pub mod app;
pub mod audio;
pub mod config;
pub mod ingest;
pub mod midi;
pub mod mixer;
pub mod ui;

// Re-export commonly used types
pub use app::App;
pub use audio::{AudioEngine, BuiltinInstrument, SoundFontBank};
pub use midi::{decode_midi, Song};
pub use mixer::Mixer;
