//! Audio engine for mixer playback.
//!
//! Owns the shared [`MixGraph`] and, unless running offline, a rodio
//! output stream pulling stereo samples from it on the audio thread.

use super::channel::Channel;
use super::graph::{MixGraph, TransportState};
use super::voice::Voice;
use crate::midi::MidiTrack;
use anyhow::{Context, Result};
use rodio::{OutputStream, OutputStreamHandle, Source};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::info;

/// Sample rate for audio synthesis (44.1 kHz standard).
pub const SAMPLE_RATE: u32 = 44100;

/// Frames pulled from the graph per lock on the audio thread.
const BUFFER_SIZE: usize = 256;

/// Audio source that renders the mix graph.
/// Implements rodio's Source trait for playback.
struct GraphSource {
    graph: Arc<Mutex<MixGraph>>,
    left_buf: Vec<f32>,
    right_buf: Vec<f32>,
    buf_pos: usize,
    /// Current channel (0 = left, 1 = right).
    channel: usize,
}

impl GraphSource {
    fn new(graph: Arc<Mutex<MixGraph>>) -> Self {
        Self {
            graph,
            left_buf: vec![0.0; BUFFER_SIZE],
            right_buf: vec![0.0; BUFFER_SIZE],
            buf_pos: BUFFER_SIZE, // Start at end to trigger first render
            channel: 0,
        }
    }
}

impl Iterator for GraphSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.buf_pos >= BUFFER_SIZE {
            if let Ok(mut graph) = self.graph.lock() {
                graph.render(&mut self.left_buf, &mut self.right_buf);
            } else {
                self.left_buf.fill(0.0);
                self.right_buf.fill(0.0);
            }
            self.buf_pos = 0;
        }

        // Interleave stereo samples: L, R, L, R, ...
        let sample = if self.channel == 0 {
            self.left_buf[self.buf_pos]
        } else {
            self.right_buf[self.buf_pos]
        };

        self.channel = 1 - self.channel;
        if self.channel == 0 {
            self.buf_pos += 1;
        }

        Some(sample)
    }
}

impl Source for GraphSource {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        2
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

/// The mixer's audio engine.
///
/// Every method takes the graph lock briefly; the audio thread holds it
/// only while rendering one buffer.
pub struct AudioEngine {
    graph: Arc<Mutex<MixGraph>>,
    /// Audio output stream (must be kept alive).
    _stream: Option<OutputStream>,
    _stream_handle: Option<OutputStreamHandle>,
    sample_rate: u32,
}

impl AudioEngine {
    /// Opens the default audio output and starts pulling from the graph.
    ///
    /// # Errors
    ///
    /// Returns error if the audio output cannot be initialized.
    pub fn new() -> Result<Self> {
        let graph = Arc::new(Mutex::new(MixGraph::new(SAMPLE_RATE)));

        let (stream, stream_handle) =
            OutputStream::try_default().context("Failed to open audio output")?;
        stream_handle
            .play_raw(GraphSource::new(Arc::clone(&graph)))
            .context("Failed to start audio playback")?;
        info!("Audio output opened at {} Hz", SAMPLE_RATE);

        Ok(Self {
            graph,
            _stream: Some(stream),
            _stream_handle: Some(stream_handle),
            sample_rate: SAMPLE_RATE,
        })
    }

    /// Creates an engine with no output device.
    ///
    /// The graph only advances when [`AudioEngine::render`] or
    /// [`AudioEngine::advance`] is called.
    pub fn offline(sample_rate: u32) -> Self {
        Self {
            graph: Arc::new(Mutex::new(MixGraph::new(sample_rate))),
            _stream: None,
            _stream_handle: None,
            sample_rate,
        }
    }

    /// Whether samples are going to a device.
    pub fn has_output(&self) -> bool {
        self._stream.is_some()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn graph(&self) -> MutexGuard<'_, MixGraph> {
        // A panic on the audio thread must not take the UI down with it
        self.graph.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Renders frames directly from the graph (offline use).
    pub fn render(&self, left: &mut [f32], right: &mut [f32]) {
        self.graph().render(left, right);
    }

    /// Renders and discards `elapsed` worth of frames.
    ///
    /// Keeps the transport of an offline engine moving in real time. Does
    /// nothing when a device is pulling samples.
    pub fn advance(&self, elapsed: Duration) {
        if self.has_output() {
            return;
        }
        let mut frames = (elapsed.as_secs_f64() * self.sample_rate as f64).round() as usize;
        let mut left = [0.0f32; BUFFER_SIZE];
        let mut right = [0.0f32; BUFFER_SIZE];
        let mut graph = self.graph();
        while frames > 0 {
            let n = frames.min(BUFFER_SIZE);
            graph.render(&mut left[..n], &mut right[..n]);
            frames -= n;
        }
    }

    // ---- Tracks ----

    /// Adds a track node with its voice and channel.
    pub fn add_track(&self, track: &MidiTrack, voice: Box<dyn Voice>, channel: Channel) {
        self.graph().add_track(track, voice, channel);
    }

    /// Silences and removes a track node.
    pub fn remove_track(&self, index: usize) -> bool {
        self.graph().remove_track(index)
    }

    /// Drops every track's scheduled events.
    pub fn cancel_parts(&self) {
        self.graph().cancel_parts();
    }

    pub fn track_count(&self) -> usize {
        self.graph().track_count()
    }

    pub fn track_indices(&self) -> Vec<usize> {
        self.graph().track_indices()
    }

    /// Swaps a track's voice.
    pub fn replace_voice(&self, index: usize, voice: Box<dyn Voice>) -> bool {
        self.graph().replace_voice(index, voice)
    }

    /// Name of a track's current voice.
    pub fn voice_name(&self, index: usize) -> Option<String> {
        self.graph()
            .node(index)
            .map(|n| n.voice().name().to_string())
    }

    /// Copy of a track's channel.
    pub fn channel(&self, index: usize) -> Option<Channel> {
        self.graph().channel(index).copied()
    }

    /// Mutates a track's channel in place.
    pub fn update_channel(&self, index: usize, f: impl FnOnce(&mut Channel)) -> bool {
        match self.graph().channel_mut(index) {
            Some(channel) => {
                f(channel);
                true
            }
            None => false,
        }
    }

    /// Whether each listed track triggered a note within `hold` seconds.
    pub fn active_tracks(&self, indices: &[usize], hold: f64) -> Vec<bool> {
        let graph = self.graph();
        indices.iter().map(|&i| graph.track_active(i, hold)).collect()
    }

    // ---- Transport ----

    pub fn set_duration(&self, seconds: f64) {
        self.graph().set_duration(seconds);
    }

    pub fn duration_seconds(&self) -> f64 {
        self.graph().duration_seconds()
    }

    pub fn start(&self) {
        self.graph().start();
    }

    pub fn pause(&self) {
        self.graph().pause();
    }

    pub fn stop(&self) {
        self.graph().stop();
    }

    pub fn seek(&self, seconds: f64) {
        self.graph().seek(seconds);
    }

    pub fn state(&self) -> TransportState {
        self.graph().state()
    }

    pub fn is_playing(&self) -> bool {
        self.graph().is_playing()
    }

    pub fn position_seconds(&self) -> f64 {
        self.graph().position_seconds()
    }
}
