//! The mix graph: one node per track, summed into a stereo output.
//!
//! Rendering happens in fixed blocks. At the start of each block every
//! node's part dispatches its events that fall inside the block to the
//! node's voice, then each voice renders and is summed through its
//! channel gains. Event timing is therefore block-granular.

use super::channel::Channel;
use super::part::{Part, PartEventKind};
use super::voice::Voice;
use crate::midi::MidiTrack;
use std::collections::BTreeMap;
use tracing::debug;

/// Frames rendered per block; also the event timing granularity.
pub const BLOCK_SIZE: usize = 64;

/// Transport state of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// Not playing, position at the start.
    Stopped,
    /// Advancing and dispatching note events.
    Playing,
    /// Holding the current position.
    Paused,
}

/// One track's audio objects.
pub struct TrackNode {
    voice: Box<dyn Voice>,
    channel: Channel,
    part: Part,
    /// Sample position of the most recent note-on.
    last_trigger: Option<u64>,
}

impl TrackNode {
    pub fn voice(&self) -> &dyn Voice {
        self.voice.as_ref()
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn part(&self) -> &Part {
        &self.part
    }
}

/// Track nodes plus the shared transport clock.
pub struct MixGraph {
    sample_rate: u32,
    nodes: BTreeMap<usize, TrackNode>,
    state: TransportState,
    /// Transport position in samples.
    position: u64,
    /// Song length in samples.
    duration: u64,
    scratch_left: Vec<f32>,
    scratch_right: Vec<f32>,
    block_left: Vec<f32>,
    block_right: Vec<f32>,
    block_pos: usize,
}

impl MixGraph {
    /// Creates an empty, stopped graph.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            nodes: BTreeMap::new(),
            state: TransportState::Stopped,
            position: 0,
            duration: 0,
            scratch_left: vec![0.0; BLOCK_SIZE],
            scratch_right: vec![0.0; BLOCK_SIZE],
            block_left: vec![0.0; BLOCK_SIZE],
            block_right: vec![0.0; BLOCK_SIZE],
            block_pos: BLOCK_SIZE,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn to_samples(&self, seconds: f64) -> u64 {
        (seconds.max(0.0) * self.sample_rate as f64).round() as u64
    }

    /// Adds a node for a track, replacing any node with the same index.
    ///
    /// The part is aligned with the current transport position.
    pub fn add_track(&mut self, track: &MidiTrack, voice: Box<dyn Voice>, channel: Channel) {
        let mut part = Part::from_track(track, self.sample_rate);
        part.seek(self.position);
        self.nodes.insert(
            track.index,
            TrackNode {
                voice,
                channel,
                part,
                last_trigger: None,
            },
        );
    }

    /// Silences and removes one node.
    pub fn remove_track(&mut self, index: usize) -> bool {
        match self.nodes.remove(&index) {
            Some(mut node) => {
                node.voice.all_notes_off(true);
                true
            }
            None => false,
        }
    }

    /// Drops the scheduled events of every node.
    pub fn cancel_parts(&mut self) {
        for node in self.nodes.values_mut() {
            node.part.cancel();
        }
    }

    /// Silences and removes every node.
    pub fn clear(&mut self) {
        let indices: Vec<usize> = self.nodes.keys().copied().collect();
        for index in indices {
            self.remove_track(index);
        }
        self.duration = 0;
    }

    pub fn track_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, index: usize) -> Option<&TrackNode> {
        self.nodes.get(&index)
    }

    pub fn track_indices(&self) -> Vec<usize> {
        self.nodes.keys().copied().collect()
    }

    /// Installs a new voice on a track, silencing the previous one.
    ///
    /// The part keeps its cursor, so later notes go to the new voice.
    pub fn replace_voice(&mut self, index: usize, voice: Box<dyn Voice>) -> bool {
        match self.nodes.get_mut(&index) {
            Some(node) => {
                node.voice.all_notes_off(true);
                node.voice = voice;
                true
            }
            None => false,
        }
    }

    /// Returns a track's channel.
    pub fn channel(&self, index: usize) -> Option<&Channel> {
        self.nodes.get(&index).map(|n| &n.channel)
    }

    /// Returns a track's channel for mutation.
    pub fn channel_mut(&mut self, index: usize) -> Option<&mut Channel> {
        self.nodes.get_mut(&index).map(|n| &mut n.channel)
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    /// Sets the song length used to clamp seeks.
    pub fn set_duration(&mut self, seconds: f64) {
        self.duration = self.to_samples(seconds);
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration as f64 / self.sample_rate as f64
    }

    pub fn position_seconds(&self) -> f64 {
        self.position as f64 / self.sample_rate as f64
    }

    /// Starts or resumes playback from the current position.
    pub fn start(&mut self) {
        self.state = TransportState::Playing;
        debug!("Transport started at {:.2}s", self.position_seconds());
    }

    /// Pauses playback, letting sounding notes release.
    pub fn pause(&mut self) {
        if self.state != TransportState::Playing {
            return;
        }
        self.state = TransportState::Paused;
        for node in self.nodes.values_mut() {
            node.voice.all_notes_off(false);
        }
        debug!("Transport paused at {:.2}s", self.position_seconds());
    }

    /// Stops playback, silences every voice and rewinds to the start.
    pub fn stop(&mut self) {
        self.state = TransportState::Stopped;
        self.position = 0;
        for node in self.nodes.values_mut() {
            node.voice.all_notes_off(true);
            node.part.seek(0);
            node.last_trigger = None;
        }
        debug!("Transport stopped");
    }

    /// Moves the transport to `seconds`, clamped to the song length.
    pub fn seek(&mut self, seconds: f64) {
        let target = if seconds.is_nan() {
            0
        } else {
            self.to_samples(seconds).min(self.duration)
        };
        self.position = target;
        for node in self.nodes.values_mut() {
            node.voice.all_notes_off(false);
            node.part.seek(target);
        }
        debug!("Transport seek to {:.2}s", self.position_seconds());
    }

    /// Whether a track triggered a note within the last `hold` seconds.
    pub fn track_active(&self, index: usize, hold: f64) -> bool {
        let hold = self.to_samples(hold);
        self.nodes
            .get(&index)
            .and_then(|n| n.last_trigger)
            .is_some_and(|t| t <= self.position && self.position - t < hold)
    }

    /// Renders one block of `BLOCK_SIZE` frames into the block buffers.
    fn render_block(&mut self) {
        self.block_left.fill(0.0);
        self.block_right.fill(0.0);
        let playing = self.state == TransportState::Playing;
        let block_end = self.position + BLOCK_SIZE as u64;

        for node in self.nodes.values_mut() {
            if playing {
                let voice = &mut node.voice;
                let ons = node.part.dispatch_until(block_end, |kind| match kind {
                    PartEventKind::NoteOn { pitch, velocity } => voice.note_on(pitch, velocity),
                    PartEventKind::NoteOff { pitch } => voice.note_off(pitch),
                });
                if ons > 0 {
                    node.last_trigger = Some(self.position);
                }
            }

            node.voice
                .render(&mut self.scratch_left, &mut self.scratch_right);
            let gain = node.channel.gain();
            for i in 0..BLOCK_SIZE {
                self.block_left[i] += self.scratch_left[i] * gain;
                self.block_right[i] += self.scratch_right[i] * gain;
            }
        }

        if playing {
            self.position = block_end;
        }
        self.block_pos = 0;
    }

    /// Fills the output buffers with the next frames of the mix.
    pub fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        let frames = left.len().min(right.len());
        for i in 0..frames {
            if self.block_pos >= BLOCK_SIZE {
                self.render_block();
            }
            left[i] = self.block_left[self.block_pos];
            right[i] = self.block_right[self.block_pos];
            self.block_pos += 1;
        }
    }
}
