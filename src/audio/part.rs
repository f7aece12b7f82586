//! Scheduled note container for one track.
//!
//! A part holds a track's notes as note-on/note-off events at sample
//! positions, plus a cursor to the next event to dispatch. The transport
//! moves the cursor forward during playback and repositions it on seek.

use crate::midi::MidiTrack;

/// What a scheduled event does to the track's voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartEventKind {
    /// Start a note.
    NoteOn { pitch: u8, velocity: u8 },
    /// Release a note.
    NoteOff { pitch: u8 },
}

/// A note event at an absolute sample position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartEvent {
    /// Sample position from the start of the song.
    pub sample: u64,
    /// The event.
    pub kind: PartEventKind,
}

/// Time-sorted note events of a track.
#[derive(Debug, Clone, Default)]
pub struct Part {
    events: Vec<PartEvent>,
    cursor: usize,
}

impl Part {
    /// Schedules every note of a track at the given sample rate.
    pub fn from_track(track: &MidiTrack, sample_rate: u32) -> Self {
        let to_sample = |seconds: f64| (seconds.max(0.0) * sample_rate as f64).round() as u64;

        let mut events = Vec::with_capacity(track.note_count() * 2);
        for note in track.notes() {
            let start = to_sample(note.time);
            // Every note sounds for at least one sample
            let end = to_sample(note.end_time()).max(start + 1);
            events.push(PartEvent {
                sample: start,
                kind: PartEventKind::NoteOn {
                    pitch: note.pitch,
                    velocity: note.velocity,
                },
            });
            events.push(PartEvent {
                sample: end,
                kind: PartEventKind::NoteOff { pitch: note.pitch },
            });
        }

        // Note-offs before note-ons at the same sample so repeated
        // pitches retrigger instead of being cut
        events.sort_by_key(|e| (e.sample, matches!(e.kind, PartEventKind::NoteOn { .. })));

        Self { events, cursor: 0 }
    }

    /// Returns the number of scheduled events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no events are scheduled.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Moves the cursor to the first event at or after `sample`.
    pub fn seek(&mut self, sample: u64) {
        self.cursor = self.events.partition_point(|e| e.sample < sample);
    }

    /// Dispatches every pending event before `end_sample`, in order.
    ///
    /// Returns the number of note-ons dispatched.
    pub fn dispatch_until(&mut self, end_sample: u64, mut f: impl FnMut(PartEventKind)) -> usize {
        let mut note_ons = 0;
        while let Some(event) = self.events.get(self.cursor) {
            if event.sample >= end_sample {
                break;
            }
            if matches!(event.kind, PartEventKind::NoteOn { .. }) {
                note_ons += 1;
            }
            f(event.kind);
            self.cursor += 1;
        }
        note_ons
    }

    /// Drops every scheduled event.
    pub fn cancel(&mut self) {
        self.events.clear();
        self.cursor = 0;
    }
}
