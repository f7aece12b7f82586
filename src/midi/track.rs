//! MIDI track representation.
//!
//! A track is an ordered list of notes from one track chunk of the file
//! (or one channel of a format 0 file), with the instrument it asked for.

use super::note::Note;
use super::{instrument_name, PERCUSSION_CHANNEL};

/// A decoded MIDI track.
///
/// Notes are sorted by start tick for playback.
#[derive(Debug, Clone)]
pub struct MidiTrack {
    /// Position of the track in the decoded song.
    pub index: usize,

    /// Track name from the file's track-name meta event, if any.
    pub name: String,

    /// MIDI channel (0-15) of the track's first channel event.
    pub channel: u8,

    /// Program (0-127) from the track's first program change, 0 if none.
    pub program: u8,

    /// Collection of notes in this track, sorted by start_tick.
    notes: Vec<Note>,
}

impl MidiTrack {
    /// Creates an empty track.
    ///
    /// # Arguments
    ///
    /// * `index` - Position of the track in the song
    /// * `name` - Track name (may be empty)
    /// * `channel` - MIDI channel (0-15)
    pub fn new(index: usize, name: impl Into<String>, channel: u8) -> Self {
        Self {
            index,
            name: name.into(),
            channel: channel.min(15),
            program: 0,
            notes: Vec::new(),
        }
    }

    /// Adds a note to the track, maintaining sorted order by start_tick.
    pub fn add_note(&mut self, note: Note) {
        // Insert after notes with the same start so file order is kept
        let pos = self
            .notes
            .partition_point(|n| n.start_tick <= note.start_tick);
        self.notes.insert(pos, note);
    }

    /// Returns all notes in the track (sorted by start_tick).
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// Returns mutable access to all notes in the track.
    pub fn notes_mut(&mut self) -> &mut [Note] {
        &mut self.notes
    }

    /// Returns the number of notes in the track.
    pub fn note_count(&self) -> usize {
        self.notes.len()
    }

    /// Whether the track has no notes to play.
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Whether the track plays on the General MIDI percussion channel.
    pub fn is_percussion(&self) -> bool {
        self.channel == PERCUSSION_CHANNEL
    }

    /// General MIDI name of the track's instrument.
    pub fn instrument_name(&self) -> &'static str {
        instrument_name(self.program, self.channel)
    }

    /// Label shown for the track: the instrument name, or `Track N`.
    pub fn label(&self) -> String {
        let name = self.instrument_name();
        if name.is_empty() {
            format!("Track {}", self.index + 1)
        } else {
            name.to_string()
        }
    }

    /// Returns the end of the last note in seconds.
    pub fn duration(&self) -> f64 {
        self.notes
            .iter()
            .map(|n| n.end_time())
            .fold(0.0, f64::max)
    }

    /// Returns the end tick of the last note.
    pub fn duration_ticks(&self) -> u32 {
        self.notes.iter().map(|n| n.end_tick()).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_notes_sorted() {
        let mut track = MidiTrack::new(0, "Test", 0);
        track.add_note(Note::new(60, 100, 480, 240));
        track.add_note(Note::new(62, 100, 0, 240));
        track.add_note(Note::new(64, 100, 960, 240));
        track.add_note(Note::new(65, 100, 480, 240));

        let starts: Vec<_> = track.notes().iter().map(|n| n.start_tick).collect();
        assert_eq!(starts, vec![0, 480, 480, 960]);
        // Same start keeps insertion order
        assert_eq!(track.notes()[1].pitch, 60);
        assert_eq!(track.notes()[2].pitch, 65);
    }

    #[test]
    fn test_label_and_percussion() {
        let mut track = MidiTrack::new(2, "", 9);
        assert!(track.is_percussion());
        assert_eq!(track.label(), "standard kit");

        track.channel = 0;
        track.program = 33;
        assert_eq!(track.label(), "electric bass (finger)");
    }

    #[test]
    fn test_duration() {
        let mut track = MidiTrack::new(0, "Test", 0);
        assert_eq!(track.duration_ticks(), 0);
        assert_eq!(track.duration(), 0.0);

        let mut note = Note::new(60, 100, 960, 480);
        note.resolve_time(|tick| tick as f64 / 960.0);
        track.add_note(note);
        assert_eq!(track.duration_ticks(), 1440);
        assert!((track.duration() - 1.5).abs() < 1e-9);
    }
}
