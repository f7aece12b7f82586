//! Decoded MIDI song container.
//!
//! A song is the result of decoding one MIDI file: its tracks in file order,
//! the tempo map used to time them, and the overall duration.

use super::tempo::TempoMap;
use super::track::MidiTrack;

/// A complete decoded MIDI file.
#[derive(Debug, Clone)]
pub struct Song {
    /// Song name, usually the file stem.
    pub name: String,

    /// Tempo map used to convert ticks into seconds.
    pub tempo: TempoMap,

    /// Tracks in file order; `tracks[i].index == i`.
    tracks: Vec<MidiTrack>,
}

impl Song {
    /// Creates a song from decoded tracks, renumbering them by position.
    pub fn new(name: impl Into<String>, tempo: TempoMap, mut tracks: Vec<MidiTrack>) -> Self {
        for (i, track) in tracks.iter_mut().enumerate() {
            track.index = i;
        }
        Self {
            name: name.into(),
            tempo,
            tracks,
        }
    }

    /// Returns all tracks, including those without notes.
    pub fn tracks(&self) -> &[MidiTrack] {
        &self.tracks
    }

    /// Returns the tracks that have notes to play.
    pub fn playable_tracks(&self) -> impl Iterator<Item = &MidiTrack> {
        self.tracks.iter().filter(|t| !t.is_empty())
    }

    /// Returns a track by index.
    pub fn track(&self, index: usize) -> Option<&MidiTrack> {
        self.tracks.get(index)
    }

    /// Returns the number of tracks in the song.
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Returns the total number of notes across all tracks.
    pub fn note_count(&self) -> usize {
        self.tracks.iter().map(|t| t.note_count()).sum()
    }

    /// Returns the total duration in seconds (end of the last note).
    pub fn duration(&self) -> f64 {
        self.tracks
            .iter()
            .map(|t| t.duration())
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::Note;

    #[test]
    fn test_song_renumbers_and_filters() {
        let mut a = MidiTrack::new(7, "Conductor", 0);
        a.program = 0;
        let mut b = MidiTrack::new(3, "Lead", 1);
        let mut note = Note::new(60, 100, 0, 480);
        note.resolve_time(|tick| tick as f64 / 960.0);
        b.add_note(note);

        let song = Song::new("demo", TempoMap::default(), vec![a, b]);
        assert_eq!(song.track_count(), 2);
        assert_eq!(song.track(0).map(|t| t.index), Some(0));
        assert_eq!(song.track(1).map(|t| t.index), Some(1));

        let playable: Vec<_> = song.playable_tracks().map(|t| t.index).collect();
        assert_eq!(playable, vec![1]);
        assert_eq!(song.note_count(), 1);
        assert!((song.duration() - 0.5).abs() < 1e-9);
    }
}
