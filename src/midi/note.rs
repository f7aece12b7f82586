//! MIDI note representation.
//!
//! A note is a paired note-on/note-off with both tick timing (as stored in
//! the file) and second timing (resolved through the song's tempo map).

use super::note_to_name;

/// A single decoded MIDI note.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    /// MIDI note number (0-127). 60 = Middle C (C4).
    pub pitch: u8,

    /// Note-on velocity (1-127).
    pub velocity: u8,

    /// Start time in ticks from the beginning of the track.
    pub start_tick: u32,

    /// Duration in ticks.
    pub duration_ticks: u32,

    /// Start time in seconds.
    pub time: f64,

    /// Duration in seconds.
    pub duration: f64,
}

impl Note {
    /// Creates a note with tick timing only; seconds are filled in later
    /// by [`Note::resolve_time`].
    ///
    /// # Examples
    ///
    /// ```
    /// use midimix::midi::Note;
    ///
    /// let note = Note::new(60, 100, 0, 480);
    /// assert_eq!(note.end_tick(), 480);
    /// ```
    pub fn new(pitch: u8, velocity: u8, start_tick: u32, duration_ticks: u32) -> Self {
        Self {
            pitch: pitch.min(127),
            velocity: velocity.min(127),
            start_tick,
            duration_ticks,
            time: 0.0,
            duration: 0.0,
        }
    }

    /// Returns the end tick of this note (start + duration).
    pub fn end_tick(&self) -> u32 {
        self.start_tick.saturating_add(self.duration_ticks)
    }

    /// Returns the end time of this note in seconds.
    pub fn end_time(&self) -> f64 {
        self.time + self.duration
    }

    /// Fills in second timing from a tick-to-seconds conversion.
    pub fn resolve_time(&mut self, to_seconds: impl Fn(u32) -> f64) {
        self.time = to_seconds(self.start_tick);
        self.duration = (to_seconds(self.end_tick()) - self.time).max(0.0);
    }

    /// Scientific pitch name, e.g. "F#5".
    pub fn name(&self) -> String {
        note_to_name(self.pitch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_clamping() {
        let note = Note::new(200, 200, 0, 480);
        assert_eq!(note.pitch, 127);
        assert_eq!(note.velocity, 127);
    }

    #[test]
    fn test_resolve_time() {
        let mut note = Note::new(60, 100, 480, 960);
        // 480 ticks per half second
        note.resolve_time(|tick| tick as f64 / 960.0);
        assert!((note.time - 0.5).abs() < 1e-9);
        assert!((note.duration - 1.0).abs() < 1e-9);
        assert!((note.end_time() - 1.5).abs() < 1e-9);
        assert_eq!(note.name(), "C4");
    }
}
