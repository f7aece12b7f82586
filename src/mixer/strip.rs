//! UI state of one mixer strip.

use crate::audio::{MAX_VOLUME_DB, MIN_VOLUME_DB};

/// Fader resolution in decibels.
pub const FADER_STEP_DB: f32 = 0.5;

/// Snaps a fader value to the fader range and step.
pub fn snap_fader(db: f32) -> f32 {
    if db.is_nan() {
        return 0.0;
    }
    let clamped = db.clamp(MIN_VOLUME_DB, MAX_VOLUME_DB);
    (clamped / FADER_STEP_DB).round() * FADER_STEP_DB
}

/// Fader position as a fraction of its travel, 0.0 at the bottom.
pub fn fader_fraction(db: f32) -> f32 {
    (snap_fader(db) - MIN_VOLUME_DB) / (MAX_VOLUME_DB - MIN_VOLUME_DB)
}

/// Fader value for a fraction of its travel.
pub fn fader_from_fraction(fraction: f32) -> f32 {
    snap_fader(MIN_VOLUME_DB + fraction.clamp(0.0, 1.0) * (MAX_VOLUME_DB - MIN_VOLUME_DB))
}

/// Controls shown for one track.
#[derive(Debug, Clone, PartialEq)]
pub struct Strip {
    /// Track label (instrument name or `Track N`).
    pub label: String,
    /// Second line: the track name from the file, if any.
    pub subtitle: String,
    /// Fader value in decibels.
    pub fader_db: f32,
    /// Mute button lit (the user's own mute toggle).
    pub mute_active: bool,
    /// Solo button lit.
    pub solo_active: bool,
    /// Whether the track is silenced right now, by mute or by another solo.
    pub silenced: bool,
    /// Activity light, lit briefly on each note.
    pub led: bool,
    /// Instrument selector entries.
    pub options: Vec<String>,
    /// Selected entry in `options`.
    pub selected: usize,
}

impl Strip {
    pub fn new(label: impl Into<String>, subtitle: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            label: label.into(),
            subtitle: subtitle.into(),
            fader_db: 0.0,
            mute_active: false,
            solo_active: false,
            silenced: false,
            led: false,
            options,
            selected: 0,
        }
    }

    /// Name of the selected instrument.
    pub fn selected_option(&self) -> Option<&str> {
        self.options.get(self.selected).map(String::as_str)
    }

    /// Fader text, e.g. `-12.5 dB`.
    pub fn fader_text(&self) -> String {
        if self.fader_db > 0.0 {
            format!("+{:.1} dB", self.fader_db)
        } else {
            format!("{:.1} dB", self.fader_db)
        }
    }
}
