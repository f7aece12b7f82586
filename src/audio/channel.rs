//! Mixer channel: volume, mute and solo for one track.

/// Lowest channel volume in decibels (fader bottom).
pub const MIN_VOLUME_DB: f32 = -40.0;

/// Highest channel volume in decibels (fader top).
pub const MAX_VOLUME_DB: f32 = 6.0;

/// Converts decibels to a linear amplitude factor.
#[inline]
pub fn db_to_gain(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

/// A per-track channel strip in the audio graph.
///
/// `mute` is the effective mute applied to the audio; `solo` is only a flag
/// here, the mixer turns it into mutes on the other channels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Channel {
    /// Volume in decibels, clamped to [`MIN_VOLUME_DB`, `MAX_VOLUME_DB`].
    volume_db: f32,
    /// Whether the channel output is silenced.
    pub mute: bool,
    /// Whether the channel is soloed.
    pub solo: bool,
}

impl Channel {
    /// Creates a channel at 0 dB, not muted or soloed.
    pub fn new() -> Self {
        Self {
            volume_db: 0.0,
            mute: false,
            solo: false,
        }
    }

    /// Returns the volume in decibels.
    pub fn volume_db(&self) -> f32 {
        self.volume_db
    }

    /// Sets the volume in decibels, clamping to the channel range.
    pub fn set_volume_db(&mut self, db: f32) {
        self.volume_db = if db.is_nan() {
            0.0
        } else {
            db.clamp(MIN_VOLUME_DB, MAX_VOLUME_DB)
        };
    }

    /// Linear gain of the channel, 0 when muted.
    pub fn gain(&self) -> f32 {
        if self.mute {
            0.0
        } else {
            db_to_gain(self.volume_db)
        }
    }
}

impl Default for Channel {
    fn default() -> Self {
        Self::new()
    }
}
