//! Tick to seconds conversion.
//!
//! Metrical files carry a resolution (ticks per quarter note) and any number
//! of tempo changes; timecode files use a fixed number of ticks per second.

/// Default tempo of a MIDI file with no tempo events (120 BPM).
pub const DEFAULT_USEC_PER_BEAT: u32 = 500_000;

/// A tempo change at a tick, with the elapsed seconds at that tick cached.
#[derive(Debug, Clone, Copy, PartialEq)]
struct TempoChange {
    tick: u32,
    usec_per_beat: u32,
    seconds: f64,
}

/// How file ticks relate to wall-clock time.
#[derive(Debug, Clone, PartialEq)]
enum Resolution {
    /// Ticks per quarter note, scaled by the tempo changes.
    Metrical {
        ticks_per_beat: u16,
        changes: Vec<TempoChange>,
    },
    /// SMPTE timing: frames per second times subframes per frame.
    Timecode { ticks_per_second: f64 },
}

/// Tempo map for converting ticks into seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct TempoMap {
    resolution: Resolution,
}

impl TempoMap {
    /// Creates a metrical tempo map from `(tick, microseconds per beat)`
    /// changes in any order. Changes at the same tick keep the last one.
    pub fn metrical(ticks_per_beat: u16, mut raw: Vec<(u32, u32)>) -> Self {
        let ticks_per_beat = ticks_per_beat.max(1);
        raw.sort_by_key(|(tick, _)| *tick);

        let mut changes: Vec<TempoChange> = Vec::with_capacity(raw.len() + 1);
        changes.push(TempoChange {
            tick: 0,
            usec_per_beat: DEFAULT_USEC_PER_BEAT,
            seconds: 0.0,
        });

        for (tick, usec_per_beat) in raw {
            if usec_per_beat == 0 {
                continue;
            }
            let last = changes[changes.len() - 1];
            if last.tick == tick {
                let idx = changes.len() - 1;
                changes[idx].usec_per_beat = usec_per_beat;
                continue;
            }
            let seconds = last.seconds + span_seconds(tick - last.tick, last.usec_per_beat, ticks_per_beat);
            changes.push(TempoChange {
                tick,
                usec_per_beat,
                seconds,
            });
        }

        Self {
            resolution: Resolution::Metrical {
                ticks_per_beat,
                changes,
            },
        }
    }

    /// Creates a timecode tempo map.
    pub fn timecode(frames_per_second: f32, subframes: u8) -> Self {
        let ticks_per_second = (frames_per_second as f64 * subframes.max(1) as f64).max(1.0);
        Self {
            resolution: Resolution::Timecode { ticks_per_second },
        }
    }

    /// Converts an absolute tick position into seconds.
    pub fn ticks_to_seconds(&self, tick: u32) -> f64 {
        match &self.resolution {
            Resolution::Metrical {
                ticks_per_beat,
                changes,
            } => {
                let idx = changes.partition_point(|c| c.tick <= tick).saturating_sub(1);
                let change = changes[idx];
                change.seconds + span_seconds(tick - change.tick, change.usec_per_beat, *ticks_per_beat)
            }
            Resolution::Timecode { ticks_per_second } => tick as f64 / ticks_per_second,
        }
    }
}

impl Default for TempoMap {
    fn default() -> Self {
        Self::metrical(480, Vec::new())
    }
}

/// Seconds spanned by `ticks` at a fixed tempo.
fn span_seconds(ticks: u32, usec_per_beat: u32, ticks_per_beat: u16) -> f64 {
    ticks as f64 * usec_per_beat as f64 / (ticks_per_beat as f64 * 1_000_000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tempo() {
        let map = TempoMap::default();
        // 120 BPM: one beat = 0.5 seconds
        assert!((map.ticks_to_seconds(480) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_tempo_change_midway() {
        // 120 BPM for the first beat, then 60 BPM
        let map = TempoMap::metrical(480, vec![(480, 1_000_000)]);
        assert!((map.ticks_to_seconds(480) - 0.5).abs() < 1e-9);
        assert!((map.ticks_to_seconds(960) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_tempo_at_zero_replaces_default() {
        let map = TempoMap::metrical(96, vec![(0, 250_000)]);
        assert!((map.ticks_to_seconds(96) - 0.25).abs() < 1e-9);
        assert!((map.ticks_to_seconds(192) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_timecode() {
        let map = TempoMap::timecode(25.0, 40);
        assert!((map.ticks_to_seconds(1000) - 1.0).abs() < 1e-9);
    }
}
