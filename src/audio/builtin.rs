//! Built-in instruments used when no SoundFont bank is loaded.
//!
//! A small fixed table of synthesized timbres. Every instrument is rendered
//! locally from oscillators and envelopes, percussion included, so playback
//! never depends on downloaded samples.

use super::voice::Voice;
use std::f32::consts::TAU;

/// Maximum simultaneous notes per built-in synthesizer; the oldest note is
/// stolen beyond this.
const MAX_POLYPHONY: usize = 32;

/// Output level of one full-velocity note before the channel gain.
const NOTE_LEVEL: f32 = 0.2;

/// The fixed built-in instrument table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinInstrument {
    AcousticGrandPiano,
    ElectricPiano,
    SynthBass,
    SynthPad,
    Percussion,
}

impl BuiltinInstrument {
    /// All instruments in selector order. The first is the default.
    pub const ALL: [BuiltinInstrument; 5] = [
        BuiltinInstrument::AcousticGrandPiano,
        BuiltinInstrument::ElectricPiano,
        BuiltinInstrument::SynthBass,
        BuiltinInstrument::SynthPad,
        BuiltinInstrument::Percussion,
    ];

    /// Display name shown in the instrument selector.
    pub fn name(self) -> &'static str {
        match self {
            BuiltinInstrument::AcousticGrandPiano => "Acoustic Grand Piano",
            BuiltinInstrument::ElectricPiano => "Electric Piano",
            BuiltinInstrument::SynthBass => "Synth Bass",
            BuiltinInstrument::SynthPad => "Synth Pad",
            BuiltinInstrument::Percussion => "Percussion",
        }
    }

    /// Looks an instrument up by its display name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.name() == name)
    }

    /// Position of the instrument in [`BuiltinInstrument::ALL`].
    pub fn position(self) -> usize {
        Self::ALL.iter().position(|i| *i == self).unwrap_or(0)
    }

    /// Returns the instrument at a selector position.
    pub fn at(position: usize) -> Option<Self> {
        Self::ALL.get(position).copied()
    }

    /// Names of every instrument in selector order.
    pub fn names() -> Vec<String> {
        Self::ALL.iter().map(|i| i.name().to_string()).collect()
    }

    /// Creates a new synthesizer for this instrument.
    pub fn create_voice(self, sample_rate: u32) -> PolySynth {
        PolySynth::new(self, sample_rate)
    }

    fn patch(self) -> Patch {
        match self {
            BuiltinInstrument::AcousticGrandPiano => Patch {
                tone: Tone::Fm {
                    carrier: Waveform::Triangle,
                    harmonicity: 0.5,
                    index: 1.2,
                },
                envelope: Envelope::new(0.01, 0.4, 0.1, 1.2),
            },
            BuiltinInstrument::ElectricPiano => Patch {
                tone: Tone::Fm {
                    carrier: Waveform::Sine,
                    harmonicity: 3.0,
                    index: 10.0,
                },
                envelope: Envelope::new(0.05, 0.3, 0.1, 1.0),
            },
            BuiltinInstrument::SynthBass => Patch {
                tone: Tone::FilteredSaw {
                    base_cutoff: 200.0,
                    octaves: 4.0,
                    filter: Envelope::new(0.01, 0.1, 0.2, 1.0),
                },
                envelope: Envelope::new(0.05, 0.3, 0.4, 0.8),
            },
            BuiltinInstrument::SynthPad => Patch {
                tone: Tone::Am { harmonicity: 1.5 },
                envelope: Envelope::new(0.5, 1.0, 0.7, 2.0),
            },
            BuiltinInstrument::Percussion => Patch {
                tone: Tone::Drum,
                envelope: Envelope::new(0.001, 0.35, 0.0, 0.1),
            },
        }
    }
}

impl std::fmt::Display for BuiltinInstrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Attack, decay and release times in seconds; sustain as a level.
#[derive(Debug, Clone, Copy)]
struct Envelope {
    attack: f32,
    decay: f32,
    sustain: f32,
    release: f32,
}

impl Envelope {
    const fn new(attack: f32, decay: f32, sustain: f32, release: f32) -> Self {
        Self {
            attack,
            decay,
            sustain,
            release,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Attack,
    Decay,
    Sustain,
    Release,
    Done,
}

/// Per-note linear ADSR state, advanced one sample at a time.
///
/// A release requested during the attack is held until the attack peaks,
/// so a note shorter than its attack still sounds.
#[derive(Debug, Clone, Copy)]
struct EnvelopeState {
    stage: Stage,
    level: f32,
    release_step: f32,
    release_pending: bool,
}

impl EnvelopeState {
    fn new() -> Self {
        Self {
            stage: Stage::Attack,
            level: 0.0,
            release_step: 0.0,
            release_pending: false,
        }
    }

    /// Whether the note is still held down.
    fn is_held(&self) -> bool {
        !self.release_pending && !matches!(self.stage, Stage::Release | Stage::Done)
    }

    fn release(&mut self, env: &Envelope, sample_rate: f32) {
        match self.stage {
            Stage::Release | Stage::Done => {}
            Stage::Attack => self.release_pending = true,
            Stage::Decay | Stage::Sustain => self.begin_release(env, sample_rate),
        }
    }

    fn begin_release(&mut self, env: &Envelope, sample_rate: f32) {
        self.release_pending = false;
        self.stage = Stage::Release;
        self.release_step = self.level / (env.release * sample_rate).max(1.0);
    }

    fn next(&mut self, env: &Envelope, sample_rate: f32) -> f32 {
        match self.stage {
            Stage::Attack => {
                self.level += 1.0 / (env.attack * sample_rate).max(1.0);
                if self.level >= 1.0 {
                    self.level = 1.0;
                    if self.release_pending {
                        self.begin_release(env, sample_rate);
                    } else {
                        self.stage = Stage::Decay;
                    }
                }
            }
            Stage::Decay => {
                self.level -= (1.0 - env.sustain) / (env.decay * sample_rate).max(1.0);
                if self.level <= env.sustain {
                    self.level = env.sustain;
                    self.stage = if env.sustain > 0.0 {
                        Stage::Sustain
                    } else {
                        Stage::Done
                    };
                }
            }
            Stage::Sustain => {}
            Stage::Release => {
                self.level -= self.release_step;
                if self.level <= 0.0 {
                    self.level = 0.0;
                    self.stage = Stage::Done;
                }
            }
            Stage::Done => self.level = 0.0,
        }
        self.level
    }
}

#[derive(Debug, Clone, Copy)]
enum Waveform {
    Sine,
    Triangle,
}

impl Waveform {
    /// Samples the waveform at a phase in radians.
    fn sample(self, phase: f32) -> f32 {
        match self {
            Waveform::Sine => phase.sin(),
            Waveform::Triangle => {
                let t = (phase / TAU).rem_euclid(1.0);
                4.0 * (t - (t + 0.5).floor()).abs() - 1.0
            }
        }
    }
}

/// How a patch turns frequency into a waveform.
#[derive(Debug, Clone, Copy)]
enum Tone {
    /// Two-operator FM: a sine modulator at `harmonicity` times the pitch.
    Fm {
        carrier: Waveform,
        harmonicity: f32,
        index: f32,
    },
    /// Sine carrier with amplitude modulation.
    Am { harmonicity: f32 },
    /// Sawtooth through a one-pole lowpass swept by its own envelope.
    FilteredSaw {
        base_cutoff: f32,
        octaves: f32,
        filter: Envelope,
    },
    /// Pitched membrane: a sine with a short downward pitch glide.
    Drum,
}

#[derive(Debug, Clone, Copy)]
struct Patch {
    tone: Tone,
    envelope: Envelope,
}

/// One sounding note of a [`PolySynth`].
#[derive(Debug, Clone)]
struct SynthNote {
    pitch: u8,
    gain: f32,
    frequency: f32,
    phase: f32,
    mod_phase: f32,
    elapsed: u32,
    amp: EnvelopeState,
    filter_env: EnvelopeState,
    filter_state: f32,
}

/// Converts a MIDI note number to frequency in Hz (A4 = 440 Hz).
pub fn midi_to_frequency(pitch: u8) -> f32 {
    440.0 * 2f32.powf((pitch as f32 - 69.0) / 12.0)
}

/// Polyphonic synthesizer playing one built-in instrument.
pub struct PolySynth {
    instrument: BuiltinInstrument,
    patch: Patch,
    sample_rate: f32,
    notes: Vec<SynthNote>,
}

impl PolySynth {
    /// Creates a silent synthesizer for an instrument.
    pub fn new(instrument: BuiltinInstrument, sample_rate: u32) -> Self {
        Self {
            instrument,
            patch: instrument.patch(),
            sample_rate: sample_rate.max(1) as f32,
            notes: Vec::with_capacity(MAX_POLYPHONY),
        }
    }

    fn next_sample(&mut self, idx: usize) -> f32 {
        let sr = self.sample_rate;
        let patch = self.patch;
        let note = &mut self.notes[idx];
        let env = note.amp.next(&patch.envelope, sr);
        let step = TAU * note.frequency / sr;

        let raw = match patch.tone {
            Tone::Fm {
                carrier,
                harmonicity,
                index,
            } => {
                let modulation = index * note.mod_phase.sin();
                note.mod_phase = (note.mod_phase + step * harmonicity) % TAU;
                carrier.sample(note.phase + modulation)
            }
            Tone::Am { harmonicity } => {
                let modulation = 0.5 + 0.5 * note.mod_phase.sin();
                note.mod_phase = (note.mod_phase + step * harmonicity) % TAU;
                note.phase.sin() * modulation
            }
            Tone::FilteredSaw {
                base_cutoff,
                octaves,
                filter,
            } => {
                let sweep = note.filter_env.next(&filter, sr);
                let cutoff = (base_cutoff * 2f32.powf(octaves * sweep)).min(sr * 0.45);
                let alpha = 1.0 - (-TAU * cutoff / sr).exp();
                let saw = note.phase / std::f32::consts::PI - 1.0;
                note.filter_state += alpha * (saw - note.filter_state);
                note.filter_state
            }
            Tone::Drum => {
                // Glide from 1.5x down to the pitch over ~30 ms
                let t = note.elapsed as f32 / sr;
                let glide = 1.0 + 0.5 * (-t / 0.03).exp();
                note.phase = (note.phase + step * (glide - 1.0)) % TAU;
                note.phase.sin()
            }
        };

        note.phase = (note.phase + step) % TAU;
        note.elapsed = note.elapsed.saturating_add(1);
        raw * env * note.gain
    }
}

impl Voice for PolySynth {
    fn name(&self) -> &str {
        self.instrument.name()
    }

    fn note_on(&mut self, pitch: u8, velocity: u8) {
        if velocity == 0 {
            self.note_off(pitch);
            return;
        }
        if self.notes.len() >= MAX_POLYPHONY {
            self.notes.remove(0);
        }
        let frequency = match self.patch.tone {
            // Conga-like drums: C3 sits around 200 Hz
            Tone::Drum => 200.0 * 2f32.powf((pitch as f32 - 48.0) / 12.0),
            _ => midi_to_frequency(pitch),
        };
        self.notes.push(SynthNote {
            pitch,
            gain: NOTE_LEVEL * velocity.min(127) as f32 / 127.0,
            frequency: frequency.min(self.sample_rate * 0.45),
            phase: 0.0,
            mod_phase: 0.0,
            elapsed: 0,
            amp: EnvelopeState::new(),
            filter_env: EnvelopeState::new(),
            filter_state: 0.0,
        });
    }

    fn note_off(&mut self, pitch: u8) {
        let env = self.patch.envelope;
        let sr = self.sample_rate;
        // Release the oldest held note of this pitch
        if let Some(note) = self
            .notes
            .iter_mut()
            .find(|n| n.pitch == pitch && n.amp.is_held())
        {
            note.amp.release(&env, sr);
            if let Tone::FilteredSaw { filter, .. } = self.patch.tone {
                note.filter_env.release(&filter, sr);
            }
        }
    }

    fn all_notes_off(&mut self, immediate: bool) {
        if immediate {
            self.notes.clear();
            return;
        }
        let env = self.patch.envelope;
        let sr = self.sample_rate;
        for note in &mut self.notes {
            note.amp.release(&env, sr);
        }
    }

    fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        left.fill(0.0);
        for idx in 0..self.notes.len() {
            for out in left.iter_mut() {
                *out += self.next_sample(idx);
            }
        }
        self.notes.retain(|n| n.amp.stage != Stage::Done);
        right.copy_from_slice(left);
    }

    fn active_notes(&self) -> usize {
        self.notes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 44100;

    fn peak(buf: &[f32]) -> f32 {
        buf.iter().fold(0.0f32, |m, s| m.max(s.abs()))
    }

    #[test]
    fn test_table_order_and_names() {
        assert_eq!(BuiltinInstrument::ALL[0], BuiltinInstrument::AcousticGrandPiano);
        assert_eq!(BuiltinInstrument::names().len(), 5);
        assert_eq!(
            BuiltinInstrument::from_name("Synth Pad"),
            Some(BuiltinInstrument::SynthPad)
        );
        assert_eq!(BuiltinInstrument::from_name("Kazoo"), None);
        assert_eq!(BuiltinInstrument::Percussion.position(), 4);
        assert_eq!(BuiltinInstrument::at(1), Some(BuiltinInstrument::ElectricPiano));
    }

    #[test]
    fn test_midi_to_frequency() {
        assert!((midi_to_frequency(69) - 440.0).abs() < 1e-3);
        assert!((midi_to_frequency(57) - 220.0).abs() < 1e-3);
    }

    #[test]
    fn test_every_instrument_sounds_and_releases() {
        for instrument in BuiltinInstrument::ALL {
            let mut synth = instrument.create_voice(SR);
            let mut left = vec![0.0; 4096];
            let mut right = vec![0.0; 4096];

            synth.note_on(60, 127);
            synth.render(&mut left, &mut right);
            assert!(peak(&left) > 0.001, "{} is silent", instrument);
            assert!(peak(&left) <= 1.0, "{} clips", instrument);
            assert_eq!(left, right);

            synth.note_off(60);
            // Longest release in the table is 2 s
            for _ in 0..(3 * SR as usize / 4096) {
                synth.render(&mut left, &mut right);
            }
            assert_eq!(synth.active_notes(), 0, "{} never released", instrument);
        }
    }

    #[test]
    fn test_note_released_before_rendering_still_sounds() {
        for instrument in BuiltinInstrument::ALL {
            let mut synth = instrument.create_voice(SR);
            let mut left = vec![0.0; 4096];
            let mut right = vec![0.0; 4096];

            synth.note_on(60, 127);
            synth.note_off(60);
            synth.render(&mut left, &mut right);
            assert!(peak(&left) > 0.001, "{} dropped a short note", instrument);

            for _ in 0..(3 * SR as usize / 4096) {
                synth.render(&mut left, &mut right);
            }
            assert_eq!(synth.active_notes(), 0, "{} never released", instrument);
        }
    }

    #[test]
    fn test_repeated_short_notes_release_separately() {
        let mut synth = BuiltinInstrument::SynthPad.create_voice(SR);
        synth.note_on(60, 100);
        synth.note_off(60);
        synth.note_on(60, 100);
        synth.note_off(60);
        assert_eq!(synth.notes.iter().filter(|n| n.amp.release_pending).count(), 2);
    }

    #[test]
    fn test_immediate_all_notes_off() {
        let mut synth = BuiltinInstrument::SynthPad.create_voice(SR);
        synth.note_on(60, 100);
        synth.note_on(64, 100);
        assert_eq!(synth.active_notes(), 2);
        synth.all_notes_off(true);
        assert_eq!(synth.active_notes(), 0);

        let mut left = vec![1.0; 64];
        let mut right = vec![1.0; 64];
        synth.render(&mut left, &mut right);
        assert_eq!(peak(&left), 0.0);
    }

    #[test]
    fn test_polyphony_limit() {
        let mut synth = BuiltinInstrument::AcousticGrandPiano.create_voice(SR);
        for pitch in 0..(MAX_POLYPHONY as u8 + 8) {
            synth.note_on(pitch + 20, 100);
        }
        assert_eq!(synth.active_notes(), MAX_POLYPHONY);
    }
}
