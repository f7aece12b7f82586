//! SoundFont bank loading and per-track preset playback.
//!
//! Parsing and sample playback are done by `rustysynth`. A loaded
//! [`SoundFontBank`] exposes its preset list for the instrument selectors
//! and creates one [`SoundFontVoice`] per track, each driving its own
//! synthesizer locked to a single preset.

use super::voice::Voice;
use rustysynth::{SoundFont, Synthesizer, SynthesizerSettings};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Bank number SoundFonts use for drum kits.
pub const PERCUSSION_BANK: u16 = 128;

/// Errors raised while loading a SoundFont or building its player.
#[derive(Debug, Error)]
pub enum SoundFontError {
    #[error("failed to open SoundFont {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse SoundFont: {0}")]
    Parse(String),
    #[error("failed to create synthesizer: {0}")]
    Synth(String),
    #[error("SoundFont contains no presets")]
    Empty,
}

/// One selectable preset of a bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetInfo {
    /// Position in the bank's sorted preset list; the selector value.
    pub id: usize,
    pub name: String,
    pub bank: u16,
    pub patch: u8,
}

impl PresetInfo {
    /// Selector label, e.g. `000:025 Steel Guitar`.
    pub fn label(&self) -> String {
        format!("{:03}:{:03} {}", self.bank, self.patch, self.name)
    }
}

/// Picks the preset a track starts on.
///
/// Percussion tracks prefer the drum bank. Otherwise the melodic bank 0
/// preset with the track's program wins, then any preset with that patch
/// number, and finally the first preset of the bank.
pub fn preselect_preset(presets: &[PresetInfo], program: u8, percussion: bool) -> usize {
    let find = |bank: Option<u16>| {
        presets
            .iter()
            .find(|p| p.patch == program && bank.map_or(true, |b| p.bank == b))
            .map(|p| p.id)
    };

    let choice = if percussion {
        find(Some(PERCUSSION_BANK)).or_else(|| {
            presets
                .iter()
                .find(|p| p.bank == PERCUSSION_BANK)
                .map(|p| p.id)
        })
    } else {
        None
    };

    match choice.or_else(|| find(Some(0))).or_else(|| find(None)) {
        Some(id) => id,
        None => {
            warn!(
                "No preset for program {}, falling back to the first preset",
                program
            );
            0
        }
    }
}

/// A source of selectable presets and the voices that play them.
///
/// The mixer only talks to banks through this trait.
pub trait PresetBank {
    /// Display name of the bank.
    fn name(&self) -> &str;

    /// Presets in selector order; `presets()[i].id == i`.
    fn presets(&self) -> &[PresetInfo];

    /// Creates a voice playing one preset.
    ///
    /// # Errors
    ///
    /// Returns error if the preset id is unknown or the player cannot be
    /// constructed.
    fn create_voice(
        &self,
        preset_id: usize,
        sample_rate: u32,
    ) -> Result<Box<dyn Voice>, SoundFontError>;

    /// Returns the preset with the given id.
    fn preset(&self, id: usize) -> Option<&PresetInfo> {
        self.presets().get(id)
    }

    /// Preset a track with this program starts on.
    fn preselect(&self, program: u8, percussion: bool) -> usize {
        preselect_preset(self.presets(), program, percussion)
    }
}

/// A parsed SoundFont and its sorted preset list.
pub struct SoundFontBank {
    name: String,
    soundfont: Arc<SoundFont>,
    presets: Vec<PresetInfo>,
}

impl std::fmt::Debug for SoundFontBank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundFontBank")
            .field("name", &self.name)
            .field("presets", &self.presets.len())
            .finish()
    }
}

impl SoundFontBank {
    /// Loads a SoundFont from a `.sf2` file.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The file cannot be opened
    /// - The SoundFont is invalid or has no presets
    /// - A synthesizer cannot be built from it
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SoundFontError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| SoundFontError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("SoundFont")
            .to_string();
        Self::from_reader(name, &mut BufReader::new(file))
    }

    /// Parses a SoundFont from memory.
    pub fn from_bytes(name: impl Into<String>, data: &[u8]) -> Result<Self, SoundFontError> {
        Self::from_reader(name.into(), &mut Cursor::new(data))
    }

    fn from_reader<R: std::io::Read>(name: String, reader: &mut R) -> Result<Self, SoundFontError> {
        let soundfont = Arc::new(
            SoundFont::new(reader).map_err(|e| SoundFontError::Parse(format!("{:?}", e)))?,
        );

        let mut raw: Vec<(u16, u8, String)> = soundfont
            .get_presets()
            .iter()
            .filter(|p| (0..128).contains(&p.get_patch_number()))
            .map(|p| {
                (
                    p.get_bank_number().clamp(0, u16::MAX as i32) as u16,
                    p.get_patch_number() as u8,
                    p.get_name().trim().to_string(),
                )
            })
            .collect();
        if raw.is_empty() {
            return Err(SoundFontError::Empty);
        }
        raw.sort();

        let presets = raw
            .into_iter()
            .enumerate()
            .map(|(id, (bank, patch, name))| PresetInfo {
                id,
                name,
                bank,
                patch,
            })
            .collect();

        // Building one player up front surfaces construction errors at load
        Synthesizer::new(&soundfont, &SynthesizerSettings::new(44100))
            .map_err(|e| SoundFontError::Synth(format!("{:?}", e)))?;

        let bank = Self {
            name,
            soundfont,
            presets,
        };
        info!(
            "Loaded SoundFont '{}' with {} presets",
            bank.name,
            bank.presets.len()
        );
        Ok(bank)
    }
}

impl PresetBank for SoundFontBank {
    fn name(&self) -> &str {
        &self.name
    }

    fn presets(&self) -> &[PresetInfo] {
        &self.presets
    }

    fn create_voice(
        &self,
        preset_id: usize,
        sample_rate: u32,
    ) -> Result<Box<dyn Voice>, SoundFontError> {
        let preset = self
            .presets
            .get(preset_id)
            .cloned()
            .ok_or_else(|| SoundFontError::Synth(format!("unknown preset {}", preset_id)))?;
        let voice = SoundFontVoice::new(&self.soundfont, preset, sample_rate)?;
        Ok(Box::new(voice))
    }
}

/// Plays one preset of a bank through its own synthesizer.
pub struct SoundFontVoice {
    synth: Synthesizer,
    preset: PresetInfo,
    channel: i32,
    held: HashSet<u8>,
}

impl SoundFontVoice {
    /// Creates a synthesizer and selects the preset on its channel.
    pub fn new(
        soundfont: &Arc<SoundFont>,
        preset: PresetInfo,
        sample_rate: u32,
    ) -> Result<Self, SoundFontError> {
        let settings = SynthesizerSettings::new(sample_rate as i32);
        let mut synth = Synthesizer::new(soundfont, &settings)
            .map_err(|e| SoundFontError::Synth(format!("{:?}", e)))?;

        // Drum kits live on the percussion channel
        let channel = if preset.bank == PERCUSSION_BANK { 9 } else { 0 };
        if channel != 9 {
            // Bank select (CC 0), then program change
            synth.process_midi_message(channel, 0xB0, 0x00, preset.bank as i32);
        }
        synth.process_midi_message(channel, 0xC0, preset.patch as i32, 0);

        Ok(Self {
            synth,
            preset,
            channel,
            held: HashSet::new(),
        })
    }
}

impl Voice for SoundFontVoice {
    fn name(&self) -> &str {
        &self.preset.name
    }

    fn note_on(&mut self, pitch: u8, velocity: u8) {
        self.synth
            .note_on(self.channel, pitch as i32, velocity as i32);
        if velocity > 0 {
            self.held.insert(pitch);
        } else {
            self.held.remove(&pitch);
        }
    }

    fn note_off(&mut self, pitch: u8) {
        self.synth.note_off(self.channel, pitch as i32);
        self.held.remove(&pitch);
    }

    fn all_notes_off(&mut self, immediate: bool) {
        self.synth.note_off_all(immediate);
        self.held.clear();
    }

    fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.synth.render(left, right);
    }

    fn active_notes(&self) -> usize {
        self.held.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn presets(list: &[(u16, u8, &str)]) -> Vec<PresetInfo> {
        list.iter()
            .enumerate()
            .map(|(id, &(bank, patch, name))| PresetInfo {
                id,
                name: name.to_string(),
                bank,
                patch,
            })
            .collect()
    }

    #[test]
    fn test_preselect_matches_program() {
        let list = presets(&[(0, 0, "Piano"), (0, 33, "Bass"), (1, 33, "Bass 2")]);
        assert_eq!(preselect_preset(&list, 33, false), 1);
        assert_eq!(preselect_preset(&list, 0, false), 0);
    }

    #[test]
    fn test_preselect_falls_back_to_first() {
        let list = presets(&[(0, 0, "Piano"), (0, 33, "Bass")]);
        assert_eq!(preselect_preset(&list, 90, false), 0);
        assert_eq!(preselect_preset(&[], 90, false), 0);
    }

    #[test]
    fn test_preselect_other_bank() {
        let list = presets(&[(0, 0, "Piano"), (8, 40, "Slow Violin")]);
        assert_eq!(preselect_preset(&list, 40, false), 1);
    }

    #[test]
    fn test_preselect_percussion_prefers_drum_bank() {
        let list = presets(&[
            (0, 0, "Piano"),
            (128, 0, "Standard"),
            (128, 25, "TR-808"),
        ]);
        assert_eq!(preselect_preset(&list, 0, true), 1);
        assert_eq!(preselect_preset(&list, 25, true), 2);
        // No kit with that number: any drum kit beats melodic presets
        assert_eq!(preselect_preset(&list, 48, true), 1);
    }

    #[test]
    fn test_preset_label() {
        let list = presets(&[(0, 25, "Steel Guitar")]);
        assert_eq!(list[0].label(), "000:025 Steel Guitar");
    }

    #[test]
    fn test_invalid_bytes_rejected() {
        let result = SoundFontBank::from_bytes("junk", b"not a soundfont");
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = SoundFontBank::load("/nonexistent/bank.sf2").unwrap_err();
        assert!(matches!(err, SoundFontError::Io { .. }));
    }

    #[test]
    #[ignore] // Requires a SoundFont file
    fn test_load_real_soundfont() {
        let bank = SoundFontBank::load("TimGM6mb.sf2").unwrap();
        assert!(!bank.presets().is_empty());
        let mut voice = bank.create_voice(0, 44100).unwrap();
        voice.note_on(60, 100);
        let mut left = vec![0.0; 1024];
        let mut right = vec![0.0; 1024];
        voice.render(&mut left, &mut right);
        assert!(left.iter().any(|s| s.abs() > 0.0));
    }
}
