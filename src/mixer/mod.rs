//! Per-track mixer state.
//!
//! The mixer keeps one [`TrackEntry`] per playable track, keyed by the
//! track's index in the file, and forwards control changes to the audio
//! engine's channel and voice for that index. Solo and mute are
//! reconciled across all tracks after every click.

pub mod strip;

pub use strip::{fader_fraction, fader_from_fraction, snap_fader, Strip, FADER_STEP_DB};

use crate::audio::{AudioEngine, BuiltinInstrument, Channel, PresetBank, SoundFontError, Voice};
use crate::midi::{MidiTrack, Song};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, warn};

/// Errors raised by mixer operations.
#[derive(Debug, Error)]
pub enum MixerError {
    #[error("no track with index {0}")]
    UnknownTrack(usize),
    #[error("no instrument at position {0}")]
    UnknownInstrument(usize),
    #[error(transparent)]
    SoundFont(#[from] SoundFontError),
}

/// The instrument a track plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentChoice {
    /// An entry of the built-in table.
    Builtin(BuiltinInstrument),
    /// A preset id of the loaded bank.
    Preset(usize),
}

impl Default for InstrumentChoice {
    fn default() -> Self {
        InstrumentChoice::Builtin(BuiltinInstrument::ALL[0])
    }
}

/// Bookkeeping for one playable track.
#[derive(Debug, Clone)]
pub struct TrackEntry {
    pub index: usize,
    pub strip: Strip,
    pub choice: InstrumentChoice,
    /// Program number from the file's first program change.
    pub program: u8,
    /// GM name of `program` as decoded from the file.
    pub instrument_name: String,
    pub percussion: bool,
    /// The user's own mute toggle, independent of solo.
    pub user_muted: bool,
}

/// Creates the voice for an instrument choice.
fn build_voice(
    choice: InstrumentChoice,
    bank: Option<&dyn PresetBank>,
    sample_rate: u32,
) -> Result<Box<dyn Voice>, MixerError> {
    match (choice, bank) {
        (InstrumentChoice::Builtin(instrument), _) => {
            Ok(Box::new(instrument.create_voice(sample_rate)))
        }
        (InstrumentChoice::Preset(id), Some(bank)) => Ok(bank.create_voice(id, sample_rate)?),
        (InstrumentChoice::Preset(id), None) => Err(MixerError::UnknownInstrument(id)),
    }
}

/// Selector entries for the current bank, or the built-in table.
fn selector_options(bank: Option<&dyn PresetBank>) -> Vec<String> {
    match bank {
        Some(bank) => bank.presets().iter().map(|p| p.label()).collect(),
        None => BuiltinInstrument::names(),
    }
}

/// The per-track mixer.
#[derive(Debug, Default)]
pub struct Mixer {
    entries: BTreeMap<usize, TrackEntry>,
    is_soloing: bool,
    song: Option<Song>,
}

impl Mixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Releases the previous song and builds strips for a new one.
    ///
    /// Every non-empty track gets a channel at 0 dB, a part with its notes
    /// and a voice: the bank preset matching its program when a bank is
    /// given, the first built-in instrument otherwise. Voices are created
    /// before the previous song is released, so a bank that cannot build
    /// them leaves the mixer untouched.
    ///
    /// # Returns
    ///
    /// The number of strips created.
    pub fn load_song(
        &mut self,
        engine: &AudioEngine,
        song: Song,
        bank: Option<&dyn PresetBank>,
    ) -> Result<usize, MixerError> {
        let sample_rate = engine.sample_rate();
        let voices = song
            .playable_tracks()
            .map(|track| Self::initial_voice(track, bank, sample_rate))
            .collect::<Result<Vec<_>, _>>()?;

        self.dispose(engine);

        let options = selector_options(bank);
        for (track, (choice, voice)) in song.playable_tracks().zip(voices) {
            engine.add_track(track, voice, Channel::new());

            let mut strip = Strip::new(track.label(), track.name.clone(), options.clone());
            strip.selected = match choice {
                InstrumentChoice::Builtin(instrument) => instrument.position(),
                InstrumentChoice::Preset(id) => id,
            };
            self.entries.insert(
                track.index,
                TrackEntry {
                    index: track.index,
                    strip,
                    choice,
                    program: track.program,
                    instrument_name: track.instrument_name().to_string(),
                    percussion: track.is_percussion(),
                    user_muted: false,
                },
            );
        }

        engine.set_duration(song.duration());
        info!(
            "Loaded '{}': {} strips, {:.1}s",
            song.name,
            self.entries.len(),
            song.duration()
        );
        self.song = Some(song);
        Ok(self.entries.len())
    }

    fn initial_voice(
        track: &MidiTrack,
        bank: Option<&dyn PresetBank>,
        sample_rate: u32,
    ) -> Result<(InstrumentChoice, Box<dyn Voice>), MixerError> {
        let choice = match bank {
            Some(bank) => {
                InstrumentChoice::Preset(bank.preselect(track.program, track.is_percussion()))
            }
            None => InstrumentChoice::default(),
        };
        let voice = build_voice(choice, bank, sample_rate).map_err(|e| {
            warn!("Track {}: no voice for {:?}: {}", track.index, choice, e);
            e
        })?;
        Ok((choice, voice))
    }

    /// Releases everything from the current song.
    ///
    /// Order: stop the transport, cancel scheduled events, release each
    /// track's audio objects, then drop the strips.
    pub fn dispose(&mut self, engine: &AudioEngine) {
        engine.stop();
        engine.cancel_parts();
        for index in self.entries.keys() {
            engine.remove_track(*index);
        }
        self.entries.clear();
        self.is_soloing = false;
        self.song = None;
        engine.set_duration(0.0);
    }

    pub fn song(&self) -> Option<&Song> {
        self.song.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.song.is_some()
    }

    /// Whether any track is soloed.
    pub fn is_soloing(&self) -> bool {
        self.is_soloing
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Track indices in strip order.
    pub fn indices(&self) -> Vec<usize> {
        self.entries.keys().copied().collect()
    }

    pub fn entry(&self, index: usize) -> Option<&TrackEntry> {
        self.entries.get(&index)
    }

    pub fn entries(&self) -> impl Iterator<Item = &TrackEntry> {
        self.entries.values()
    }

    fn entry_mut(&mut self, index: usize) -> Result<&mut TrackEntry, MixerError> {
        self.entries
            .get_mut(&index)
            .ok_or(MixerError::UnknownTrack(index))
    }

    /// Toggles the user's mute on a track and reconciles solo state.
    ///
    /// # Returns
    ///
    /// The new state of the mute button.
    pub fn toggle_mute(&mut self, engine: &AudioEngine, index: usize) -> Result<bool, MixerError> {
        let entry = self.entry_mut(index)?;
        entry.user_muted = !entry.user_muted;
        entry.strip.mute_active = entry.user_muted;
        let muted = entry.user_muted;
        self.reconcile(engine);
        Ok(muted)
    }

    /// Toggles solo on a track's channel and reconciles solo state.
    pub fn toggle_solo(&mut self, engine: &AudioEngine, index: usize) -> Result<bool, MixerError> {
        if !self.entries.contains_key(&index) {
            return Err(MixerError::UnknownTrack(index));
        }
        let mut solo = false;
        engine.update_channel(index, |c| {
            c.solo = !c.solo;
            solo = c.solo;
        });
        self.reconcile(engine);
        Ok(solo)
    }

    /// Recomputes every channel's effective mute.
    ///
    /// With any track soloed, exactly the non-soloed tracks are muted.
    /// Otherwise each track follows its user mute toggle.
    pub fn reconcile(&mut self, engine: &AudioEngine) {
        let solos: BTreeMap<usize, bool> = self
            .entries
            .keys()
            .map(|&i| (i, engine.channel(i).is_some_and(|c| c.solo)))
            .collect();
        self.is_soloing = solos.values().any(|&s| s);

        for entry in self.entries.values_mut() {
            let solo = solos.get(&entry.index).copied().unwrap_or(false);
            let mute = if self.is_soloing {
                !solo
            } else {
                entry.user_muted
            };
            engine.update_channel(entry.index, |c| c.mute = mute);
            entry.strip.solo_active = solo;
            entry.strip.silenced = mute;
        }
    }

    /// Sets a track's fader, snapped to the fader range and step.
    ///
    /// # Returns
    ///
    /// The value actually applied, in decibels.
    pub fn set_fader(
        &mut self,
        engine: &AudioEngine,
        index: usize,
        db: f32,
    ) -> Result<f32, MixerError> {
        let entry = self.entry_mut(index)?;
        let db = snap_fader(db);
        entry.strip.fader_db = db;
        engine.update_channel(index, |c| c.set_volume_db(db));
        Ok(db)
    }

    /// Moves a track's fader by `delta_db`.
    pub fn nudge_fader(
        &mut self,
        engine: &AudioEngine,
        index: usize,
        delta_db: f32,
    ) -> Result<f32, MixerError> {
        let current = self
            .entries
            .get(&index)
            .map(|e| e.strip.fader_db)
            .ok_or(MixerError::UnknownTrack(index))?;
        self.set_fader(engine, index, current + delta_db)
    }

    /// Switches a track to another selector entry.
    ///
    /// The old voice is silenced and dropped; the track's part keeps
    /// playing into the new one.
    pub fn change_instrument(
        &mut self,
        engine: &AudioEngine,
        index: usize,
        option: usize,
        bank: Option<&dyn PresetBank>,
    ) -> Result<(), MixerError> {
        if !self.entries.contains_key(&index) {
            return Err(MixerError::UnknownTrack(index));
        }
        let choice = match bank {
            Some(bank) => match bank.preset(option) {
                Some(p) => InstrumentChoice::Preset(p.id),
                None => return Err(MixerError::UnknownInstrument(option)),
            },
            None => InstrumentChoice::Builtin(
                BuiltinInstrument::at(option).ok_or(MixerError::UnknownInstrument(option))?,
            ),
        };

        let voice = build_voice(choice, bank, engine.sample_rate())?;
        engine.replace_voice(index, voice);

        let entry = self.entry_mut(index)?;
        entry.choice = choice;
        entry.strip.selected = option;
        info!(
            "Track {} instrument: {}",
            index,
            entry.strip.selected_option().unwrap_or("?")
        );
        Ok(())
    }

    /// Moves a track's selector by `step` entries, wrapping around.
    pub fn cycle_instrument(
        &mut self,
        engine: &AudioEngine,
        index: usize,
        step: isize,
        bank: Option<&dyn PresetBank>,
    ) -> Result<(), MixerError> {
        let entry = self
            .entries
            .get(&index)
            .ok_or(MixerError::UnknownTrack(index))?;
        let count = entry.strip.options.len().max(1) as isize;
        let next = (entry.strip.selected as isize + step).rem_euclid(count) as usize;
        self.change_instrument(engine, index, next, bank)
    }

    /// Repopulates every selector from a bank and preselects presets.
    ///
    /// Each track starts on the preset matching its original program, or
    /// the bank's first preset when none matches.
    pub fn apply_bank(
        &mut self,
        engine: &AudioEngine,
        bank: &dyn PresetBank,
    ) -> Result<(), MixerError> {
        let options = selector_options(Some(bank));
        for entry in self.entries.values_mut() {
            let preset = bank.preselect(entry.program, entry.percussion);
            let voice = bank.create_voice(preset, engine.sample_rate())?;
            engine.replace_voice(entry.index, voice);
            entry.choice = InstrumentChoice::Preset(preset);
            entry.strip.options = options.clone();
            entry.strip.selected = preset;
        }
        info!("Applied bank '{}' to {} tracks", bank.name(), self.entries.len());
        Ok(())
    }

    /// Reverts every track to the default built-in instrument.
    pub fn clear_bank(&mut self, engine: &AudioEngine) {
        let options = selector_options(None);
        let instrument = BuiltinInstrument::ALL[0];
        for entry in self.entries.values_mut() {
            engine.replace_voice(
                entry.index,
                Box::new(instrument.create_voice(engine.sample_rate())),
            );
            entry.choice = InstrumentChoice::Builtin(instrument);
            entry.strip.options = options.clone();
            entry.strip.selected = instrument.position();
        }
    }

    /// Lights the LED of each track that triggered a note recently.
    pub fn update_leds(&mut self, engine: &AudioEngine, hold_secs: f64) {
        let indices = self.indices();
        let active = engine.active_tracks(&indices, hold_secs);
        for (index, lit) in indices.into_iter().zip(active) {
            if let Some(entry) = self.entries.get_mut(&index) {
                entry.strip.led = lit;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{PresetInfo, MAX_VOLUME_DB, MIN_VOLUME_DB};
    use crate::midi::{decode_midi, fixtures};

    const SR: u32 = 8000;

    /// Bank whose presets play built-in instruments.
    struct FakeBank {
        presets: Vec<PresetInfo>,
        broken: bool,
    }

    impl FakeBank {
        fn new(list: &[(u16, u8, &str)]) -> Self {
            let presets = list
                .iter()
                .enumerate()
                .map(|(id, &(bank, patch, name))| PresetInfo {
                    id,
                    name: name.to_string(),
                    bank,
                    patch,
                })
                .collect();
            Self {
                presets,
                broken: false,
            }
        }
    }

    impl PresetBank for FakeBank {
        fn name(&self) -> &str {
            "fake"
        }

        fn presets(&self) -> &[PresetInfo] {
            &self.presets
        }

        fn create_voice(
            &self,
            preset_id: usize,
            sample_rate: u32,
        ) -> Result<Box<dyn Voice>, SoundFontError> {
            if self.broken || preset_id >= self.presets.len() {
                return Err(SoundFontError::Synth("broken".into()));
            }
            Ok(Box::new(BuiltinInstrument::SynthPad.create_voice(sample_rate)))
        }
    }

    fn loaded() -> (AudioEngine, Mixer) {
        let engine = AudioEngine::offline(SR);
        let mut mixer = Mixer::new();
        let song = decode_midi("three", &fixtures::three_track_file()).unwrap();
        mixer.load_song(&engine, song, None).unwrap();
        (engine, mixer)
    }

    fn muted(engine: &AudioEngine, index: usize) -> bool {
        engine.channel(index).map(|c| c.mute).unwrap_or(false)
    }

    fn four_track_song() -> Song {
        let data = fixtures::SmfBuilder::new(480)
            .track(|t| t.note(0, 60, 100, 0, 480))
            .track(|t| t.note(1, 40, 100, 0, 480))
            .track(|t| t.note(2, 70, 100, 0, 480))
            .track(|t| t.note(3, 50, 100, 0, 480))
            .build();
        decode_midi("four", &data).unwrap()
    }

    #[test]
    fn test_one_strip_per_non_empty_track() {
        let (engine, mixer) = loaded();
        assert_eq!(mixer.len(), 2);
        assert_eq!(mixer.indices(), vec![1, 2]);
        assert_eq!(engine.track_indices(), vec![1, 2]);

        let bass = mixer.entry(2).unwrap();
        assert_eq!(bass.program, 38);
        assert_eq!(bass.strip.label, "synth bass 1");
        assert_eq!(bass.strip.subtitle, "Bass");
        assert_eq!(bass.strip.fader_db, 0.0);
        assert_eq!(bass.strip.options.len(), BuiltinInstrument::ALL.len());
        assert_eq!(bass.strip.selected_option(), Some("Acoustic Grand Piano"));
        assert!((engine.duration_seconds() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_solo_one_mutes_others_and_restores() {
        let engine = AudioEngine::offline(SR);
        let mut mixer = Mixer::new();
        mixer.load_song(&engine, four_track_song(), None).unwrap();

        mixer.toggle_mute(&engine, 3).unwrap();
        assert!(muted(&engine, 3));

        mixer.toggle_solo(&engine, 0).unwrap();
        assert!(mixer.is_soloing());
        assert!(!muted(&engine, 0));
        assert!(muted(&engine, 1));
        assert!(muted(&engine, 2));
        assert!(muted(&engine, 3));

        mixer.toggle_solo(&engine, 0).unwrap();
        assert!(!mixer.is_soloing());
        assert!(!muted(&engine, 0));
        assert!(!muted(&engine, 1));
        assert!(!muted(&engine, 2));
        // The user's own mute survives the solo round trip
        assert!(muted(&engine, 3));
        assert!(mixer.entry(3).unwrap().strip.mute_active);
    }

    #[test]
    fn test_solo_two_tracks() {
        let engine = AudioEngine::offline(SR);
        let mut mixer = Mixer::new();
        mixer.load_song(&engine, four_track_song(), None).unwrap();

        mixer.toggle_solo(&engine, 1).unwrap();
        mixer.toggle_solo(&engine, 2).unwrap();
        assert!(muted(&engine, 0));
        assert!(!muted(&engine, 1));
        assert!(!muted(&engine, 2));
        assert!(muted(&engine, 3));
        assert!(mixer.entry(1).unwrap().strip.solo_active);
        assert!(mixer.entry(0).unwrap().strip.silenced);
    }

    #[test]
    fn test_mute_while_soloed_applies_after_unsolo() {
        let (engine, mut mixer) = loaded();
        mixer.toggle_solo(&engine, 1).unwrap();
        mixer.toggle_mute(&engine, 1).unwrap();
        // Solo wins while active
        assert!(!muted(&engine, 1));
        mixer.toggle_solo(&engine, 1).unwrap();
        assert!(muted(&engine, 1));
    }

    #[test]
    fn test_fader_range_maps_to_channel_range() {
        let (engine, mut mixer) = loaded();
        let db = mixer.set_fader(&engine, 1, MIN_VOLUME_DB).unwrap();
        assert_eq!(db, MIN_VOLUME_DB);
        assert_eq!(engine.channel(1).unwrap().volume_db(), MIN_VOLUME_DB);

        mixer.set_fader(&engine, 1, MAX_VOLUME_DB).unwrap();
        assert_eq!(engine.channel(1).unwrap().volume_db(), MAX_VOLUME_DB);

        assert_eq!(mixer.set_fader(&engine, 1, -7.3).unwrap(), -7.5);
        assert_eq!(mixer.nudge_fader(&engine, 1, 0.5).unwrap(), -7.0);
        assert_eq!(mixer.nudge_fader(&engine, 1, 100.0).unwrap(), MAX_VOLUME_DB);
        assert!(matches!(
            mixer.set_fader(&engine, 9, 0.0),
            Err(MixerError::UnknownTrack(9))
        ));
    }

    #[test]
    fn test_reload_disposes_previous_song() {
        let (engine, mut mixer) = loaded();
        mixer.toggle_solo(&engine, 1).unwrap();
        engine.start();

        let count = mixer.load_song(&engine, four_track_song(), None).unwrap();
        assert_eq!(count, 4);
        assert_eq!(mixer.indices(), vec![0, 1, 2, 3]);
        assert_eq!(engine.track_indices(), vec![0, 1, 2, 3]);
        assert!(!mixer.is_soloing());
        assert!(!engine.is_playing());
        assert_eq!(mixer.song().map(|s| s.name.as_str()), Some("four"));

        mixer.dispose(&engine);
        assert!(mixer.is_empty());
        assert_eq!(engine.track_count(), 0);
        assert!(!mixer.is_loaded());
    }

    #[test]
    fn test_change_instrument_swaps_voice() {
        let (engine, mut mixer) = loaded();
        mixer.change_instrument(&engine, 1, 3, None).unwrap();
        assert_eq!(engine.voice_name(1).as_deref(), Some("Synth Pad"));
        let entry = mixer.entry(1).unwrap();
        assert_eq!(entry.choice, InstrumentChoice::Builtin(BuiltinInstrument::SynthPad));
        assert_eq!(entry.strip.selected, 3);

        mixer.cycle_instrument(&engine, 1, 2, None).unwrap();
        assert_eq!(mixer.entry(1).unwrap().strip.selected, 0);
        mixer.cycle_instrument(&engine, 1, -1, None).unwrap();
        assert_eq!(engine.voice_name(1).as_deref(), Some("Percussion"));

        assert!(matches!(
            mixer.change_instrument(&engine, 1, 42, None),
            Err(MixerError::UnknownInstrument(42))
        ));
    }

    #[test]
    fn test_apply_bank_preselects_by_program() {
        let (engine, mut mixer) = loaded();
        let bank = FakeBank::new(&[(0, 0, "Grand"), (0, 4, "EP"), (0, 38, "SynBass")]);
        mixer.apply_bank(&engine, &bank).unwrap();

        let piano = mixer.entry(1).unwrap();
        assert_eq!(piano.choice, InstrumentChoice::Preset(0));
        assert_eq!(piano.strip.options.len(), 3);
        assert_eq!(piano.strip.selected_option(), Some("000:000 Grand"));

        let bass = mixer.entry(2).unwrap();
        assert_eq!(bass.choice, InstrumentChoice::Preset(2));
    }

    #[test]
    fn test_apply_bank_falls_back_to_first_preset() {
        let (engine, mut mixer) = loaded();
        let bank = FakeBank::new(&[(0, 10, "Music Box"), (0, 11, "Vibes")]);
        mixer.apply_bank(&engine, &bank).unwrap();
        assert_eq!(mixer.entry(2).unwrap().strip.selected, 0);
    }

    #[test]
    fn test_load_with_bank_and_clear() {
        let engine = AudioEngine::offline(SR);
        let mut mixer = Mixer::new();
        let bank = FakeBank::new(&[(0, 0, "Grand"), (0, 38, "SynBass")]);
        let song = decode_midi("three", &fixtures::three_track_file()).unwrap();
        mixer.load_song(&engine, song, Some(&bank)).unwrap();
        assert_eq!(mixer.entry(2).unwrap().choice, InstrumentChoice::Preset(1));

        mixer.change_instrument(&engine, 2, 0, Some(&bank)).unwrap();
        assert_eq!(mixer.entry(2).unwrap().choice, InstrumentChoice::Preset(0));

        mixer.clear_bank(&engine);
        let entry = mixer.entry(2).unwrap();
        assert_eq!(entry.choice, InstrumentChoice::default());
        assert_eq!(entry.strip.options, BuiltinInstrument::names());
        assert_eq!(engine.voice_name(2).as_deref(), Some("Acoustic Grand Piano"));
    }

    #[test]
    fn test_broken_bank_keeps_mixer_on_load() {
        let (engine, mut mixer) = loaded();
        let mut bank = FakeBank::new(&[(0, 0, "Grand")]);
        bank.broken = true;

        let result = mixer.load_song(&engine, four_track_song(), Some(&bank));
        assert!(matches!(result, Err(MixerError::SoundFont(_))));
        // The previous song is still in place
        assert_eq!(mixer.indices(), vec![1, 2]);
        assert_eq!(engine.track_indices(), vec![1, 2]);

        // Without the bank every strip offers and plays the built-ins
        mixer.clear_bank(&engine);
        mixer.load_song(&engine, four_track_song(), None).unwrap();
        for entry in mixer.entries() {
            assert_eq!(entry.choice, InstrumentChoice::default());
            assert_eq!(entry.strip.options, BuiltinInstrument::names());
            assert_eq!(entry.strip.selected_option(), Some("Acoustic Grand Piano"));
            assert_eq!(
                engine.voice_name(entry.index).as_deref(),
                Some("Acoustic Grand Piano")
            );
        }

        assert!(mixer.apply_bank(&engine, &bank).is_err());
    }

    #[test]
    fn test_leds_follow_playback() {
        let (engine, mut mixer) = loaded();
        mixer.update_leds(&engine, 0.1);
        assert!(!mixer.entry(1).unwrap().strip.led);

        engine.start();
        let mut left = vec![0.0; 256];
        let mut right = vec![0.0; 256];
        engine.render(&mut left, &mut right);
        mixer.update_leds(&engine, 0.1);
        assert!(mixer.entry(1).unwrap().strip.led);
        assert!(mixer.entry(2).unwrap().strip.led);
    }
}
