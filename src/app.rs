//! Application state and event handling.
//!
//! This module defines the main application state that coordinates
//! between the loaded song, the mixer, the audio engine and the TUI.

use crate::audio::{AudioEngine, PresetBank, SoundFontBank, TransportState};
use crate::config::Settings;
use crate::ingest::{self, FileKind, IngestError};
use crate::midi::{decode_midi, format_time};
use crate::mixer::{fader_from_fraction, Mixer, FADER_STEP_DB};
use ratatui::layout::Rect;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Alert shown when a file is not a MIDI file.
pub const ALERT_INVALID_MIDI: &str = "Please load a valid MIDI file (.mid)";

/// Alert shown when MIDI bytes cannot be decoded.
pub const ALERT_CORRUPT_MIDI: &str = "Unable to read the MIDI file. It may be corrupt.";

/// Large fader step for PageUp/PageDown.
pub const FADER_COARSE_STEP_DB: f32 = 6.0;

/// How long status messages stay visible.
const STATUS_TIMEOUT: Duration = Duration::from_secs(3);

/// Visible rows in the file browser list.
const BROWSER_ROWS: usize = 10;

/// State for the file browser dialog.
#[derive(Debug, Clone)]
pub struct FileBrowserState {
    /// Whether the browser is open.
    pub open: bool,
    /// Current directory path.
    pub current_dir: PathBuf,
    /// Entries in the current directory: `..`, folders, then loadable files.
    pub entries: Vec<PathBuf>,
    /// Currently selected index.
    pub selected: usize,
    /// Scroll offset for long lists.
    pub scroll: usize,
}

impl Default for FileBrowserState {
    fn default() -> Self {
        Self {
            open: false,
            current_dir: std::env::current_dir().unwrap_or_default(),
            entries: Vec::new(),
            selected: 0,
            scroll: 0,
        }
    }
}

/// Screen areas of one mixer strip.
#[derive(Debug, Clone, Copy, Default)]
pub struct StripRegions {
    /// Track index the strip belongs to.
    pub track: usize,
    pub area: Rect,
    pub fader: Rect,
    pub mute: Rect,
    pub solo: Rect,
    pub selector: Rect,
}

/// Layout regions for mouse hit testing.
/// Stores the screen coordinates of each control, set while rendering.
#[derive(Debug, Clone, Default)]
pub struct LayoutRegions {
    pub play_button: Rect,
    pub stop_button: Rect,
    pub progress: Rect,
    pub strips: Vec<StripRegions>,
}

/// What a mouse press landed on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Hit {
    Play,
    Stop,
    /// Progress bar, as a fraction of its width.
    Progress(f64),
    /// A strip's fader, as a fraction of its travel from the bottom.
    Fader { track: usize, fraction: f32 },
    Mute(usize),
    Solo(usize),
    Selector(usize),
    /// Elsewhere on a strip.
    Strip(usize),
}

fn contains(rect: Rect, x: u16, y: u16) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

/// Fraction of a vertical fader at row `y`, 1.0 at the top row.
fn fader_fraction_at(rect: Rect, y: u16) -> f32 {
    if rect.height <= 1 {
        return 1.0;
    }
    let from_bottom = (rect.y + rect.height - 1).saturating_sub(y);
    from_bottom as f32 / (rect.height - 1) as f32
}

impl LayoutRegions {
    /// Finds the control at the given screen coordinates.
    pub fn hit_test(&self, x: u16, y: u16) -> Option<Hit> {
        if contains(self.play_button, x, y) {
            return Some(Hit::Play);
        }
        if contains(self.stop_button, x, y) {
            return Some(Hit::Stop);
        }
        if contains(self.progress, x, y) {
            let width = self.progress.width.max(1) as f64;
            let fraction = (x - self.progress.x) as f64 / width;
            return Some(Hit::Progress(fraction.clamp(0.0, 1.0)));
        }
        for strip in &self.strips {
            if !contains(strip.area, x, y) {
                continue;
            }
            let hit = if contains(strip.mute, x, y) {
                Hit::Mute(strip.track)
            } else if contains(strip.solo, x, y) {
                Hit::Solo(strip.track)
            } else if contains(strip.selector, x, y) {
                Hit::Selector(strip.track)
            } else if contains(strip.fader, x, y) {
                Hit::Fader {
                    track: strip.track,
                    fraction: fader_fraction_at(strip.fader, y),
                }
            } else {
                Hit::Strip(strip.track)
            };
            return Some(hit);
        }
        None
    }

    /// Fader fraction for a drag on a track's fader, clamped to its travel.
    pub fn fader_drag(&self, track: usize, y: u16) -> Option<f32> {
        let strip = self.strips.iter().find(|s| s.track == track)?;
        let rect = strip.fader;
        let y = y.clamp(rect.y, rect.y + rect.height.saturating_sub(1));
        Some(fader_fraction_at(rect, y))
    }
}

/// Main application state.
pub struct App {
    /// The audio engine for playback.
    pub audio: AudioEngine,
    /// Per-track mixer for the loaded song.
    pub mixer: Mixer,
    /// Loaded SoundFont bank, if any.
    bank: Option<SoundFontBank>,
    /// Path of the loaded bank.
    pub bank_path: Option<PathBuf>,
    pub settings: Settings,
    /// Position of the selected strip in the mixer.
    pub selected: usize,
    /// Blocking alert; dismissed by any key.
    pub alert: Option<String>,
    /// File waiting to be loaded on the next frame, shown as loading.
    pub pending_load: Option<PathBuf>,
    /// File browser state for loading.
    pub file_browser: FileBrowserState,
    /// Status message to display.
    pub status_message: Option<(String, Instant)>,
    /// Whether the help overlay is shown.
    pub show_help: bool,
    /// Layout regions for mouse hit testing (updated each frame).
    pub layout: LayoutRegions,
    /// Track whose fader is being dragged.
    pub dragging_fader: Option<usize>,
    pub should_quit: bool,
}

impl App {
    /// Creates the application around an audio engine.
    pub fn new(audio: AudioEngine, settings: Settings) -> Self {
        let mut file_browser = FileBrowserState::default();
        if let Some(dir) = &settings.browse_dir {
            file_browser.current_dir = dir.clone();
        }
        Self {
            audio,
            mixer: Mixer::new(),
            bank: None,
            bank_path: None,
            settings,
            selected: 0,
            alert: None,
            pending_load: None,
            file_browser,
            status_message: None,
            show_help: false,
            layout: LayoutRegions::default(),
            dragging_fader: None,
            should_quit: false,
        }
    }

    /// Returns the loaded bank.
    pub fn bank(&self) -> Option<&SoundFontBank> {
        self.bank.as_ref()
    }

    /// Sets a status message to display temporarily.
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some((message.into(), Instant::now()));
    }

    /// Clears expired status messages.
    pub fn clear_expired_status(&mut self) {
        if let Some((_, time)) = &self.status_message {
            if time.elapsed() > STATUS_TIMEOUT {
                self.status_message = None;
            }
        }
    }

    /// Shows a blocking alert.
    pub fn show_alert(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("Alert: {}", message);
        self.alert = Some(message);
    }

    pub fn dismiss_alert(&mut self) {
        self.alert = None;
    }

    /// Whether a load is waiting to run.
    pub fn is_loading(&self) -> bool {
        self.pending_load.is_some()
    }

    // ========== LOADING ==========

    /// Queues a file for loading on the next frame.
    ///
    /// Unknown file kinds are rejected immediately with an alert.
    pub fn request_load(&mut self, path: PathBuf) {
        if FileKind::from_path(&path).is_none() {
            self.show_alert(ALERT_INVALID_MIDI);
            return;
        }
        self.pending_load = Some(path);
    }

    /// Runs a queued load, if any.
    pub fn process_pending_load(&mut self) {
        if let Some(path) = self.pending_load.take() {
            self.load_path(&path);
        }
    }

    /// Loads a MIDI file or SoundFont, chosen by extension.
    pub fn load_path(&mut self, path: &Path) -> bool {
        match FileKind::from_path(path) {
            Some(FileKind::Midi) => self.load_midi(path),
            Some(FileKind::SoundFont) => self.load_soundfont(path),
            None => {
                self.show_alert(ALERT_INVALID_MIDI);
                false
            }
        }
    }

    /// Loads a MIDI file and rebuilds the mixer.
    pub fn load_midi(&mut self, path: &Path) -> bool {
        match ingest::read_file(path, FileKind::Midi) {
            Ok(bytes) => self.load_midi_bytes(&ingest::display_name(path), &bytes),
            Err(IngestError::Unsupported(_)) => {
                self.show_alert(ALERT_INVALID_MIDI);
                false
            }
            Err(e) => {
                error!("{}", e);
                self.show_alert(ALERT_CORRUPT_MIDI);
                false
            }
        }
    }

    /// Decodes MIDI bytes and rebuilds the mixer.
    ///
    /// The bytes are decoded before anything is torn down, so a corrupt
    /// file leaves the current mixer playing as it was.
    pub fn load_midi_bytes(&mut self, name: &str, bytes: &[u8]) -> bool {
        let song = match decode_midi(name, bytes) {
            Ok(song) => song,
            Err(e) => {
                error!("Failed to decode MIDI file '{}': {}", name, e);
                self.show_alert(ALERT_CORRUPT_MIDI);
                return false;
            }
        };

        let bank = self.bank.as_ref().map(|b| b as &dyn PresetBank);
        let strips = match self.mixer.load_song(&self.audio, song.clone(), bank) {
            Ok(strips) => strips,
            Err(e) => {
                // The bank cannot play this song; fall back to the built-ins
                error!("SoundFont failed for '{}': {}", name, e);
                self.unload_soundfont();
                self.show_alert(format!("Unable to load the SoundFont: {}", e));
                match self.mixer.load_song(&self.audio, song, None) {
                    Ok(strips) => strips,
                    Err(e) => {
                        error!("Failed to build the mixer for '{}': {}", name, e);
                        return false;
                    }
                }
            }
        };
        self.selected = 0;
        self.dragging_fader = None;
        self.set_status(format!("Loaded {} ({} tracks)", name, strips));
        true
    }

    /// Loads a SoundFont and applies it to every track.
    ///
    /// On failure the bank is unloaded and tracks return to the built-in
    /// instruments.
    pub fn load_soundfont(&mut self, path: &Path) -> bool {
        let result = SoundFontBank::load(path).map_err(anyhow::Error::from);
        self.install_bank(result, path)
    }

    fn install_bank(&mut self, result: anyhow::Result<SoundFontBank>, path: &Path) -> bool {
        let applied = result.and_then(|bank| {
            self.mixer.apply_bank(&self.audio, &bank)?;
            Ok(bank)
        });
        match applied {
            Ok(bank) => {
                info!("SoundFont active: {}", path.display());
                self.set_status(format!(
                    "SoundFont {} ({} presets)",
                    ingest::display_name(path),
                    bank.presets().len()
                ));
                self.bank = Some(bank);
                self.bank_path = Some(path.to_path_buf());
                true
            }
            Err(e) => {
                error!("Failed to load SoundFont {}: {:#}", path.display(), e);
                self.unload_soundfont();
                self.show_alert(format!("Unable to load the SoundFont: {}", e));
                false
            }
        }
    }

    /// Drops the bank and returns every track to the built-in instruments.
    pub fn unload_soundfont(&mut self) {
        self.bank = None;
        self.bank_path = None;
        self.mixer.clear_bank(&self.audio);
    }

    /// Handles text pasted into the terminal, usually a dropped file.
    pub fn handle_paste(&mut self, text: &str) {
        match ingest::parse_dropped_path(text) {
            Some(path) => self.request_load(path),
            None => self.show_alert(ALERT_INVALID_MIDI),
        }
    }

    // ========== TRANSPORT ==========

    /// Toggles play/pause.
    pub fn toggle_playback(&mut self) {
        if !self.mixer.is_loaded() {
            self.set_status("No song loaded");
            return;
        }
        if self.audio.is_playing() {
            self.audio.pause();
            self.set_status("Paused");
        } else {
            self.audio.start();
            self.set_status("Playing");
        }
    }

    /// Stops playback and rewinds to the start.
    pub fn stop_playback(&mut self) {
        self.audio.stop();
        self.set_status("Stopped");
    }

    /// Seeks to an absolute position in seconds.
    pub fn seek_to(&mut self, seconds: f64) {
        if !self.mixer.is_loaded() {
            return;
        }
        self.audio.seek(seconds);
    }

    /// Seeks relative to the current position.
    pub fn seek_by(&mut self, delta_secs: f64) {
        let target = self.audio.position_seconds() + delta_secs;
        self.seek_to(target.max(0.0));
    }

    /// Seeks to a fraction of the song.
    pub fn seek_fraction(&mut self, fraction: f64) {
        let duration = self.audio.duration_seconds();
        self.seek_to(duration * fraction.clamp(0.0, 1.0));
    }

    /// Position and duration in seconds, for the progress bar.
    pub fn progress(&self) -> (f64, f64) {
        let duration = self.audio.duration_seconds();
        let position = self.audio.position_seconds().min(duration);
        (position, duration)
    }

    /// Elapsed and total time as `m:ss / m:ss`.
    pub fn time_label(&self) -> String {
        let (position, duration) = self.progress();
        format!("{} / {}", format_time(position), format_time(duration))
    }

    pub fn transport_state(&self) -> TransportState {
        self.audio.state()
    }

    /// Per-frame update: status expiry, LEDs and end-of-song stop.
    pub fn tick(&mut self) {
        self.clear_expired_status();
        self.mixer
            .update_leds(&self.audio, self.settings.led_hold_secs());

        if self.audio.is_playing() {
            let end = self.audio.duration_seconds() + self.settings.end_tail_secs;
            if self.audio.position_seconds() >= end {
                info!("End of song reached");
                self.audio.stop();
                self.set_status("Finished");
            }
        }
    }

    // ========== TRACKS ==========

    /// Track index of the selected strip.
    pub fn selected_track(&self) -> Option<usize> {
        self.mixer.indices().get(self.selected).copied()
    }

    /// Moves the strip selection, wrapping around.
    pub fn select_step(&mut self, step: isize) {
        let count = self.mixer.len();
        if count == 0 {
            return;
        }
        self.selected = (self.selected as isize + step).rem_euclid(count as isize) as usize;
    }

    /// Selects the strip of a track index.
    pub fn select_track(&mut self, track: usize) {
        if let Some(pos) = self.mixer.indices().iter().position(|&i| i == track) {
            self.selected = pos;
        }
    }

    fn report<T>(&mut self, result: Result<T, crate::mixer::MixerError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("{}", e);
                self.set_status(e.to_string());
                None
            }
        }
    }

    pub fn toggle_mute(&mut self, track: usize) {
        let result = self.mixer.toggle_mute(&self.audio, track);
        self.report(result);
    }

    pub fn toggle_solo(&mut self, track: usize) {
        let result = self.mixer.toggle_solo(&self.audio, track);
        self.report(result);
    }

    pub fn set_fader(&mut self, track: usize, db: f32) {
        let result = self.mixer.set_fader(&self.audio, track, db);
        self.report(result);
    }

    pub fn nudge_fader(&mut self, track: usize, delta_db: f32) {
        let result = self.mixer.nudge_fader(&self.audio, track, delta_db);
        self.report(result);
    }

    pub fn cycle_instrument(&mut self, track: usize, step: isize) {
        let bank = self.bank.as_ref().map(|b| b as &dyn PresetBank);
        let result = self.mixer.cycle_instrument(&self.audio, track, step, bank);
        if self.report(result).is_some() {
            let name = self
                .mixer
                .entry(track)
                .and_then(|e| e.strip.selected_option())
                .unwrap_or_default()
                .to_string();
            self.set_status(name);
        }
    }

    /// Applies an action to the selected track, if any.
    fn on_selected(&mut self, f: impl FnOnce(&mut Self, usize)) {
        if let Some(track) = self.selected_track() {
            f(self, track);
        }
    }

    pub fn toggle_mute_selected(&mut self) {
        self.on_selected(Self::toggle_mute);
    }

    pub fn toggle_solo_selected(&mut self) {
        self.on_selected(Self::toggle_solo);
    }

    pub fn fader_up_selected(&mut self, coarse: bool) {
        let step = if coarse { FADER_COARSE_STEP_DB } else { FADER_STEP_DB };
        self.on_selected(|app, track| app.nudge_fader(track, step));
    }

    pub fn fader_down_selected(&mut self, coarse: bool) {
        let step = if coarse { FADER_COARSE_STEP_DB } else { FADER_STEP_DB };
        self.on_selected(|app, track| app.nudge_fader(track, -step));
    }

    pub fn cycle_instrument_selected(&mut self, step: isize) {
        self.on_selected(|app, track| app.cycle_instrument(track, step));
    }

    // ========== MOUSE ==========

    /// Updates the layout regions after rendering.
    pub fn update_layout(&mut self, layout: LayoutRegions) {
        self.layout = layout;
    }

    /// Handles a left click.
    pub fn handle_click(&mut self, x: u16, y: u16) {
        let Some(hit) = self.layout.hit_test(x, y) else {
            return;
        };
        match hit {
            Hit::Play => self.toggle_playback(),
            Hit::Stop => self.stop_playback(),
            Hit::Progress(fraction) => self.seek_fraction(fraction),
            Hit::Fader { track, fraction } => {
                self.select_track(track);
                self.set_fader(track, fader_from_fraction(fraction));
                self.dragging_fader = Some(track);
            }
            Hit::Mute(track) => {
                self.select_track(track);
                self.toggle_mute(track);
            }
            Hit::Solo(track) => {
                self.select_track(track);
                self.toggle_solo(track);
            }
            Hit::Selector(track) => {
                self.select_track(track);
                self.cycle_instrument(track, 1);
            }
            Hit::Strip(track) => self.select_track(track),
        }
    }

    /// Handles a drag with the left button held.
    pub fn handle_drag(&mut self, _x: u16, y: u16) {
        if let Some(track) = self.dragging_fader {
            if let Some(fraction) = self.layout.fader_drag(track, y) {
                self.set_fader(track, fader_from_fraction(fraction));
            }
        }
    }

    pub fn handle_release(&mut self) {
        self.dragging_fader = None;
    }

    // ========== FILE BROWSER ==========

    /// Opens the file browser for MIDI files and SoundFonts.
    pub fn open_file_browser(&mut self) {
        self.file_browser.open = true;
        self.file_browser.selected = 0;
        self.file_browser.scroll = 0;
        self.refresh_file_browser();
    }

    /// Refreshes the file browser entries.
    fn refresh_file_browser(&mut self) {
        self.file_browser.entries.clear();

        if self.file_browser.current_dir.parent().is_some() {
            self.file_browser.entries.push(PathBuf::from(".."));
        }

        match std::fs::read_dir(&self.file_browser.current_dir) {
            Ok(entries) => {
                let mut dirs: Vec<PathBuf> = Vec::new();
                let mut files: Vec<PathBuf> = Vec::new();

                for entry in entries.flatten() {
                    let path = entry.path();
                    if path.is_dir() {
                        dirs.push(path);
                    } else if ingest::is_loadable(&path) {
                        files.push(path);
                    }
                }

                dirs.sort();
                files.sort();
                self.file_browser.entries.extend(dirs);
                self.file_browser.entries.extend(files);
            }
            Err(e) => warn!(
                "Cannot read directory {}: {}",
                self.file_browser.current_dir.display(),
                e
            ),
        }

        if self.file_browser.selected >= self.file_browser.entries.len() {
            self.file_browser.selected = 0;
        }
    }

    pub fn file_browser_up(&mut self) {
        if self.file_browser.open && self.file_browser.selected > 0 {
            self.file_browser.selected -= 1;
            if self.file_browser.selected < self.file_browser.scroll {
                self.file_browser.scroll = self.file_browser.selected;
            }
        }
    }

    pub fn file_browser_down(&mut self) {
        if self.file_browser.open
            && self.file_browser.selected + 1 < self.file_browser.entries.len()
        {
            self.file_browser.selected += 1;
            if self.file_browser.selected >= self.file_browser.scroll + BROWSER_ROWS {
                self.file_browser.scroll = self.file_browser.selected + 1 - BROWSER_ROWS;
            }
        }
    }

    /// Enters the selected directory or queues the selected file.
    pub fn file_browser_select(&mut self) {
        if !self.file_browser.open {
            return;
        }
        let Some(selected) = self
            .file_browser
            .entries
            .get(self.file_browser.selected)
            .cloned()
        else {
            return;
        };

        if selected == Path::new("..") {
            if let Some(parent) = self.file_browser.current_dir.parent() {
                self.file_browser.current_dir = parent.to_path_buf();
                self.file_browser.selected = 0;
                self.file_browser.scroll = 0;
                self.refresh_file_browser();
            }
        } else if selected.is_dir() {
            self.file_browser.current_dir = selected;
            self.file_browser.selected = 0;
            self.file_browser.scroll = 0;
            self.refresh_file_browser();
        } else {
            self.file_browser.open = false;
            self.request_load(selected);
        }
    }

    pub fn file_browser_cancel(&mut self) {
        self.file_browser.open = false;
        self.set_status("Load cancelled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{MAX_VOLUME_DB, MIN_VOLUME_DB};
    use crate::midi::fixtures;

    fn app() -> App {
        App::new(AudioEngine::offline(8000), Settings::default())
    }

    fn loaded_app() -> App {
        let mut app = app();
        assert!(app.load_midi_bytes("three", &fixtures::three_track_file()));
        app
    }

    fn advance(app: &App, seconds: f64) {
        let frames = (seconds * 8000.0) as usize;
        let mut left = vec![0.0; frames];
        let mut right = vec![0.0; frames];
        app.audio.render(&mut left, &mut right);
    }

    #[test]
    fn test_corrupt_midi_keeps_current_mixer() {
        let mut app = loaded_app();
        assert!(!app.load_midi_bytes("junk", b"MThd garbage"));
        assert_eq!(app.alert.as_deref(), Some(ALERT_CORRUPT_MIDI));
        assert_eq!(app.mixer.len(), 2);
        assert_eq!(app.mixer.song().map(|s| s.name.as_str()), Some("three"));
    }

    #[test]
    fn test_unknown_file_kind_alerts() {
        let mut app = app();
        app.request_load(PathBuf::from("song.mp3"));
        assert_eq!(app.alert.as_deref(), Some(ALERT_INVALID_MIDI));
        assert!(!app.is_loading());

        app.dismiss_alert();
        app.handle_paste("'/tmp/some song.mid'");
        assert!(app.alert.is_none());
        assert_eq!(app.pending_load, Some(PathBuf::from("/tmp/some song.mid")));
    }

    #[test]
    fn test_missing_midi_file_alerts() {
        let mut app = app();
        app.request_load(PathBuf::from("/nonexistent/song.mid"));
        assert!(app.is_loading());
        app.process_pending_load();
        assert!(!app.is_loading());
        assert_eq!(app.alert.as_deref(), Some(ALERT_CORRUPT_MIDI));
    }

    #[test]
    fn test_broken_soundfont_resets_bank() {
        let mut app = loaded_app();
        assert!(!app.load_soundfont(Path::new("/nonexistent/bank.sf2")));
        assert!(app.alert.is_some());
        assert!(app.bank().is_none());
        assert!(app.bank_path.is_none());
        let entry = app.mixer.entry(1).unwrap();
        assert_eq!(entry.strip.selected_option(), Some("Acoustic Grand Piano"));
    }

    #[test]
    fn test_transport_and_auto_stop() {
        let mut app = loaded_app();
        app.toggle_playback();
        assert_eq!(app.transport_state(), TransportState::Playing);

        advance(&app, 0.5);
        app.tick();
        assert!(app.audio.is_playing());
        assert_eq!(app.time_label(), "0:00 / 0:01");

        app.toggle_playback();
        assert_eq!(app.transport_state(), TransportState::Paused);

        app.seek_by(5.0);
        let (position, duration) = app.progress();
        assert_eq!(position, duration);

        app.settings.end_tail_secs = 0.5;
        app.toggle_playback();
        advance(&app, 0.6);
        app.tick();
        assert_eq!(app.transport_state(), TransportState::Stopped);
        assert_eq!(app.progress().0, 0.0);
    }

    #[test]
    fn test_playback_needs_song() {
        let mut app = app();
        app.toggle_playback();
        assert_eq!(app.transport_state(), TransportState::Stopped);
    }

    #[test]
    fn test_selected_track_controls() {
        let mut app = loaded_app();
        assert_eq!(app.selected_track(), Some(1));
        app.select_step(1);
        assert_eq!(app.selected_track(), Some(2));
        app.select_step(1);
        assert_eq!(app.selected_track(), Some(1));
        app.select_step(-1);
        assert_eq!(app.selected_track(), Some(2));

        app.toggle_solo_selected();
        assert!(app.audio.channel(1).unwrap().mute);

        for _ in 0..20 {
            app.fader_up_selected(true);
        }
        assert_eq!(app.audio.channel(2).unwrap().volume_db(), MAX_VOLUME_DB);
        for _ in 0..20 {
            app.fader_down_selected(true);
        }
        assert_eq!(app.audio.channel(2).unwrap().volume_db(), MIN_VOLUME_DB);
        app.fader_up_selected(false);
        assert_eq!(app.audio.channel(2).unwrap().volume_db(), MIN_VOLUME_DB + 0.5);

        app.cycle_instrument_selected(1);
        assert_eq!(app.audio.voice_name(2).as_deref(), Some("Electric Piano"));
    }

    #[test]
    fn test_mouse_hits() {
        let mut app = loaded_app();
        let fader = Rect::new(2, 5, 3, 11);
        app.update_layout(LayoutRegions {
            progress: Rect::new(0, 1, 100, 1),
            strips: vec![StripRegions {
                track: 2,
                area: Rect::new(0, 3, 20, 20),
                fader,
                mute: Rect::new(0, 17, 5, 1),
                solo: Rect::new(6, 17, 5, 1),
                selector: Rect::new(0, 19, 20, 1),
            }],
            ..LayoutRegions::default()
        });

        // Top row of the fader is the maximum
        app.handle_click(3, 5);
        assert_eq!(app.selected_track(), Some(2));
        assert_eq!(app.audio.channel(2).unwrap().volume_db(), MAX_VOLUME_DB);
        app.handle_drag(3, 40);
        assert_eq!(app.audio.channel(2).unwrap().volume_db(), MIN_VOLUME_DB);
        app.handle_release();
        app.handle_drag(3, 5);
        assert_eq!(app.audio.channel(2).unwrap().volume_db(), MIN_VOLUME_DB);

        app.handle_click(1, 17);
        assert!(app.mixer.entry(2).unwrap().user_muted);
        app.handle_click(7, 17);
        assert!(app.mixer.is_soloing());

        app.handle_click(50, 1);
        assert!((app.progress().0 - 0.5).abs() < 0.01);
    }
}
