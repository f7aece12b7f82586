//! Settings file and command-line options.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// User settings, read from a JSON file.
///
/// Every field is optional in the file; missing fields take their
/// defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// SoundFont loaded at startup when none is given on the command line.
    pub soundfont: Option<PathBuf>,
    /// Directory the file browser opens in.
    pub browse_dir: Option<PathBuf>,
    /// How long a track's activity light stays lit after a note (ms).
    pub led_hold_ms: u64,
    /// Extra time after the last note ends before playback stops (s).
    pub end_tail_secs: f64,
    /// Seek step for the arrow keys (s).
    pub seek_step_secs: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            soundfont: None,
            browse_dir: None,
            led_hold_ms: 100,
            end_tail_secs: 2.0,
            seek_step_secs: 5.0,
        }
    }
}

impl Settings {
    /// Loads settings from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or is not valid JSON.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        Self::from_json(&json)
            .with_context(|| format!("Failed to parse settings: {}", path.display()))
    }

    /// Parses settings from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut settings: Settings = serde_json::from_str(json)?;
        settings.sanitize();
        Ok(settings)
    }

    /// Serializes the settings as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn sanitize(&mut self) {
        if !self.end_tail_secs.is_finite() || self.end_tail_secs < 0.0 {
            self.end_tail_secs = Self::default().end_tail_secs;
        }
        if !self.seek_step_secs.is_finite() || self.seek_step_secs <= 0.0 {
            self.seek_step_secs = Self::default().seek_step_secs;
        }
    }

    /// LED hold time in seconds.
    pub fn led_hold_secs(&self) -> f64 {
        self.led_hold_ms as f64 / 1000.0
    }
}

/// Command-line options for the application.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOptions {
    /// MIDI file to load at startup.
    pub midi: Option<PathBuf>,
    /// SoundFont file to load at startup.
    pub soundfont: Option<PathBuf>,
    /// Settings file.
    pub config: Option<PathBuf>,
    /// Log file; logs are discarded when absent.
    pub log: Option<PathBuf>,
    /// Run without an audio device.
    pub no_audio: bool,
    /// Print usage and exit.
    pub help: bool,
}

/// Usage text printed by `--help`.
pub const USAGE: &str = "\
midimix - Terminal MIDI player with a per-track mixer

Usage: midimix [OPTIONS] [FILE.mid] [BANK.sf2]

Options:
  -sf, --soundfont PATH  Load a SoundFont bank (.sf2) for instrument sounds
  -c, --config PATH      Read settings from a JSON file
  --log PATH             Write logs to a file (filter with RUST_LOG)
  --no-audio             Run without opening an audio device
  -h, --help             Print this help message

Without a SoundFont, tracks play through the built-in instruments.";

impl CliOptions {
    /// Parses arguments, not including the program name.
    ///
    /// Supports:
    /// - `--soundfont <path>` or `-sf <path>`
    /// - `--config <path>` or `-c <path>`
    /// - `--log <path>`
    /// - `--no-audio`
    /// - `--help` or `-h`
    /// - Positional `.mid`/`.midi` and `.sf2` paths
    ///
    /// # Errors
    ///
    /// Returns error on an unknown option or a missing option value.
    pub fn parse_from<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let mut options = Self::default();
        let mut i = 0;

        let value = |i: usize, flag: &str| -> Result<PathBuf> {
            match args.get(i) {
                Some(v) => Ok(PathBuf::from(v)),
                None => bail!("{} requires a path argument", flag),
            }
        };

        while i < args.len() {
            match args[i].as_str() {
                "--soundfont" | "-sf" => {
                    i += 1;
                    options.soundfont = Some(value(i, "--soundfont")?);
                }
                "--config" | "-c" => {
                    i += 1;
                    options.config = Some(value(i, "--config")?);
                }
                "--log" => {
                    i += 1;
                    options.log = Some(value(i, "--log")?);
                }
                "--no-audio" => options.no_audio = true,
                "--help" | "-h" => options.help = true,
                other if other.starts_with('-') => {
                    bail!("Unknown option: {}", other)
                }
                other => {
                    let path = PathBuf::from(other);
                    match crate::ingest::FileKind::from_path(&path) {
                        Some(crate::ingest::FileKind::SoundFont) => options.soundfont = Some(path),
                        Some(crate::ingest::FileKind::Midi) => options.midi = Some(path),
                        None => bail!("Unrecognized file: {} (expected .mid, .midi or .sf2)", other),
                    }
                }
            }
            i += 1;
        }

        Ok(options)
    }

    /// Parses the process arguments.
    pub fn parse() -> Result<Self> {
        Self::parse_from(std::env::args().skip(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.led_hold_ms, 100);
        assert!((settings.led_hold_secs() - 0.1).abs() < 1e-9);
        assert!(settings.soundfont.is_none());
    }

    #[test]
    fn test_partial_settings_json() {
        let settings = Settings::from_json(r#"{ "soundfont": "gm.sf2", "end_tail_secs": -1 }"#)
            .unwrap();
        assert_eq!(settings.soundfont, Some(PathBuf::from("gm.sf2")));
        assert_eq!(settings.end_tail_secs, 2.0);
        assert_eq!(settings.seek_step_secs, 5.0);

        let json = settings.to_json().unwrap();
        assert_eq!(Settings::from_json(&json).unwrap(), settings);
        assert!(Settings::from_json("not json").is_err());
    }

    #[test]
    fn test_cli_flags() {
        let options = CliOptions::parse_from([
            "song.mid",
            "-sf",
            "bank.sf2",
            "--config",
            "cfg.json",
            "--log",
            "out.log",
            "--no-audio",
        ])
        .unwrap();
        assert_eq!(options.midi, Some(PathBuf::from("song.mid")));
        assert_eq!(options.soundfont, Some(PathBuf::from("bank.sf2")));
        assert_eq!(options.config, Some(PathBuf::from("cfg.json")));
        assert_eq!(options.log, Some(PathBuf::from("out.log")));
        assert!(options.no_audio);
        assert!(!options.help);
    }

    #[test]
    fn test_cli_positional_soundfont() {
        let options = CliOptions::parse_from(["Bank.SF2", "tune.MIDI"]).unwrap();
        assert_eq!(options.soundfont, Some(PathBuf::from("Bank.SF2")));
        assert_eq!(options.midi, Some(PathBuf::from("tune.MIDI")));
    }

    #[test]
    fn test_cli_errors() {
        assert!(CliOptions::parse_from(["--soundfont"]).is_err());
        assert!(CliOptions::parse_from(["--bogus"]).is_err());
        assert!(CliOptions::parse_from(["song.mp3"]).is_err());
        assert!(CliOptions::parse_from(["-h"]).unwrap().help);
        assert_eq!(
            CliOptions::parse_from(Vec::<String>::new()).unwrap(),
            CliOptions::default()
        );
    }
}
