//! File ingestion: kind detection and reading.
//!
//! Files reach the player from the command line, the file browser, or a
//! path pasted into the terminal (what a file dropped on the window turns
//! into). Only the extension decides what a file is.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// What a file will be loaded as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Standard MIDI File (`.mid`, `.midi`).
    Midi,
    /// SoundFont bank (`.sf2`).
    SoundFont,
}

/// Errors raised while taking in a file.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unsupported file type: {0}")]
    Unsupported(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl FileKind {
    /// Detects the kind from the extension, case-insensitively.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "mid" | "midi" => Some(FileKind::Midi),
            "sf2" => Some(FileKind::SoundFont),
            _ => None,
        }
    }
}

/// Whether a path names a file the player can load.
pub fn is_loadable(path: &Path) -> bool {
    FileKind::from_path(path).is_some()
}

/// Decodes `%XX` escapes as found in `file://` URLs.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|h| u8::from_str_radix(h, 16).ok());
            if let Some(byte) = hex {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Turns pasted text into a path.
///
/// Terminals paste dropped files as plain paths, quoted paths, paths with
/// backslash-escaped spaces, or `file://` URLs. Only the first line is
/// used. Returns `None` for blank input.
pub fn parse_dropped_path(text: &str) -> Option<PathBuf> {
    let line = text.lines().map(str::trim).find(|l| !l.is_empty())?;

    let unquoted = line
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .or_else(|| line.strip_prefix('"').and_then(|s| s.strip_suffix('"')))
        .unwrap_or(line);

    let path = match unquoted.strip_prefix("file://") {
        Some(rest) => percent_decode(rest),
        None => unquoted.replace("\\ ", " "),
    };

    if path.is_empty() {
        None
    } else {
        Some(PathBuf::from(path))
    }
}

/// Reads a file that must be of the `expected` kind.
///
/// # Errors
///
/// Returns error if the extension does not match or the file cannot be read.
pub fn read_file(path: &Path, expected: FileKind) -> Result<Vec<u8>, IngestError> {
    if FileKind::from_path(path) != Some(expected) {
        return Err(IngestError::Unsupported(path.display().to_string()));
    }
    std::fs::read(path).map_err(|source| IngestError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Display name for a loaded file: its stem.
pub fn display_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("untitled")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_by_extension() {
        assert_eq!(FileKind::from_path(Path::new("a.mid")), Some(FileKind::Midi));
        assert_eq!(FileKind::from_path(Path::new("B.MIDI")), Some(FileKind::Midi));
        assert_eq!(
            FileKind::from_path(Path::new("bank.SF2")),
            Some(FileKind::SoundFont)
        );
        assert_eq!(FileKind::from_path(Path::new("song.mp3")), None);
        assert_eq!(FileKind::from_path(Path::new("noext")), None);
        assert!(is_loadable(Path::new("x.midi")));
    }

    #[test]
    fn test_parse_dropped_path() {
        assert_eq!(
            parse_dropped_path("  /tmp/song.mid \n"),
            Some(PathBuf::from("/tmp/song.mid"))
        );
        assert_eq!(
            parse_dropped_path("'/tmp/my song.mid'"),
            Some(PathBuf::from("/tmp/my song.mid"))
        );
        assert_eq!(
            parse_dropped_path("\"/tmp/a b.sf2\""),
            Some(PathBuf::from("/tmp/a b.sf2"))
        );
        assert_eq!(
            parse_dropped_path("/tmp/my\\ song.mid"),
            Some(PathBuf::from("/tmp/my song.mid"))
        );
        assert_eq!(
            parse_dropped_path("file:///tmp/my%20song.mid"),
            Some(PathBuf::from("/tmp/my song.mid"))
        );
        assert_eq!(parse_dropped_path("   \n  "), None);
    }

    #[test]
    fn test_percent_decode_keeps_bad_escapes() {
        assert_eq!(percent_decode("a%2"), "a%2");
        assert_eq!(percent_decode("a%zzb"), "a%zzb");
        assert_eq!(percent_decode("%41%42"), "AB");
    }

    #[test]
    fn test_read_file_checks_kind() {
        let err = read_file(Path::new("notes.txt"), FileKind::Midi).unwrap_err();
        assert!(matches!(err, IngestError::Unsupported(_)));

        let err = read_file(Path::new("/nonexistent/x.mid"), FileKind::Midi).unwrap_err();
        assert!(matches!(err, IngestError::Io { .. }));
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name(Path::new("/a/b/Moonlight.mid")), "Moonlight");
    }
}
