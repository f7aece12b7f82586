//! Decoded MIDI song model.
//!
//! This module turns Standard MIDI File bytes into a [`Song`]: a list of
//! tracks, each holding notes with both tick and second timing. Byte-level
//! parsing is done by `midly`; this module only walks the decoded events.

mod decode;
#[cfg(test)]
pub(crate) mod fixtures;
mod note;
mod song;
mod tempo;
mod track;

pub use decode::{decode_midi, MidiDecodeError};
pub use note::Note;
pub use song::Song;
pub use tempo::TempoMap;
pub use track::MidiTrack;

/// MIDI channel reserved for percussion in General MIDI (zero-based).
pub const PERCUSSION_CHANNEL: u8 = 9;

/// Standard MIDI note names for display purposes.
/// Maps MIDI note number (0-127) to note name within an octave.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// General MIDI level 1 instrument names, indexed by program number.
pub const GM_PROGRAM_NAMES: [&str; 128] = [
    "acoustic grand piano",
    "bright acoustic piano",
    "electric grand piano",
    "honky-tonk piano",
    "electric piano 1",
    "electric piano 2",
    "harpsichord",
    "clavi",
    "celesta",
    "glockenspiel",
    "music box",
    "vibraphone",
    "marimba",
    "xylophone",
    "tubular bells",
    "dulcimer",
    "drawbar organ",
    "percussive organ",
    "rock organ",
    "church organ",
    "reed organ",
    "accordion",
    "harmonica",
    "tango accordion",
    "acoustic guitar (nylon)",
    "acoustic guitar (steel)",
    "electric guitar (jazz)",
    "electric guitar (clean)",
    "electric guitar (muted)",
    "overdriven guitar",
    "distortion guitar",
    "guitar harmonics",
    "acoustic bass",
    "electric bass (finger)",
    "electric bass (pick)",
    "fretless bass",
    "slap bass 1",
    "slap bass 2",
    "synth bass 1",
    "synth bass 2",
    "violin",
    "viola",
    "cello",
    "contrabass",
    "tremolo strings",
    "pizzicato strings",
    "orchestral harp",
    "timpani",
    "string ensemble 1",
    "string ensemble 2",
    "synthstrings 1",
    "synthstrings 2",
    "choir aahs",
    "voice oohs",
    "synth voice",
    "orchestra hit",
    "trumpet",
    "trombone",
    "tuba",
    "muted trumpet",
    "french horn",
    "brass section",
    "synthbrass 1",
    "synthbrass 2",
    "soprano sax",
    "alto sax",
    "tenor sax",
    "baritone sax",
    "oboe",
    "english horn",
    "bassoon",
    "clarinet",
    "piccolo",
    "flute",
    "recorder",
    "pan flute",
    "blown bottle",
    "shakuhachi",
    "whistle",
    "ocarina",
    "lead 1 (square)",
    "lead 2 (sawtooth)",
    "lead 3 (calliope)",
    "lead 4 (chiff)",
    "lead 5 (charang)",
    "lead 6 (voice)",
    "lead 7 (fifths)",
    "lead 8 (bass + lead)",
    "pad 1 (new age)",
    "pad 2 (warm)",
    "pad 3 (polysynth)",
    "pad 4 (choir)",
    "pad 5 (bowed)",
    "pad 6 (metallic)",
    "pad 7 (halo)",
    "pad 8 (sweep)",
    "fx 1 (rain)",
    "fx 2 (soundtrack)",
    "fx 3 (crystal)",
    "fx 4 (atmosphere)",
    "fx 5 (brightness)",
    "fx 6 (goblins)",
    "fx 7 (echoes)",
    "fx 8 (sci-fi)",
    "sitar",
    "banjo",
    "shamisen",
    "koto",
    "kalimba",
    "bag pipe",
    "fiddle",
    "shanai",
    "tinkle bell",
    "agogo",
    "steel drums",
    "woodblock",
    "taiko drum",
    "melodic tom",
    "synth drum",
    "reverse cymbal",
    "guitar fret noise",
    "breath noise",
    "seashore",
    "bird tweet",
    "telephone ring",
    "helicopter",
    "applause",
    "gunshot",
];

/// General MIDI drum kit names on the percussion channel.
const GM_DRUM_KITS: [(u8, &str); 9] = [
    (0, "standard kit"),
    (8, "room kit"),
    (16, "power kit"),
    (24, "electronic kit"),
    (25, "tr-808 kit"),
    (32, "jazz kit"),
    (40, "brush kit"),
    (48, "orchestra kit"),
    (56, "sound fx kit"),
];

/// Returns the General MIDI instrument name for a program on a channel.
///
/// On the percussion channel the program selects a drum kit; unknown kit
/// numbers fall back to the standard kit.
pub fn instrument_name(program: u8, channel: u8) -> &'static str {
    if channel == PERCUSSION_CHANNEL {
        GM_DRUM_KITS
            .iter()
            .find(|(p, _)| *p == program)
            .map(|(_, name)| *name)
            .unwrap_or(GM_DRUM_KITS[0].1)
    } else {
        GM_PROGRAM_NAMES[(program & 0x7F) as usize]
    }
}

/// Converts a MIDI note number to a human-readable note name with octave.
///
/// # Examples
///
/// ```
/// use midimix::midi::note_to_name;
///
/// assert_eq!(note_to_name(60), "C4");
/// ```
pub fn note_to_name(note: u8) -> String {
    let octave = (note / 12) as i8 - 1; // MIDI octave convention
    let note_index = (note % 12) as usize;
    format!("{}{}", NOTE_NAMES[note_index], octave)
}

/// Formats seconds as `m:ss`, truncating fractional seconds.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}
