//! Standard MIDI File (SMF) decoding.
//!
//! Turns .mid and .midi bytes into a [`Song`]. `midly` parses the chunks;
//! this module pairs note events into notes and resolves their timing.
//!
//! # Behavior
//!
//! - Format 1 files produce one track per track chunk, in file order
//! - Format 0 files are split into one track per channel
//! - Tempo events from every chunk build one shared tempo map
//! - The first program change of a track sets its program
//! - Note-offs close the oldest open note of the same key and channel
//! - Notes still open at the end of a chunk end at the chunk's last tick

use super::{MidiTrack, Note, Song, TempoMap};
use midly::{Format, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use std::collections::{BTreeMap, HashMap, VecDeque};
use thiserror::Error;

/// Errors that can occur while decoding MIDI bytes.
#[derive(Debug, Error)]
pub enum MidiDecodeError {
    /// The bytes are not a valid Standard MIDI File.
    #[error("MIDI parse error: {0}")]
    Parse(String),
    /// The file is valid but uses a feature this player does not handle.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Open notes during decoding.
/// Key is (channel, pitch), value is a queue of (start_tick, velocity).
type ActiveNotes = HashMap<(u8, u8), VecDeque<(u32, u8)>>;

/// Decodes MIDI file bytes into a song.
///
/// # Arguments
///
/// * `name` - Song name, usually the file stem
/// * `data` - Raw .mid bytes
///
/// # Errors
///
/// Returns error if the bytes cannot be parsed or the file is format 2
pub fn decode_midi(name: &str, data: &[u8]) -> Result<Song, MidiDecodeError> {
    let smf = Smf::parse(data).map_err(|e| MidiDecodeError::Parse(e.to_string()))?;

    if smf.header.format == Format::Sequential {
        return Err(MidiDecodeError::UnsupportedFormat(
            "Format 2 (sequential) MIDI files not supported".to_string(),
        ));
    }

    let tempo = match smf.header.timing {
        Timing::Metrical(tpb) => TempoMap::metrical(tpb.as_int(), collect_tempo_changes(&smf)),
        Timing::Timecode(fps, subframes) => TempoMap::timecode(fps.as_f32(), subframes),
    };

    let mut tracks: Vec<MidiTrack> = Vec::new();
    for (chunk_idx, chunk) in smf.tracks.iter().enumerate() {
        let decoded = decode_chunk(chunk, chunk_idx);
        if smf.header.format == Format::SingleTrack {
            tracks.extend(decoded.split_by_channel());
        } else {
            tracks.push(decoded.into_track());
        }
    }

    for track in &mut tracks {
        for note in track.notes_mut() {
            note.resolve_time(|tick| tempo.ticks_to_seconds(tick));
        }
    }

    let song = Song::new(name, tempo, tracks);
    tracing::debug!(
        tracks = song.track_count(),
        notes = song.note_count(),
        duration = song.duration(),
        "Decoded MIDI file"
    );
    Ok(song)
}

/// Collects `(tick, microseconds per beat)` tempo events from all chunks.
fn collect_tempo_changes(smf: &Smf) -> Vec<(u32, u32)> {
    let mut changes = Vec::new();
    for chunk in &smf.tracks {
        let mut tick: u32 = 0;
        for event in chunk {
            tick = tick.saturating_add(event.delta.as_int());
            if let TrackEventKind::Meta(MetaMessage::Tempo(usec)) = event.kind {
                changes.push((tick, usec.as_int()));
            }
        }
    }
    changes
}

/// Notes and metadata of one track chunk.
struct DecodedChunk {
    index: usize,
    name: Option<String>,
    /// Notes and first program per channel, in channel order.
    channels: BTreeMap<u8, (Vec<Note>, Option<u8>)>,
    /// First channel with an event in the chunk.
    first_channel: Option<u8>,
}

impl DecodedChunk {
    /// Merges all channels into a single track.
    fn into_track(self) -> MidiTrack {
        let channel = self.first_channel.unwrap_or(0);
        let mut track = MidiTrack::new(self.index, self.name.unwrap_or_default(), channel);
        track.program = self
            .channels
            .get(&channel)
            .and_then(|(_, program)| *program)
            .or_else(|| self.channels.values().find_map(|(_, program)| *program))
            .unwrap_or(0);
        for (notes, _) in self.channels.into_values() {
            for note in notes {
                track.add_note(note);
            }
        }
        track
    }

    /// Splits a format 0 chunk into one track per channel.
    fn split_by_channel(self) -> Vec<MidiTrack> {
        let name = self.name.unwrap_or_default();
        self.channels
            .into_iter()
            .map(|(channel, (notes, program))| {
                let mut track = MidiTrack::new(self.index, name.clone(), channel);
                track.program = program.unwrap_or(0);
                for note in notes {
                    track.add_note(note);
                }
                track
            })
            .collect()
    }
}

/// Walks one track chunk, pairing note-ons with note-offs.
fn decode_chunk(chunk: &[TrackEvent], index: usize) -> DecodedChunk {
    let mut decoded = DecodedChunk {
        index,
        name: None,
        channels: BTreeMap::new(),
        first_channel: None,
    };
    let mut active_notes: ActiveNotes = HashMap::new();
    let mut current_tick: u32 = 0;

    for event in chunk {
        current_tick = current_tick.saturating_add(event.delta.as_int());

        match event.kind {
            TrackEventKind::Meta(MetaMessage::TrackName(bytes)) => {
                if decoded.name.is_none() {
                    decoded.name = Some(String::from_utf8_lossy(bytes).trim().to_string());
                }
            }
            TrackEventKind::Midi { channel, message } => {
                let ch = channel.as_int();
                decoded.first_channel.get_or_insert(ch);
                let (notes, program) = decoded.channels.entry(ch).or_default();

                match message {
                    MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                        active_notes
                            .entry((ch, key.as_int()))
                            .or_default()
                            .push_back((current_tick, vel.as_int()));
                    }
                    // Note on with velocity 0 = note off
                    MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                        let pitch = key.as_int();
                        if let Some((start, velocity)) = active_notes
                            .get_mut(&(ch, pitch))
                            .and_then(|queue| queue.pop_front())
                        {
                            let duration = current_tick.saturating_sub(start).max(1);
                            notes.push(Note::new(pitch, velocity, start, duration));
                        }
                    }
                    MidiMessage::ProgramChange { program: p } => {
                        program.get_or_insert(p.as_int());
                    }
                    _ => {} // Controllers, bends and aftertouch do not affect the mixer
                }
            }
            _ => {} // Other meta events and SysEx
        }
    }

    // Close notes left open when the chunk ended
    for ((ch, pitch), queue) in active_notes {
        if let Some((notes, _)) = decoded.channels.get_mut(&ch) {
            for (start, velocity) in queue {
                let duration = current_tick.saturating_sub(start).max(1);
                notes.push(Note::new(pitch, velocity, start, duration));
            }
        }
    }

    decoded
}
