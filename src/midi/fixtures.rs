//! In-memory Standard MIDI File writer for tests.

/// Writes a variable-length quantity (VLQ) used for delta times in MIDI.
fn write_vlq(value: u32, buffer: &mut Vec<u8>) {
    let mut bytes = vec![(value & 0x7F) as u8];
    let mut temp = value >> 7;
    while temp > 0 {
        bytes.push((temp & 0x7F) as u8 | 0x80);
        temp >>= 7;
    }
    buffer.extend(bytes.iter().rev());
}

/// Events of one track chunk at absolute ticks.
#[derive(Default)]
pub struct TrackBuilder {
    events: Vec<(u32, Vec<u8>)>,
}

impl TrackBuilder {
    pub fn name(mut self, name: &str) -> Self {
        let mut data = vec![0xFF, 0x03];
        write_vlq(name.len() as u32, &mut data);
        data.extend_from_slice(name.as_bytes());
        self.events.push((0, data));
        self
    }

    pub fn tempo(mut self, tick: u32, usec_per_beat: u32) -> Self {
        let b = usec_per_beat.to_be_bytes();
        self.events.push((tick, vec![0xFF, 0x51, 0x03, b[1], b[2], b[3]]));
        self
    }

    pub fn program(mut self, tick: u32, channel: u8, program: u8) -> Self {
        self.events.push((tick, vec![0xC0 | channel, program]));
        self
    }

    pub fn on(mut self, tick: u32, channel: u8, pitch: u8, velocity: u8) -> Self {
        self.events.push((tick, vec![0x90 | channel, pitch, velocity]));
        self
    }

    pub fn off(mut self, tick: u32, channel: u8, pitch: u8) -> Self {
        self.events.push((tick, vec![0x80 | channel, pitch, 0]));
        self
    }

    pub fn note(self, channel: u8, pitch: u8, velocity: u8, start: u32, duration: u32) -> Self {
        self.on(start, channel, pitch, velocity)
            .off(start + duration, channel, pitch)
    }

    fn encode(mut self) -> Vec<u8> {
        self.events.sort_by_key(|(tick, _)| *tick);
        let mut data = Vec::new();
        let mut last = 0;
        for (tick, bytes) in self.events {
            write_vlq(tick - last, &mut data);
            data.extend(bytes);
            last = tick;
        }
        data.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);

        let mut chunk = b"MTrk".to_vec();
        chunk.extend_from_slice(&(data.len() as u32).to_be_bytes());
        chunk.extend(data);
        chunk
    }
}

/// Builds a complete SMF file.
pub struct SmfBuilder {
    format: u16,
    ticks_per_beat: u16,
    tracks: Vec<TrackBuilder>,
}

impl SmfBuilder {
    pub fn new(ticks_per_beat: u16) -> Self {
        Self {
            format: 1,
            ticks_per_beat,
            tracks: Vec::new(),
        }
    }

    pub fn format(mut self, format: u16) -> Self {
        self.format = format;
        self
    }

    pub fn track(mut self, build: impl FnOnce(TrackBuilder) -> TrackBuilder) -> Self {
        self.tracks.push(build(TrackBuilder::default()));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = b"MThd".to_vec();
        out.extend_from_slice(&6u32.to_be_bytes());
        out.extend_from_slice(&self.format.to_be_bytes());
        out.extend_from_slice(&(self.tracks.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.ticks_per_beat.to_be_bytes());
        for track in self.tracks {
            out.extend(track.encode());
        }
        out
    }
}

/// A two-track song (piano on channel 0, bass on channel 1) plus an
/// empty conductor track, one second long at 120 BPM.
pub fn three_track_file() -> Vec<u8> {
    SmfBuilder::new(480)
        .track(|t| t.name("Conductor").tempo(0, 500_000))
        .track(|t| {
            t.name("Piano")
                .program(0, 0, 0)
                .note(0, 60, 100, 0, 480)
                .note(0, 64, 100, 480, 480)
        })
        .track(|t| t.name("Bass").program(0, 1, 38).note(1, 36, 100, 0, 960))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_vlq() {
        let mut buf = Vec::new();
        write_vlq(0, &mut buf);
        write_vlq(0x7F, &mut buf);
        write_vlq(0x80, &mut buf);
        write_vlq(0x3FFF, &mut buf);
        assert_eq!(buf, vec![0x00, 0x7F, 0x81, 0x00, 0xFF, 0x7F]);
    }
}
