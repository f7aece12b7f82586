//! The synthesizer seam of a track.
//!
//! Each track node in the mix graph owns one voice. Built-in synthesizers
//! and SoundFont presets both implement [`Voice`], so instrument switching
//! only swaps the boxed voice while the track's part keeps dispatching.

/// A polyphonic sound source driven by note events.
pub trait Voice: Send {
    /// Display name of the instrument.
    fn name(&self) -> &str;

    /// Starts a note.
    fn note_on(&mut self, pitch: u8, velocity: u8);

    /// Releases a note.
    fn note_off(&mut self, pitch: u8);

    /// Releases every sounding note; `immediate` skips the release phase.
    fn all_notes_off(&mut self, immediate: bool);

    /// Renders the next block, overwriting both buffers.
    ///
    /// The left and right buffers must be the same length.
    fn render(&mut self, left: &mut [f32], right: &mut [f32]);

    /// Number of notes currently producing sound.
    fn active_notes(&self) -> usize;
}
