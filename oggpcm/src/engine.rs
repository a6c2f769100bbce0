//! Interface to the codec-specific synthesis engine.
//!
//! The adapter never decodes audio itself. It hands header and audio packets
//! to a [`SynthesisEngine`] and drains the multichannel float frames the
//! engine has produced.

use crate::process::packet::Packet;
use crate::utils::errors::EngineError;

/// Codec-specific decode core driven by the stream adapter.
///
/// Calls arrive in this order: [`reset_info_and_comment`] once per session,
/// [`header_ingest`] for each of the three header packets, then for every
/// audio packet [`block_synthesis`] followed by repeated
/// [`pcm_out`]/[`advance_read_cursor`] pairs until no frames remain.
/// [`cleanup`] is called exactly once.
///
/// [`reset_info_and_comment`]: SynthesisEngine::reset_info_and_comment
/// [`header_ingest`]: SynthesisEngine::header_ingest
/// [`block_synthesis`]: SynthesisEngine::block_synthesis
/// [`pcm_out`]: SynthesisEngine::pcm_out
/// [`advance_read_cursor`]: SynthesisEngine::advance_read_cursor
/// [`cleanup`]: SynthesisEngine::cleanup
pub trait SynthesisEngine {
    /// Clears stream info and comment state before a new header sequence.
    fn reset_info_and_comment(&mut self);

    /// Consumes one header packet.
    fn header_ingest(&mut self, packet: &Packet) -> Result<(), EngineError>;

    /// Synthesizes one audio packet into pending PCM frames.
    fn block_synthesis(&mut self, packet: &Packet) -> Result<(), EngineError>;

    /// Frames decoded but not yet consumed, starting at the read cursor.
    fn pcm_out(&self) -> PcmFrames<'_>;

    /// Marks `frames` frames as consumed.
    fn advance_read_cursor(&mut self, frames: usize);

    fn channel_count(&self) -> usize;

    fn sample_rate(&self) -> u32;

    /// Releases decoder state.
    fn cleanup(&mut self);
}

impl<E: SynthesisEngine + ?Sized> SynthesisEngine for Box<E> {
    fn reset_info_and_comment(&mut self) {
        (**self).reset_info_and_comment();
    }

    fn header_ingest(&mut self, packet: &Packet) -> Result<(), EngineError> {
        (**self).header_ingest(packet)
    }

    fn block_synthesis(&mut self, packet: &Packet) -> Result<(), EngineError> {
        (**self).block_synthesis(packet)
    }

    fn pcm_out(&self) -> PcmFrames<'_> {
        (**self).pcm_out()
    }

    fn advance_read_cursor(&mut self, frames: usize) {
        (**self).advance_read_cursor(frames);
    }

    fn channel_count(&self) -> usize {
        (**self).channel_count()
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn cleanup(&mut self) {
        (**self).cleanup();
    }
}

/// Borrowed view of pending decoded frames, one plane per channel.
///
/// Nominal sample range is [-1.0, 1.0]; values outside it are clamped during
/// conversion.
#[derive(Debug, Clone, Default)]
pub struct PcmFrames<'a> {
    planes: Vec<&'a [f32]>,
}

impl<'a> PcmFrames<'a> {
    pub fn new(planes: Vec<&'a [f32]>) -> Self {
        Self { planes }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Frames available in every plane.
    pub fn frames(&self) -> usize {
        self.planes.iter().map(|plane| plane.len()).min().unwrap_or(0)
    }

    pub fn channels(&self) -> usize {
        self.planes.len()
    }

    pub fn plane(&self, channel: usize) -> &'a [f32] {
        self.planes[channel]
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }
}
