use crate::engine::SynthesisEngine;
use crate::log_or_err;
use crate::process::convert::SampleConverter;
use crate::process::packet::{Packet, PacketDemultiplexer};
use crate::process::page::PageAccumulator;
use crate::process::ring::PcmRingBuffer;
use crate::process::{Extracted, Transition};
use crate::utils::errors::StreamError;
use log::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataState {
    ReadPage,
    ReadPacket,
}

/// Steady-state machine: pages in, packets to the engine, PCM bytes out.
///
/// Starts by reading packets so that packets completed on the last header
/// page are decoded before another page is pulled.
#[derive(Debug)]
pub struct DataPhase {
    state: DataState,
    converter: SampleConverter,
    packets: u64,
    holes: usize,
    frames: u64,
    eos: bool,
    /// Set by a page-level hole until the next page is read; the demultiplexer
    /// reports the same loss again as a sequence gap.
    resync: bool,
    pub fail_level: log::Level,
}

impl DataPhase {
    /// `packets` continues the packet counter of the header phase.
    pub fn new(converter: SampleConverter, packets: u64) -> Self {
        Self {
            state: DataState::ReadPacket,
            converter,
            packets,
            holes: 0,
            frames: 0,
            eos: false,
            resync: false,
            fail_level: log::Level::Error,
        }
    }

    /// End of stream reached; permanent.
    pub fn is_eos(&self) -> bool {
        self.eos
    }

    /// Packets seen, including the header packets.
    pub fn packets(&self) -> u64 {
        self.packets
    }

    /// Recovered sync losses and rejected packets.
    pub fn holes(&self) -> usize {
        self.holes
    }

    /// Frames converted so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Marks the stream as ended.
    pub fn finish(&mut self) {
        self.eos = true;
    }

    /// Runs one transition.
    ///
    /// Lost pages, lost packets and rejected packets send the machine back to
    /// page reading and report [`Transition::Hole`]. A lost page followed by
    /// the sequence gap it causes counts as one hole.
    pub fn advance<E: SynthesisEngine>(
        &mut self,
        pages: &mut PageAccumulator,
        demux: &mut PacketDemultiplexer,
        engine: &mut E,
        out: &mut PcmRingBuffer,
    ) -> Result<Transition, StreamError> {
        if self.eos {
            return Ok(Transition::Done);
        }

        match self.state {
            DataState::ReadPage => {
                if demux.pending() > 0 {
                    self.state = DataState::ReadPacket;
                    return Ok(Transition::Advanced);
                }
                if demux.eos_seen() {
                    debug!("End of stream after packet {}", self.packets);
                    self.eos = true;
                    return Ok(Transition::Done);
                }

                match pages.extract_page() {
                    Extracted::NeedMoreData => Ok(Transition::NeedMoreData),
                    Extracted::Hole => {
                        self.resync = true;
                        self.hole()
                    }
                    Extracted::Ready(page) => {
                        if let Err(e) = demux.push_page(&page) {
                            debug!("Ignoring page: {e}");
                            return Ok(Transition::Advanced);
                        }
                        self.state = DataState::ReadPacket;
                        Ok(Transition::Advanced)
                    }
                }
            }
            DataState::ReadPacket => match demux.extract_packet() {
                Extracted::NeedMoreData => {
                    self.resync = false;
                    self.state = DataState::ReadPage;
                    Ok(Transition::Advanced)
                }
                Extracted::Hole if std::mem::take(&mut self.resync) => {
                    debug!("Sequence gap after packet {} already counted", self.packets);
                    self.state = DataState::ReadPage;
                    Ok(Transition::Hole)
                }
                Extracted::Hole => self.hole(),
                Extracted::Ready(packet) => {
                    self.resync = false;
                    self.packets += 1;
                    if !packet.complete {
                        debug!("Packet {} is truncated", self.packets);
                        return self.hole();
                    }
                    self.synthesize(&packet, engine, out)
                }
            },
        }
    }

    /// Advances until a page boundary is reached with output produced, more
    /// bytes are needed, or the stream ends.
    ///
    /// Returns the transition that stopped the loop: [`Transition::Advanced`]
    /// when a batch is ready, [`Transition::NeedMoreData`] when the caller has
    /// to feed more bytes, [`Transition::Done`] at end of stream.
    pub fn run<E: SynthesisEngine>(
        &mut self,
        pages: &mut PageAccumulator,
        demux: &mut PacketDemultiplexer,
        engine: &mut E,
        out: &mut PcmRingBuffer,
    ) -> Result<Transition, StreamError> {
        loop {
            match self.advance(pages, demux, engine, out)? {
                Transition::Done => return Ok(Transition::Done),
                Transition::NeedMoreData => return Ok(Transition::NeedMoreData),
                Transition::Advanced | Transition::Hole => {
                    if self.state == DataState::ReadPage
                        && demux.pending() == 0
                        && out.available() > 0
                    {
                        return Ok(Transition::Advanced);
                    }
                }
            }
        }
    }

    fn synthesize<E: SynthesisEngine>(
        &mut self,
        packet: &Packet,
        engine: &mut E,
        out: &mut PcmRingBuffer,
    ) -> Result<Transition, StreamError> {
        if let Err(e) = engine.block_synthesis(packet) {
            debug!("Packet {} rejected by synthesis: {e}", self.packets);
            return self.hole();
        }

        loop {
            let consumed = {
                let frames = engine.pcm_out();
                if frames.is_empty() {
                    break;
                }
                self.converter.convert(&frames, out)?
            };
            engine.advance_read_cursor(consumed);
            self.frames += consumed as u64;
            trace!("Packet {}: converted {consumed} frames", self.packets);
        }

        Ok(Transition::Advanced)
    }

    fn hole(&mut self) -> Result<Transition, StreamError> {
        self.holes += 1;
        self.state = DataState::ReadPage;
        log_or_err!(
            self,
            log::Level::Warn,
            StreamError::SyncLoss {
                packet: self.packets
            }
        );
        Ok(Transition::Hole)
    }
}
