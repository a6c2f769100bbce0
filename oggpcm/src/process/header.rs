use crate::engine::SynthesisEngine;
use crate::process::packet::PacketDemultiplexer;
use crate::process::page::PageAccumulator;
use crate::process::{Extracted, Transition};
use crate::utils::errors::StreamError;
use log::{debug, info, warn};

/// Number of header packets preceding audio data.
pub const HEADER_PACKETS: u64 = 3;

/// Channel count and sample rate, fixed once the headers are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamParameters {
    pub channels: usize,
    pub sample_rate: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderState {
    ReadPage,
    ReadPacket,
    Done,
}

/// Bootstrap state machine feeding the three header packets to the engine.
#[derive(Debug)]
pub struct HeaderPhase {
    state: HeaderState,
    packets: u64,
    parameters: Option<StreamParameters>,
}

impl Default for HeaderPhase {
    fn default() -> Self {
        Self {
            state: HeaderState::ReadPage,
            packets: 0,
            parameters: None,
        }
    }
}

impl HeaderPhase {
    /// Header packets ingested so far.
    pub fn packets(&self) -> u64 {
        self.packets
    }

    /// Set once the phase is done.
    pub fn parameters(&self) -> Option<StreamParameters> {
        self.parameters
    }

    /// Runs one transition.
    ///
    /// The first page of a session creates the demultiplexer for its serial
    /// number and resets the engine. A lost page is skipped; a lost or
    /// rejected header packet is fatal.
    pub fn advance<E: SynthesisEngine>(
        &mut self,
        pages: &mut PageAccumulator,
        demux: &mut Option<PacketDemultiplexer>,
        engine: &mut E,
    ) -> Result<Transition, StreamError> {
        match self.state {
            HeaderState::ReadPage => match pages.extract_page() {
                Extracted::NeedMoreData => Ok(Transition::NeedMoreData),
                Extracted::Hole => {
                    debug!("Skipping unframed data before header packet {}", self.packets + 1);
                    Ok(Transition::Hole)
                }
                Extracted::Ready(page) => {
                    let stream = demux.get_or_insert_with(|| {
                        debug!("Starting stream {:#010X}", page.serial());
                        engine.reset_info_and_comment();
                        PacketDemultiplexer::new(page.serial())
                    });
                    if let Err(e) = stream.push_page(&page) {
                        warn!("Ignoring page during header read: {e}");
                        return Ok(Transition::Advanced);
                    }

                    self.state = HeaderState::ReadPacket;
                    Ok(Transition::Advanced)
                }
            },
            HeaderState::ReadPacket => {
                let Some(stream) = demux.as_mut() else {
                    self.state = HeaderState::ReadPage;
                    return Ok(Transition::Advanced);
                };

                match stream.extract_packet() {
                    Extracted::NeedMoreData => {
                        if stream.eos_seen() {
                            return Err(StreamError::PrematureEnd {
                                headers: self.packets,
                            });
                        }
                        self.state = HeaderState::ReadPage;
                        Ok(Transition::Advanced)
                    }
                    Extracted::Hole => Err(StreamError::CorruptHeader {
                        packet: self.packets + 1,
                    }),
                    Extracted::Ready(packet) => {
                        if !packet.complete {
                            return Err(StreamError::CorruptHeader {
                                packet: self.packets + 1,
                            });
                        }

                        engine.header_ingest(&packet).map_err(|source| {
                            StreamError::UnrecognizedStream {
                                packet: self.packets + 1,
                                source,
                            }
                        })?;
                        self.packets += 1;
                        debug!(
                            "Header packet {} accepted ({} bytes)",
                            self.packets,
                            packet.data.len()
                        );

                        if self.packets < HEADER_PACKETS {
                            return Ok(Transition::Advanced);
                        }

                        let parameters = StreamParameters {
                            channels: engine.channel_count(),
                            sample_rate: engine.sample_rate(),
                        };
                        if parameters.channels == 0 || parameters.sample_rate == 0 {
                            return Err(StreamError::InvalidParameters {
                                channels: parameters.channels,
                                sample_rate: parameters.sample_rate,
                            });
                        }

                        info!(
                            "Stream parameters: {} channels, {} Hz",
                            parameters.channels, parameters.sample_rate
                        );
                        self.parameters = Some(parameters);
                        self.state = HeaderState::Done;
                        Ok(Transition::Done)
                    }
                }
            }
            HeaderState::Done => Ok(Transition::Done),
        }
    }
}
