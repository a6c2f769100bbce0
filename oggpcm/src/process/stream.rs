use crate::engine::SynthesisEngine;
use crate::process::Transition;
use crate::process::convert::{DEFAULT_SCRATCH_CAPACITY, SampleConverter};
use crate::process::data::DataPhase;
use crate::process::header::{HeaderPhase, StreamParameters};
use crate::process::packet::PacketDemultiplexer;
use crate::process::page::PageAccumulator;
use crate::process::ring::{DEFAULT_PCM_CAPACITY, PcmRingBuffer};
use crate::utils::errors::StreamError;
use log::{debug, warn};
use std::io::{self, Read};

/// Default number of bytes requested from the source per read.
pub const DEFAULT_READ_CHUNK: usize = 512;

/// Tuning knobs of a [`StreamAdapter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterConfig {
    pub read_chunk: usize,
    pub pcm_capacity: usize,
    pub scratch_capacity: usize,
    pub fail_level: log::Level,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            read_chunk: DEFAULT_READ_CHUNK,
            pcm_capacity: DEFAULT_PCM_CAPACITY,
            scratch_capacity: DEFAULT_SCRATCH_CAPACITY,
            fail_level: log::Level::Error,
        }
    }
}

impl AdapterConfig {
    pub fn set_read_chunk(&mut self, bytes: usize) {
        self.read_chunk = bytes.max(1);
    }

    pub fn set_pcm_capacity(&mut self, bytes: usize) {
        self.pcm_capacity = bytes;
    }

    pub fn set_scratch_capacity(&mut self, bytes: usize) {
        self.scratch_capacity = bytes;
    }

    /// Sets the failure level for recoverable stream damage.
    ///
    /// - `log::Level::Error`: lost data is logged and skipped (default)
    /// - `log::Level::Warn`: lost data aborts the stream (strict mode)
    pub fn set_fail_level(&mut self, level: log::Level) {
        self.fail_level = level;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AdapterState {
    Fresh,
    Streaming,
    Ended,
}

/// Pull-based PCM byte stream over a page-framed compressed bitstream.
///
/// Bytes are pulled from `source` only when the converted PCM held in the
/// ring buffer has been consumed. Output is signed 16-bit, host-endian,
/// interleaved by channel.
///
/// # Example
///
/// ```rust,no_run
/// use oggpcm::engine::SynthesisEngine;
/// use oggpcm::process::stream::StreamAdapter;
///
/// fn play<E: SynthesisEngine>(engine: E) -> Result<(), Box<dyn std::error::Error>> {
///     let file = std::fs::File::open("track.ogg")?;
///     let mut stream = StreamAdapter::new(file, engine);
///
///     let parameters = stream.open()?;
///     println!("{} channels at {} Hz", parameters.channels, parameters.sample_rate);
///
///     let mut pcm = Vec::new();
///     while let Some(byte) = stream.read_byte()? {
///         pcm.push(byte);
///     }
///     stream.close();
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct StreamAdapter<R: Read, E: SynthesisEngine> {
    source: Option<R>,
    engine: E,
    engine_released: bool,
    pages: PageAccumulator,
    demux: Option<PacketDemultiplexer>,
    header: HeaderPhase,
    data: Option<DataPhase>,
    ring: PcmRingBuffer,
    config: AdapterConfig,
    state: AdapterState,
}

impl<R: Read, E: SynthesisEngine> StreamAdapter<R, E> {
    pub fn new(source: R, engine: E) -> Self {
        Self::with_config(source, engine, AdapterConfig::default())
    }

    pub fn with_config(source: R, engine: E, config: AdapterConfig) -> Self {
        let ring = PcmRingBuffer::with_capacity(config.pcm_capacity);
        Self::with_ring_buffer(source, engine, config, ring)
    }

    /// Builds an adapter around a ring buffer recycled from a previous stream.
    ///
    /// The buffer keeps its own capacity; `config.pcm_capacity` is ignored.
    pub fn with_ring_buffer(
        source: R,
        engine: E,
        config: AdapterConfig,
        mut ring: PcmRingBuffer,
    ) -> Self {
        ring.clear();
        Self {
            source: Some(source),
            engine,
            engine_released: false,
            pages: PageAccumulator::with_capacity(config.read_chunk * 8),
            demux: None,
            header: HeaderPhase::default(),
            data: None,
            ring,
            config,
            state: AdapterState::Fresh,
        }
    }

    /// Reads the header packets and primes the first PCM batch.
    ///
    /// Called implicitly by the first read. Returns the stream parameters,
    /// which never change afterwards.
    pub fn open(&mut self) -> Result<StreamParameters, StreamError> {
        if self.state == AdapterState::Fresh {
            if let Err(e) = self.bootstrap() {
                self.abort();
                return Err(e);
            }
        }

        self.header
            .parameters()
            .ok_or(StreamError::PrematureEnd {
                headers: self.header.packets(),
            })
    }

    /// Stream parameters, once the headers have been read.
    pub fn parameters(&self) -> Option<StreamParameters> {
        self.header.parameters()
    }

    /// Converted bytes that can be read without touching the source.
    pub fn available(&self) -> usize {
        self.ring.available()
    }

    /// All PCM has been handed out.
    pub fn is_at_end(&self) -> bool {
        self.state == AdapterState::Ended && self.ring.available() == 0
    }

    /// Reads the next PCM byte; `None` marks the end of the stream.
    pub fn read_byte(&mut self) -> Result<Option<u8>, StreamError> {
        if self.state == AdapterState::Fresh {
            self.open()?;
        }

        loop {
            if let Some(byte) = self.ring.next_byte() {
                return Ok(Some(byte));
            }
            if self.state == AdapterState::Ended {
                return Ok(None);
            }

            self.refill()?;
        }
    }

    /// Releases the demultiplexer, the engine state and the byte source.
    ///
    /// Safe to call any number of times. Bytes still buffered can be read
    /// after closing; after that the stream reports its end.
    pub fn close(&mut self) {
        self.release();
        self.pages.reset();
        self.source = None;
        self.state = AdapterState::Ended;
    }

    /// Closes the stream and hands back its ring buffer for reuse.
    pub fn into_ring_buffer(mut self) -> PcmRingBuffer {
        self.close();
        std::mem::replace(&mut self.ring, PcmRingBuffer::with_capacity(0))
    }

    /// Packets seen so far, header packets included.
    pub fn packets(&self) -> u64 {
        self.data
            .as_ref()
            .map_or(self.header.packets(), |data| data.packets())
    }

    /// Recovered losses of data (lost pages, lost or rejected packets).
    pub fn holes(&self) -> usize {
        self.data.as_ref().map_or(0, |data| data.holes())
    }

    /// Frames converted so far.
    pub fn frames(&self) -> u64 {
        self.data.as_ref().map_or(0, |data| data.frames())
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    fn bootstrap(&mut self) -> Result<(), StreamError> {
        loop {
            match self
                .header
                .advance(&mut self.pages, &mut self.demux, &mut self.engine)?
            {
                Transition::Done => break,
                Transition::Advanced | Transition::Hole => {}
                Transition::NeedMoreData => {
                    if self.feed()? == 0 {
                        return Err(StreamError::PrematureEnd {
                            headers: self.header.packets(),
                        });
                    }
                }
            }
        }

        let Some(parameters) = self.header.parameters() else {
            return Err(StreamError::PrematureEnd {
                headers: self.header.packets(),
            });
        };
        let converter = SampleConverter::new(parameters.channels, self.config.scratch_capacity);
        if converter.max_frames() == 0 {
            return Err(StreamError::BufferOverflow {
                needed: 2 * parameters.channels,
                remaining: self.config.scratch_capacity,
            });
        }

        let mut data = DataPhase::new(converter, self.header.packets());
        data.fail_level = self.config.fail_level;
        self.data = Some(data);
        self.state = AdapterState::Streaming;

        self.fill()
    }

    fn refill(&mut self) -> Result<(), StreamError> {
        self.ring.clear();
        if let Err(e) = self.fill() {
            self.abort();
            return Err(e);
        }
        Ok(())
    }

    /// Produces the next batch, reading from the source only when framing
    /// runs dry.
    fn fill(&mut self) -> Result<(), StreamError> {
        loop {
            let (Some(data), Some(demux)) = (self.data.as_mut(), self.demux.as_mut()) else {
                self.state = AdapterState::Ended;
                return Ok(());
            };

            match data.run(&mut self.pages, demux, &mut self.engine, &mut self.ring)? {
                Transition::Done => {
                    self.end();
                    return Ok(());
                }
                Transition::Advanced | Transition::Hole => return Ok(()),
                Transition::NeedMoreData => {
                    if self.ring.available() > 0 {
                        return Ok(());
                    }
                    if self.feed()? == 0 {
                        warn!("Bitstream ended without an end-of-stream page");
                        if let Some(data) = self.data.as_mut() {
                            data.finish();
                        }
                        self.end();
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Moves up to one read chunk from the source into the page accumulator.
    fn feed(&mut self) -> Result<usize, StreamError> {
        let Some(source) = self.source.as_mut() else {
            return Ok(0);
        };

        let buffer = self.pages.reserve(self.config.read_chunk);
        let n = source.read(buffer)?;
        self.pages.commit(n);
        Ok(n)
    }

    fn end(&mut self) {
        debug!(
            "Stream finished: {} packets, {} frames, {} holes",
            self.packets(),
            self.frames(),
            self.holes()
        );
        self.release();
        self.state = AdapterState::Ended;
    }

    fn abort(&mut self) {
        self.release();
        self.ring.clear();
        self.source = None;
        self.state = AdapterState::Ended;
    }

    fn release(&mut self) {
        self.demux = None;
        if !self.engine_released {
            self.engine_released = true;
            self.engine.cleanup();
        }
    }
}

impl<R: Read, E: SynthesisEngine> Read for StreamAdapter<R, E> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let Some(first) = self.read_byte().map_err(io::Error::other)? else {
            return Ok(0);
        };
        buf[0] = first;

        Ok(1 + self.ring.read_into(&mut buf[1..]))
    }
}

impl<R: Read, E: SynthesisEngine> Drop for StreamAdapter<R, E> {
    fn drop(&mut self) {
        self.release();
    }
}
