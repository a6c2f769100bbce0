#![allow(dead_code)]

use std::cell::Cell;
use std::io::{self, Read};
use std::rc::Rc;

use oggpcm::engine::{PcmFrames, SynthesisEngine};
use oggpcm::process::packet::Packet;
use oggpcm::process::writer::PageWriter;
use oggpcm::utils::errors::EngineError;

pub const SERIAL: u32 = 0x1234_5678;

/// Status codes the scripted engine reports.
pub const NOT_AUDIO: i32 = -132;
pub const BAD_PACKET: i32 = -137;

/// First byte of a packet the scripted engine refuses.
pub const POISON: u8 = 0xFF;

/// Engine double driven by plain packet contents.
///
/// Header packet 1 is `[0x01, channels, sample_rate as u32 LE]`; packets 2
/// and 3 are opaque. Audio packets carry interleaved `f32` LE samples.
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    channels: usize,
    sample_rate: u32,
    headers: u64,
    planes: Vec<Vec<f32>>,
    cursor: usize,
    pub resets: usize,
    pub synthesized: usize,
    pub cleanups: Rc<Cell<usize>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared counter of `cleanup` calls, observable after the engine moved.
    pub fn cleanup_counter(&self) -> Rc<Cell<usize>> {
        self.cleanups.clone()
    }
}

impl SynthesisEngine for ScriptedEngine {
    fn reset_info_and_comment(&mut self) {
        self.resets += 1;
        self.headers = 0;
        self.channels = 0;
        self.sample_rate = 0;
    }

    fn header_ingest(&mut self, packet: &Packet) -> Result<(), EngineError> {
        let data = &packet.data;
        if data.first() == Some(&POISON) {
            return Err(EngineError { code: NOT_AUDIO });
        }

        if self.headers == 0 {
            if data.len() < 6 || data[0] != 0x01 {
                return Err(EngineError { code: NOT_AUDIO });
            }
            self.channels = data[1] as usize;
            self.sample_rate = u32::from_le_bytes([data[2], data[3], data[4], data[5]]);
        }

        self.headers += 1;
        Ok(())
    }

    fn block_synthesis(&mut self, packet: &Packet) -> Result<(), EngineError> {
        if packet.data.first() == Some(&POISON) || self.channels == 0 {
            return Err(EngineError { code: BAD_PACKET });
        }

        let samples = packet
            .data
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect::<Vec<_>>();

        self.planes = (0..self.channels)
            .map(|c| {
                samples
                    .iter()
                    .skip(c)
                    .step_by(self.channels)
                    .copied()
                    .collect()
            })
            .collect();
        let frames = samples.len() / self.channels;
        for plane in &mut self.planes {
            plane.truncate(frames);
        }

        self.cursor = 0;
        self.synthesized += 1;
        Ok(())
    }

    fn pcm_out(&self) -> PcmFrames<'_> {
        if self.planes.is_empty() {
            return PcmFrames::empty();
        }
        PcmFrames::new(self.planes.iter().map(|p| &p[self.cursor..]).collect())
    }

    fn advance_read_cursor(&mut self, frames: usize) {
        self.cursor += frames;
    }

    fn channel_count(&self) -> usize {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn cleanup(&mut self) {
        self.planes.clear();
        self.cleanups.set(self.cleanups.get() + 1);
    }
}

pub fn ident_header(channels: u8, sample_rate: u32) -> Vec<u8> {
    let mut packet = vec![0x01, channels];
    packet.extend_from_slice(&sample_rate.to_le_bytes());
    packet
}

/// Interleaved samples as an audio packet.
pub fn audio_packet(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Pages of a complete stream: the identification header alone on the first
/// page, the two remaining headers on the second, then one page per audio
/// packet. The last page carries the end-of-stream flag.
pub fn stream_pages(channels: u8, sample_rate: u32, audio: &[Vec<u8>]) -> Vec<Vec<u8>> {
    stream_pages_with(channels, sample_rate, audio, true)
}

pub fn stream_pages_with(
    channels: u8,
    sample_rate: u32,
    audio: &[Vec<u8>],
    eos: bool,
) -> Vec<Vec<u8>> {
    let mut writer = PageWriter::new(SERIAL);
    let mut pages = Vec::new();

    let ident = ident_header(channels, sample_rate);
    let no_audio = audio.is_empty();
    pages.push(writer.write_page(&[ident.as_slice()], 0, true, false).unwrap());
    pages.push(
        writer
            .write_page(&[&b"comment"[..], &b"setup"[..]], 0, false, eos && no_audio)
            .unwrap(),
    );

    let mut granule = 0i64;
    for (i, packet) in audio.iter().enumerate() {
        granule += (packet.len() / 4 / channels as usize) as i64;
        let last = i + 1 == audio.len();
        pages.push(
            writer
                .write_page(&[packet.as_slice()], granule, false, eos && last)
                .unwrap(),
        );
    }

    pages
}

pub fn concat(pages: &[Vec<u8>]) -> Vec<u8> {
    pages.concat()
}

/// Expected adapter output for interleaved samples already in 16-bit range.
pub fn pcm16(values: &[i16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_ne_bytes()).collect()
}

/// Bytes handed out and read calls made by a [`Trickle`].
#[derive(Debug, Default)]
pub struct ReadLog {
    pub reads: Cell<usize>,
    pub bytes: Cell<usize>,
}

/// Byte source returning at most `step` bytes per read.
pub struct Trickle<R> {
    inner: R,
    step: usize,
    log: Rc<ReadLog>,
}

impl<R: Read> Trickle<R> {
    pub fn new(inner: R, step: usize) -> Self {
        Self {
            inner,
            step,
            log: Rc::default(),
        }
    }

    /// Shared view of the read activity, observable after the source moved.
    pub fn log(&self) -> Rc<ReadLog> {
        self.log.clone()
    }
}

impl<R: Read> Read for Trickle<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.step);
        let n = self.inner.read(&mut buf[..n])?;
        self.log.reads.set(self.log.reads.get() + 1);
        self.log.bytes.set(self.log.bytes.get() + n);
        Ok(n)
    }
}

/// Byte source failing after `ok` bytes.
pub struct Failing {
    data: io::Cursor<Vec<u8>>,
    ok: u64,
}

impl Failing {
    pub fn new(data: Vec<u8>, ok: u64) -> Self {
        Self {
            data: io::Cursor::new(data),
            ok,
        }
    }
}

impl Read for Failing {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let left = self.ok.saturating_sub(self.data.position()) as usize;
        if left == 0 {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "source gone"));
        }
        let n = buf.len().min(left);
        self.data.read(&mut buf[..n])
    }
}
