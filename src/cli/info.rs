use anyhow::{Result, bail};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde::Serialize;

use super::command::{Cli, InfoArgs, ReportFormat};
use crate::input::{CHUNK_SIZE, InputReader};
use oggpcm::process::Extracted;
use oggpcm::process::packet::{Packet, PacketDemultiplexer};
use oggpcm::process::page::{Page, PageAccumulator};
use oggpcm::utils::errors::DemuxError;

pub fn cmd_info(args: &InfoArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!("Analyzing Ogg stream: {}", args.input.display());

    let mut input_reader = InputReader::new(&args.input)?;
    let mut walker = StreamWalker::new(cli.strict);

    if let Some(multi) = multi {
        let pb = multi.add(ProgressBar::new_spinner());
        pb.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb.set_message("Analyzing pages...");
        walker.pb = Some(pb);
    }

    input_reader.process_chunks(CHUNK_SIZE, |chunk| {
        walker.push(chunk)?;
        Ok(true)
    })?;

    if input_reader.is_pipe() {
        log::debug!("Finished reading stdin");
    }

    let report = walker.finish();
    if report.serial.is_none() {
        println!("No Ogg page found in the input.");
        println!("This doesn't appear to be a valid Ogg stream.");
        return Ok(());
    }

    match args.format {
        ReportFormat::Plain => display_report(&report),
        ReportFormat::Yaml => print!("{}", serde_yaml_ng::to_string(&report)?),
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    Vorbis,
    Opus,
}

/// Stream parameters read from the first packet of a logical stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CodecHint {
    pub codec: Codec,
    pub channels: u8,
    pub sample_rate: u32,
    pub pre_skip: u16,
}

impl CodecHint {
    /// Recognizes a Vorbis identification header or an Opus head.
    pub fn detect(packet: &[u8]) -> Option<Self> {
        if packet.len() >= 30 && packet[0] == 0x01 && &packet[1..7] == b"vorbis" {
            return Some(Self {
                codec: Codec::Vorbis,
                channels: packet[11],
                sample_rate: u32::from_le_bytes([packet[12], packet[13], packet[14], packet[15]]),
                pre_skip: 0,
            });
        }

        if packet.len() >= 19 && &packet[..8] == b"OpusHead" {
            return Some(Self {
                codec: Codec::Opus,
                channels: packet[9],
                sample_rate: u32::from_le_bytes([packet[12], packet[13], packet[14], packet[15]]),
                pre_skip: u16::from_le_bytes([packet[10], packet[11]]),
            });
        }

        None
    }
}

#[derive(Debug, Default, Serialize)]
pub struct StreamReport {
    pub serial: Option<u32>,
    pub codec: Option<CodecHint>,
    pub pages: usize,
    pub foreign_pages: usize,
    pub late_pages: usize,
    pub packets: u64,
    pub truncated_packets: u64,
    pub holes: usize,
    pub bytes_read: usize,
    pub bytes_skipped: usize,
    pub end_of_stream: bool,
    pub last_granule: Option<i64>,
}

/// Walks pages and packets of the first logical stream in the input.
pub struct StreamWalker {
    pages: PageAccumulator,
    demux: Option<PacketDemultiplexer>,
    report: StreamReport,
    strict: bool,
    pb: Option<ProgressBar>,
}

impl StreamWalker {
    pub fn new(strict: bool) -> Self {
        Self {
            pages: PageAccumulator::default(),
            demux: None,
            report: StreamReport::default(),
            strict,
            pb: None,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) -> Result<()> {
        self.report.bytes_read += chunk.len();
        self.pages.reserve(chunk.len()).copy_from_slice(chunk);
        self.pages.commit(chunk.len());

        loop {
            match self.pages.extract_page() {
                Extracted::NeedMoreData => return Ok(()),
                Extracted::Hole => self.hole("Lost page sync")?,
                Extracted::Ready(page) => self.process_page(&page)?,
            }
        }
    }

    pub fn finish(mut self) -> StreamReport {
        if let Some(ref pb) = self.pb {
            pb.finish_and_clear();
        }

        if self.pages.buffered() > 0 {
            log::warn!("{} trailing bytes do not form a page", self.pages.buffered());
        }

        self.report.bytes_skipped = self.pages.bytes_skipped();
        self.report
    }

    fn process_page(&mut self, page: &Page) -> Result<()> {
        let demux = self.demux.get_or_insert_with(|| {
            log::debug!("First logical stream {:#010X}", page.serial());
            PacketDemultiplexer::new(page.serial())
        });
        self.report.serial = Some(demux.serial());

        match demux.push_page(page) {
            Ok(()) => {}
            Err(DemuxError::SerialMismatch { found, .. }) => {
                log::debug!("Skipping page of stream {found:#010X}");
                self.report.foreign_pages += 1;
                return Ok(());
            }
            Err(e @ DemuxError::PastEndOfStream { .. }) => {
                log::warn!("{e}");
                self.report.late_pages += 1;
                return Ok(());
            }
        }

        self.report.pages += 1;
        self.report.end_of_stream = demux.eos_seen();
        if page.granule_position() != -1 {
            self.report.last_granule = Some(page.granule_position());
        }

        loop {
            let extracted = match self.demux.as_mut() {
                Some(demux) => demux.extract_packet(),
                None => break,
            };
            match extracted {
                Extracted::NeedMoreData => break,
                Extracted::Hole => self.hole("Lost packet data")?,
                Extracted::Ready(packet) => self.process_packet(&packet),
            }
        }

        if self.report.pages.is_multiple_of(100) {
            if let Some(ref pb) = self.pb {
                pb.set_message(format!("Analyzing pages...        {}", self.report.pages));
                pb.tick();
            }
        }

        Ok(())
    }

    fn process_packet(&mut self, packet: &Packet) {
        self.report.packets += 1;
        if !packet.complete {
            log::warn!("Packet {} cut short by the end of stream", packet.packet_no);
            self.report.truncated_packets += 1;
        }

        if packet.packet_no == 0 {
            self.report.codec = CodecHint::detect(&packet.data);
            match self.report.codec {
                Some(hint) => log::debug!("First packet identifies {:?}", hint.codec),
                None => log::info!("Unknown codec in first packet"),
            }
        }
    }

    fn hole(&mut self, what: &str) -> Result<()> {
        self.report.holes += 1;
        if self.strict {
            bail!("{what} after page {}", self.report.pages);
        }
        log::warn!("{what} after page {}", self.report.pages);
        Ok(())
    }
}

fn display_report(report: &StreamReport) {
    println!();
    println!("Ogg Stream Information");
    println!("======================");
    println!();

    println!("Logical Stream");
    if let Some(serial) = report.serial {
        println!("  Serial number             {serial:#010X}");
    }
    match &report.codec {
        Some(hint) => {
            println!("  Codec                     {:?}", hint.codec);
            println!("  Channels                  {}", hint.channels);
            println!("  Sampling rate             {} Hz", hint.sample_rate);
            if hint.codec == Codec::Opus {
                println!("  Pre-skip                  {} samples", hint.pre_skip);
            }
        }
        None => println!("  Codec                     unknown"),
    }
    println!();

    println!("Analysis Summary");
    println!("  Pages                     {}", report.pages);
    println!("  Packets                   {}", report.packets);
    if report.truncated_packets > 0 {
        println!("  Truncated packets         {}", report.truncated_packets);
    }
    println!("  Pages of other streams    {}", report.foreign_pages);
    if report.late_pages > 0 {
        println!("  Pages after end           {}", report.late_pages);
    }
    println!("  Holes                     {}", report.holes);
    println!("  Bytes skipped             {}", report.bytes_skipped);

    let size_mb = report.bytes_read as f64 / 1_000_000.0;
    println!(
        "  Size                      {size_mb:.2} MB ({} bytes)",
        report.bytes_read
    );
    println!("  End of stream             {}", report.end_of_stream);
    if let Some(granule) = report.last_granule {
        println!("  Last granule position     {granule}");
    }
    println!();
}
