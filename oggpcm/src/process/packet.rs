use crate::process::Extracted;
use crate::process::page::Page;
use crate::utils::errors::DemuxError;
use log::{debug, trace};
use std::collections::VecDeque;

/// Smallest decodable unit of a logical stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub data: Vec<u8>,

    /// First packet of the logical stream.
    pub bos: bool,

    /// Last packet of the logical stream.
    pub eos: bool,

    /// Granule position of the page on which this packet ends, set only for
    /// the last packet completed on that page.
    pub granule_position: Option<i64>,

    /// Running packet number within the logical stream, counting from 0.
    pub packet_no: u64,

    /// `false` when the end-of-stream page cut the packet short.
    pub complete: bool,
}

impl AsRef<[u8]> for Packet {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

#[derive(Debug)]
enum Queued {
    Packet(Packet),
    Hole,
}

/// Rebuilds the packets of one logical stream from its pages.
///
/// Packets spanning page boundaries are buffered internally. Lost pages
/// (sequence gaps) surface as a single [`Extracted::Hole`] in packet order.
#[derive(Debug)]
pub struct PacketDemultiplexer {
    serial: u32,
    expected_sequence: Option<u32>,
    partial: Vec<u8>,
    queue: VecDeque<Queued>,
    packet_no: u64,
    eos_seen: bool,
}

impl PacketDemultiplexer {
    pub fn new(serial: u32) -> Self {
        Self {
            serial,
            expected_sequence: None,
            partial: Vec::new(),
            queue: VecDeque::new(),
            packet_no: 0,
            eos_seen: false,
        }
    }

    pub fn serial(&self) -> u32 {
        self.serial
    }

    /// The end-of-stream page has been submitted.
    pub fn eos_seen(&self) -> bool {
        self.eos_seen
    }

    /// Packets (or holes) waiting to be extracted.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Submits a page, splitting its body into packets.
    pub fn push_page(&mut self, page: &Page) -> Result<(), DemuxError> {
        if page.serial() != self.serial {
            return Err(DemuxError::SerialMismatch {
                found: page.serial(),
                expected: self.serial,
            });
        }
        if self.eos_seen {
            return Err(DemuxError::PastEndOfStream {
                sequence: page.sequence(),
            });
        }

        let sequence = page.sequence();
        let mut skip_continuation = false;

        match self.expected_sequence {
            Some(expected) if expected != sequence => {
                debug!(
                    "Page sequence gap in stream {:#010X}: expected {expected}, got {sequence}",
                    self.serial
                );
                self.partial.clear();
                self.queue.push_back(Queued::Hole);
                skip_continuation = page.is_continued();
            }
            _ if page.is_continued() && self.partial.is_empty() => {
                skip_continuation = true;
            }
            _ if !page.is_continued() && !self.partial.is_empty() => {
                debug!(
                    "Page {sequence} does not continue the pending packet, dropping {} bytes",
                    self.partial.len()
                );
                self.partial.clear();
                self.queue.push_back(Queued::Hole);
            }
            _ => {}
        }
        self.expected_sequence = Some(sequence.wrapping_add(1));

        let mut completed = Vec::new();
        let mut offset = 0;
        let body = page.body();

        for &lace in page.segment_table() {
            let segment = &body[offset..offset + lace as usize];
            offset += lace as usize;

            if skip_continuation {
                if lace < 255 {
                    skip_continuation = false;
                }
                continue;
            }

            self.partial.extend_from_slice(segment);
            if lace < 255 {
                completed.push(self.take_packet(true));
            }
        }

        if page.is_eos() {
            self.eos_seen = true;
            if !self.partial.is_empty() {
                debug!(
                    "End-of-stream page truncates packet {} ({} bytes)",
                    self.packet_no,
                    self.partial.len()
                );
                completed.push(self.take_packet(false));
            }
        }

        if let Some(first) = completed.first_mut() {
            first.bos = page.is_bos() && first.packet_no == 0;
        }
        if let Some(last) = completed.last_mut() {
            last.eos = page.is_eos();
            last.granule_position = Some(page.granule_position());
        }

        trace!(
            "Page {sequence}: {} packets completed, {} bytes pending",
            completed.len(),
            self.partial.len()
        );
        self.queue.extend(completed.into_iter().map(Queued::Packet));

        Ok(())
    }

    /// Extracts the next packet in stream order.
    pub fn extract_packet(&mut self) -> Extracted<Packet> {
        match self.queue.pop_front() {
            Some(Queued::Packet(packet)) => Extracted::Ready(packet),
            Some(Queued::Hole) => Extracted::Hole,
            None => Extracted::NeedMoreData,
        }
    }

    fn take_packet(&mut self, complete: bool) -> Packet {
        let packet = Packet {
            data: std::mem::take(&mut self.partial),
            bos: false,
            eos: false,
            granule_position: None,
            packet_no: self.packet_no,
            complete,
        };
        self.packet_no += 1;
        packet
    }
}
