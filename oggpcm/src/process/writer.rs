use crate::process::page::{CAPTURE_PATTERN, HEADER_SIZE, header_type};
use crate::utils::crc::OGG_PAGE_CRC;
use crate::utils::errors::FramingError;

/// Serializes packets of one logical stream into pages.
///
/// Keeps the running page sequence number; every written page gets a valid
/// checksum.
#[derive(Debug, Clone)]
pub struct PageWriter {
    serial: u32,
    sequence: u32,
}

impl PageWriter {
    pub fn new(serial: u32) -> Self {
        Self {
            serial,
            sequence: 0,
        }
    }

    /// Sequence number the next page will carry.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn set_sequence(&mut self, sequence: u32) {
        self.sequence = sequence;
    }

    /// Writes whole packets into a single page.
    pub fn write_page(
        &mut self,
        packets: &[&[u8]],
        granule_position: i64,
        bos: bool,
        eos: bool,
    ) -> Result<Vec<u8>, FramingError> {
        let mut lacing = Vec::new();
        let mut body = Vec::new();
        for packet in packets {
            lacing.extend(lacing_values(packet.len()));
            body.extend_from_slice(packet);
        }

        let mut flags = 0;
        if bos {
            flags |= header_type::BOS;
        }
        if eos {
            flags |= header_type::EOS;
        }

        self.write_raw(flags, granule_position, &lacing, &body)
    }

    /// Writes one packet over as many pages as needed, with at most
    /// `max_segments` lacing values per page.
    ///
    /// Only the final page carries `granule_position` and the end-of-stream
    /// flag; pages where no packet ends carry granule position -1.
    pub fn write_packet_spanning(
        &mut self,
        packet: &[u8],
        max_segments: usize,
        granule_position: i64,
        bos: bool,
        eos: bool,
    ) -> Result<Vec<Vec<u8>>, FramingError> {
        if !(1..=255).contains(&max_segments) {
            return Err(FramingError::InvalidSegmentLimit(max_segments));
        }

        let lacing = lacing_values(packet.len());
        let chunks = lacing.chunks(max_segments).collect::<Vec<_>>();
        let mut pages = Vec::with_capacity(chunks.len());
        let mut offset = 0;

        for (i, chunk) in chunks.iter().enumerate() {
            let last = i + 1 == chunks.len();
            let len = chunk.iter().map(|&lace| lace as usize).sum::<usize>();

            let mut flags = 0;
            if i > 0 {
                flags |= header_type::CONTINUED;
            }
            if bos && i == 0 {
                flags |= header_type::BOS;
            }
            if eos && last {
                flags |= header_type::EOS;
            }
            let granule = if last { granule_position } else { -1 };

            pages.push(self.write_raw(flags, granule, chunk, &packet[offset..offset + len])?);
            offset += len;
        }

        Ok(pages)
    }

    /// Writes a page from an explicit segment table and body.
    ///
    /// No consistency check is made between `lacing` and `body` beyond the
    /// segment count.
    pub fn write_raw(
        &mut self,
        flags: u8,
        granule_position: i64,
        lacing: &[u8],
        body: &[u8],
    ) -> Result<Vec<u8>, FramingError> {
        if lacing.len() > 255 {
            return Err(FramingError::TooManySegments(lacing.len()));
        }

        let mut page = Vec::with_capacity(HEADER_SIZE + lacing.len() + body.len());
        page.extend_from_slice(CAPTURE_PATTERN);
        page.push(0);
        page.push(flags);
        page.extend_from_slice(&granule_position.to_le_bytes());
        page.extend_from_slice(&self.serial.to_le_bytes());
        page.extend_from_slice(&self.sequence.to_le_bytes());
        page.extend_from_slice(&[0; 4]);
        page.push(lacing.len() as u8);
        page.extend_from_slice(lacing);
        page.extend_from_slice(body);

        let crc = OGG_PAGE_CRC.page_checksum(&page);
        page[22..26].copy_from_slice(&crc.to_le_bytes());

        self.sequence = self.sequence.wrapping_add(1);
        Ok(page)
    }
}

/// Lacing values for a packet of `len` bytes. A length that is a multiple of
/// 255 is terminated by a zero lacing value.
pub fn lacing_values(len: usize) -> Vec<u8> {
    let mut lacing = vec![255u8; len / 255];
    lacing.push((len % 255) as u8);
    lacing
}

#[test]
fn lacing_terminates_packets() {
    assert_eq!(lacing_values(0), [0]);
    assert_eq!(lacing_values(254), [254]);
    assert_eq!(lacing_values(255), [255, 0]);
    assert_eq!(lacing_values(600), [255, 255, 90]);
}

#[test]
fn segment_limit_is_enforced() {
    let mut writer = PageWriter::new(0);
    assert_eq!(
        writer.write_page(&[&[0u8; 255 * 255]], 0, false, false),
        Err(FramingError::TooManySegments(256))
    );
    assert_eq!(
        writer.write_packet_spanning(b"abc", 0, 0, false, false),
        Err(FramingError::InvalidSegmentLimit(0))
    );
    assert_eq!(writer.sequence(), 0);
}
