use crate::process::Extracted;
use crate::utils::crc::OGG_PAGE_CRC;
use log::debug;
use std::sync::Arc;

/// Capture pattern opening every page.
pub const CAPTURE_PATTERN: &[u8; 4] = b"OggS";

/// Size of the fixed page header preceding the segment table.
pub const HEADER_SIZE: usize = 27;

/// Largest possible page: full header, 255 lacing values, 255 * 255 body bytes.
pub const MAX_PAGE_SIZE: usize = HEADER_SIZE + 255 + 255 * 255;

/// Header type flags.
pub mod header_type {
    pub const CONTINUED: u8 = 0x01;
    pub const BOS: u8 = 0x02;
    pub const EOS: u8 = 0x04;
}

/// Accumulates raw bitstream bytes and cuts them into pages.
///
/// Bytes are written with [`reserve`](Self::reserve) followed by
/// [`commit`](Self::commit); [`extract_page`](Self::extract_page) then returns
/// complete, checksum-verified pages one at a time.
///
/// # Example
///
/// ```rust
/// use oggpcm::process::Extracted;
/// use oggpcm::process::page::PageAccumulator;
/// use oggpcm::process::writer::PageWriter;
///
/// let mut writer = PageWriter::new(7);
/// let bytes = writer.write_page(&[b"hello".as_slice()], 0, true, false)?;
///
/// let mut pages = PageAccumulator::default();
/// pages.reserve(bytes.len()).copy_from_slice(&bytes);
/// pages.commit(bytes.len());
///
/// match pages.extract_page() {
///     Extracted::Ready(page) => assert_eq!(page.serial(), 7),
///     other => panic!("unexpected {other:?}"),
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct PageAccumulator {
    data: Vec<u8>,
    fill: usize,
    returned: usize,
    unsynced: bool,
    pages_extracted: usize,
    holes: usize,
    bytes_skipped: usize,
}

impl Default for PageAccumulator {
    fn default() -> Self {
        Self::with_capacity(4096)
    }
}

impl PageAccumulator {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            fill: 0,
            returned: 0,
            unsynced: false,
            pages_extracted: 0,
            holes: 0,
            bytes_skipped: 0,
        }
    }

    /// Returns a writable region of exactly `n` bytes at the end of the
    /// accumulated data.
    ///
    /// Already-extracted bytes are discarded first; the backing store only grows
    /// when the unconsumed bytes plus `n` do not fit.
    pub fn reserve(&mut self, n: usize) -> &mut [u8] {
        if self.returned > 0 {
            self.data.copy_within(self.returned..self.fill, 0);
            self.fill -= self.returned;
            self.returned = 0;
        }

        if self.data.len() < self.fill + n {
            self.data.resize(self.fill + n, 0);
        }

        &mut self.data[self.fill..self.fill + n]
    }

    /// Records that `n` bytes were written into the region handed out by the
    /// last [`reserve`](Self::reserve).
    pub fn commit(&mut self, n: usize) {
        assert!(
            self.fill + n <= self.data.len(),
            "commit of {n} bytes exceeds reserved space"
        );
        self.fill += n;
    }

    /// Extracts the next complete page.
    ///
    /// Returns [`Extracted::Hole`] once when framing sync is lost; the skipped
    /// bytes are dropped and scanning resumes at the next candidate capture
    /// pattern on the following call.
    pub fn extract_page(&mut self) -> Extracted<Page> {
        loop {
            match self.seek_page() {
                Seek::NeedMoreData => return Extracted::NeedMoreData,
                Seek::Page(page) => {
                    self.unsynced = false;
                    self.pages_extracted += 1;
                    return Extracted::Ready(page);
                }
                Seek::Skipped(n) => {
                    self.bytes_skipped += n;
                    if !self.unsynced {
                        self.unsynced = true;
                        self.holes += 1;
                        debug!("Lost page sync, skipped {n} bytes");
                        return Extracted::Hole;
                    }
                }
            }
        }
    }

    /// Bytes committed but not yet consumed by a page.
    pub fn buffered(&self) -> usize {
        self.fill - self.returned
    }

    pub fn pages_extracted(&self) -> usize {
        self.pages_extracted
    }

    pub fn holes(&self) -> usize {
        self.holes
    }

    pub fn bytes_skipped(&self) -> usize {
        self.bytes_skipped
    }

    /// Drops all buffered bytes and sync state.
    pub fn reset(&mut self) {
        self.fill = 0;
        self.returned = 0;
        self.unsynced = false;
    }

    fn seek_page(&mut self) -> Seek {
        let avail = &self.data[self.returned..self.fill];
        if avail.len() < HEADER_SIZE {
            return Seek::NeedMoreData;
        }

        'sync_fail: {
            if &avail[..4] != CAPTURE_PATTERN || avail[4] != 0 {
                break 'sync_fail;
            }

            let header_len = HEADER_SIZE + avail[26] as usize;
            if avail.len() < header_len {
                return Seek::NeedMoreData;
            }

            let body_len = avail[HEADER_SIZE..header_len]
                .iter()
                .map(|&lace| lace as usize)
                .sum::<usize>();
            let page_len = header_len + body_len;
            if avail.len() < page_len {
                return Seek::NeedMoreData;
            }

            let page_bytes = &avail[..page_len];
            let stored = u32::from_le_bytes([
                page_bytes[22],
                page_bytes[23],
                page_bytes[24],
                page_bytes[25],
            ]);
            let calculated = OGG_PAGE_CRC.page_checksum(page_bytes);
            if stored != calculated {
                debug!(
                    "Page checksum mismatch. Calculated {calculated:#010X}, Read {stored:#010X}"
                );
                break 'sync_fail;
            }

            let page = Page {
                data: Arc::from(page_bytes),
                header_len,
            };
            self.returned += page_len;
            return Seek::Page(page);
        }

        let skipped = avail[1..]
            .iter()
            .position(|&b| b == CAPTURE_PATTERN[0])
            .map_or(avail.len(), |i| i + 1);
        self.returned += skipped;
        Seek::Skipped(skipped)
    }
}

enum Seek {
    NeedMoreData,
    Page(Page),
    Skipped(usize),
}

/// A single checksum-verified page.
///
/// The raw page (header, segment table and body) is accessible through the
/// [`AsRef<[u8]>`] implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    data: Arc<[u8]>,
    header_len: usize,
}

impl AsRef<[u8]> for Page {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl Page {
    pub fn version(&self) -> u8 {
        self.data[4]
    }

    pub fn header_type(&self) -> u8 {
        self.data[5]
    }

    /// First segment continues a packet from the previous page.
    pub fn is_continued(&self) -> bool {
        self.header_type() & header_type::CONTINUED != 0
    }

    pub fn is_bos(&self) -> bool {
        self.header_type() & header_type::BOS != 0
    }

    pub fn is_eos(&self) -> bool {
        self.header_type() & header_type::EOS != 0
    }

    pub fn granule_position(&self) -> i64 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.data[6..14]);
        i64::from_le_bytes(bytes)
    }

    pub fn serial(&self) -> u32 {
        u32::from_le_bytes([self.data[14], self.data[15], self.data[16], self.data[17]])
    }

    pub fn sequence(&self) -> u32 {
        u32::from_le_bytes([self.data[18], self.data[19], self.data[20], self.data[21]])
    }

    pub fn checksum(&self) -> u32 {
        u32::from_le_bytes([self.data[22], self.data[23], self.data[24], self.data[25]])
    }

    /// Lacing values, one per segment.
    pub fn segment_table(&self) -> &[u8] {
        &self.data[HEADER_SIZE..self.header_len]
    }

    pub fn body(&self) -> &[u8] {
        &self.data[self.header_len..]
    }

    /// Number of packets that end on this page.
    pub fn packets_completed(&self) -> usize {
        self.segment_table().iter().filter(|&&lace| lace < 255).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::writer::PageWriter;

    fn push(pages: &mut PageAccumulator, bytes: &[u8]) {
        pages.reserve(bytes.len()).copy_from_slice(bytes);
        pages.commit(bytes.len());
    }

    fn ready(extracted: Extracted<Page>) -> Page {
        match extracted {
            Extracted::Ready(page) => page,
            other => panic!("expected a page, got {other:?}"),
        }
    }

    #[test]
    fn page_split_across_writes() -> anyhow::Result<()> {
        let mut writer = PageWriter::new(0x1234_5678);
        let bytes = writer.write_page(&[&[1, 2, 3], &[4; 300]], 4410, true, false)?;

        let mut pages = PageAccumulator::default();
        for chunk in bytes.chunks(7) {
            assert_eq!(pages.extract_page(), Extracted::NeedMoreData);
            push(&mut pages, chunk);
        }

        let page = ready(pages.extract_page());
        assert_eq!(page.version(), 0);
        assert_eq!(page.checksum(), OGG_PAGE_CRC.page_checksum(&bytes));
        assert_eq!(page.as_ref(), bytes.as_slice());
        assert_eq!(page.serial(), 0x1234_5678);
        assert_eq!(page.sequence(), 0);
        assert_eq!(page.granule_position(), 4410);
        assert!(page.is_bos());
        assert!(!page.is_eos());
        assert_eq!(page.segment_table(), &[3, 255, 45]);
        assert_eq!(page.body().len(), 303);
        assert_eq!(page.packets_completed(), 2);
        assert_eq!(pages.buffered(), 0);
        assert_eq!(pages.extract_page(), Extracted::NeedMoreData);
        Ok(())
    }

    #[test]
    fn garbage_reports_one_hole() -> anyhow::Result<()> {
        let mut writer = PageWriter::new(1);
        let mut bytes = vec![b'O'; 10];
        bytes.extend((0..200).map(|i| (i * 37 + 11) as u8));
        bytes.extend(writer.write_page(&[b"payload"], 0, false, false)?);

        let mut pages = PageAccumulator::default();
        push(&mut pages, &bytes);

        assert_eq!(pages.extract_page(), Extracted::Hole);
        let page = ready(pages.extract_page());
        assert_eq!(page.body(), b"payload");
        assert_eq!(pages.holes(), 1);
        assert_eq!(pages.bytes_skipped(), 210);
        Ok(())
    }

    #[test]
    fn corrupted_checksum_is_skipped() -> anyhow::Result<()> {
        let mut writer = PageWriter::new(9);
        let mut first = writer.write_page(&[b"first"], 0, false, false)?;
        let second = writer.write_page(&[b"second"], 0, false, false)?;
        let last = first.len() - 1;
        first[last] ^= 0xFF;

        let mut pages = PageAccumulator::default();
        push(&mut pages, &first);
        push(&mut pages, &second);

        assert_eq!(pages.extract_page(), Extracted::Hole);
        let page = ready(pages.extract_page());
        assert_eq!(page.body(), b"second");
        assert_eq!(page.sequence(), 1);
        Ok(())
    }

    #[test]
    fn reserve_compacts_consumed_bytes() -> anyhow::Result<()> {
        let mut writer = PageWriter::new(3);
        let bytes = writer.write_page(&[&[0xAA; 100]], 0, false, false)?;

        let mut pages = PageAccumulator::with_capacity(0);
        push(&mut pages, &bytes);
        ready(pages.extract_page());

        let region = pages.reserve(16);
        assert_eq!(region.len(), 16);
        assert_eq!(pages.buffered(), 0);
        Ok(())
    }
}
