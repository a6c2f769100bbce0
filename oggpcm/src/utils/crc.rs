//! CRC validation for Ogg pages.
//!
//! Ogg uses a non-reflected CRC-32 with polynomial `0x04C11DB7`, zero initial
//! value and no final xor. The checksum covers the whole page with the CRC
//! field itself set to zero.

/// CRC parameters: polynomial and initial value.
pub struct Algorithm<T> {
    poly: T,
    init: T,
}

/// CRC-32 algorithm for page checksums.
pub const CRC_OGG_PAGE_ALG: Algorithm<u32> = Algorithm {
    poly: 0x04c1_1db7,
    init: 0x0000_0000,
};

/// Shared page checksum table, built at compile time.
pub const OGG_PAGE_CRC: Crc32 = Crc32::new(&CRC_OGG_PAGE_ALG);

/// Computes one CRC-32 table entry using the specified polynomial.
#[inline(always)]
pub const fn crc32(poly: u32, value: u8) -> u32 {
    let mut r = (value as u32) << 24;

    let mut i = 0;
    while i < 8 {
        r = (r << 1) ^ (((r >> 31) & 1) * poly);
        i += 1;
    }

    r
}

#[inline(always)]
const fn crc32_table(poly: u32) -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < table.len() {
        table[i] = crc32(poly, i as u8);
        i += 1;
    }

    table
}

#[derive(Debug)]
pub struct Crc32 {
    pub poly: u32,
    pub init: u32,
    table: [u32; 256],
}

impl Crc32 {
    pub const fn new(algorithm: &Algorithm<u32>) -> Self {
        Self {
            poly: algorithm.poly,
            init: algorithm.init,
            table: crc32_table(algorithm.poly),
        }
    }

    const fn table_entry(&self, index: u32) -> u32 {
        self.table[(index & 0xFF) as usize]
    }

    #[inline(always)]
    pub const fn update(&self, mut crc: u32, bytes: &[u8]) -> u32 {
        let mut i = 0;

        while i < bytes.len() {
            crc = (crc << 8) ^ self.table_entry((crc >> 24) ^ bytes[i] as u32);
            i += 1;
        }

        crc
    }

    /// Checksum of a serialized page. Bytes 22..26 (the stored checksum)
    /// are treated as zero.
    pub fn page_checksum(&self, page: &[u8]) -> u32 {
        let crc = self.update(self.init, &page[..22]);
        let crc = self.update(crc, &[0; 4]);
        self.update(crc, &page[26..])
    }
}

#[test]
fn check_value() {
    // CRC-32/CKSUM without the final inversion
    assert_eq!(OGG_PAGE_CRC.update(0, b"123456789"), !0x765E_7680);
}

#[test]
fn stored_checksum_is_ignored() {
    let mut page = vec![0u8; 40];
    page[..4].copy_from_slice(b"OggS");
    let clean = OGG_PAGE_CRC.page_checksum(&page);

    page[22..26].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
    assert_eq!(OGG_PAGE_CRC.page_checksum(&page), clean);
}
