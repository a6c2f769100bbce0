use crate::utils::errors::StreamError;

/// Default ring buffer capacity in bytes.
pub const DEFAULT_PCM_CAPACITY: usize = 4096 * 500;

/// Fixed-capacity holding area for converted PCM bytes.
///
/// Filled up to a write limit, then consumed through a read cursor. The
/// buffer is cleared only once fully consumed and is never reallocated.
#[derive(Debug)]
pub struct PcmRingBuffer {
    data: Box<[u8]>,
    limit: usize,
    cursor: usize,
}

impl Default for PcmRingBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_PCM_CAPACITY)
    }
}

impl PcmRingBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity].into_boxed_slice(),
            limit: 0,
            cursor: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes written and not yet read.
    pub fn available(&self) -> usize {
        self.limit - self.cursor
    }

    /// Bytes written since the last clear.
    pub fn len(&self) -> usize {
        self.limit
    }

    pub fn is_empty(&self) -> bool {
        self.limit == 0
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.limit
    }

    /// Appends `bytes`, failing without writing anything if they do not fit.
    pub fn put(&mut self, bytes: &[u8]) -> Result<(), StreamError> {
        if bytes.len() > self.remaining() {
            return Err(StreamError::BufferOverflow {
                needed: bytes.len(),
                remaining: self.remaining(),
            });
        }

        self.data[self.limit..self.limit + bytes.len()].copy_from_slice(bytes);
        self.limit += bytes.len();
        Ok(())
    }

    pub fn next_byte(&mut self) -> Option<u8> {
        if self.cursor >= self.limit {
            return None;
        }

        let byte = self.data[self.cursor];
        self.cursor += 1;
        Some(byte)
    }

    /// Copies as many pending bytes as fit into `buf`.
    pub fn read_into(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.available());
        buf[..n].copy_from_slice(&self.data[self.cursor..self.cursor + n]);
        self.cursor += n;
        n
    }

    pub fn clear(&mut self) {
        self.limit = 0;
        self.cursor = 0;
    }
}

#[test]
fn cursor_never_passes_limit() {
    let mut ring = PcmRingBuffer::with_capacity(4);
    ring.put(&[1, 2, 3]).unwrap();
    assert_eq!(ring.remaining(), 1);

    let mut buf = [0u8; 8];
    assert_eq!(ring.read_into(&mut buf[..2]), 2);
    assert_eq!(ring.next_byte(), Some(3));
    assert_eq!(ring.next_byte(), None);
    assert_eq!(ring.read_into(&mut buf), 0);
    assert_eq!(ring.available(), 0);

    assert!(ring.put(&[4, 5]).is_err());
    ring.clear();
    assert!(ring.is_empty());
    ring.put(&[4, 5, 6, 7]).unwrap();
    assert_eq!(ring.available(), 4);
}
