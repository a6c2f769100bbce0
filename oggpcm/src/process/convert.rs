use crate::engine::PcmFrames;
use crate::process::ring::PcmRingBuffer;
use crate::utils::errors::StreamError;

/// Default size of the conversion scratch buffer in bytes.
pub const DEFAULT_SCRATCH_CAPACITY: usize = 4096;

/// Byte order of the produced 16-bit samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    BigEndian,
    LittleEndian,
}

impl ByteOrder {
    /// Native byte order of the build target.
    pub const fn host() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::BigEndian
        } else {
            ByteOrder::LittleEndian
        }
    }
}

/// Scales a float sample to 16 bits.
///
/// Truncates toward zero, clamps, then sets bit 15 on negative values before
/// the bytes are split. The result must stay bit-identical to the legacy
/// output, so the fix-up is kept as is.
#[inline(always)]
pub fn quantize(sample: f32) -> i32 {
    let mut val = (f64::from(sample) * 32767.0) as i32;
    val = val.clamp(-32768, 32767);
    if val < 0 {
        val |= 0x8000;
    }
    val
}

/// Splits a quantized sample into two bytes.
#[inline(always)]
pub fn split(val: i32, order: ByteOrder) -> [u8; 2] {
    match order {
        ByteOrder::BigEndian => [(val >> 8) as u8, val as u8],
        ByteOrder::LittleEndian => [val as u8, (val >> 8) as u8],
    }
}

/// Converts planar float frames into interleaved signed 16-bit bytes.
///
/// The byte order is fixed when the converter is built. Each call converts
/// at most as many frames as fit the scratch buffer.
#[derive(Debug)]
pub struct SampleConverter {
    order: ByteOrder,
    channels: usize,
    scratch: Vec<u8>,
}

impl SampleConverter {
    /// Converter for the host byte order.
    pub fn new(channels: usize, scratch_capacity: usize) -> Self {
        Self::with_byte_order(channels, scratch_capacity, ByteOrder::host())
    }

    pub fn with_byte_order(channels: usize, scratch_capacity: usize, order: ByteOrder) -> Self {
        Self {
            order,
            channels,
            scratch: vec![0; scratch_capacity],
        }
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Frames converted per call at most.
    pub fn max_frames(&self) -> usize {
        self.scratch.len() / (2 * self.channels)
    }

    /// Converts the prefix of `frames` that fits the scratch buffer and appends
    /// it to `out`.
    ///
    /// Returns the number of frames consumed, which the caller passes on to the
    /// engine's read cursor.
    pub fn convert(
        &mut self,
        frames: &PcmFrames<'_>,
        out: &mut PcmRingBuffer,
    ) -> Result<usize, StreamError> {
        if frames.channels() < self.channels {
            return Err(StreamError::ChannelMismatch {
                found: frames.channels(),
                expected: self.channels,
            });
        }

        let bout = frames.frames().min(self.max_frames());
        let stride = 2 * self.channels;

        for channel in 0..self.channels {
            let plane = &frames.plane(channel)[..bout];
            let mut ptr = channel * 2;
            for &sample in plane {
                let bytes = split(quantize(sample), self.order);
                self.scratch[ptr..ptr + 2].copy_from_slice(&bytes);
                ptr += stride;
            }
        }

        out.put(&self.scratch[..stride * bout])?;
        Ok(bout)
    }
}
