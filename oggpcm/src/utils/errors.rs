#[macro_export]
macro_rules! log_or_err {
    ($state:expr, $level:expr, $err:expr $(,)?) => {{
        if $level <= $state.fail_level {
            return Err($err);
        } else {
            match $level {
                ::log::Level::Error => ::log::error!("{}", $err),
                ::log::Level::Warn => ::log::warn!("{}", $err),
                ::log::Level::Info => ::log::info!("{}", $err),
                ::log::Level::Debug => ::log::debug!("{}", $err),
                ::log::Level::Trace => ::log::trace!("{}", $err),
            }
        }
    }};
}

/// Failures of the stream adapter.
///
/// Everything except [`StreamError::SyncLoss`] aborts the stream. Sync loss is
/// only ever returned when the adapter runs with a `Warn` fail level.
#[derive(thiserror::Error, Debug)]
pub enum StreamError {
    #[error("Not a recognized compressed-audio stream: header packet {packet} rejected ({source})")]
    UnrecognizedStream { packet: u64, source: EngineError },

    #[error("Corrupt or missing data in header packet {packet}")]
    CorruptHeader { packet: u64 },

    #[error("Stream ended prematurely after {headers} of 3 header packets")]
    PrematureEnd { headers: u64 },

    #[error("Invalid stream parameters: {channels} channels at {sample_rate} Hz")]
    InvalidParameters { channels: usize, sample_rate: u32 },

    #[error("Engine delivered {found} channels, stream declares {expected}")]
    ChannelMismatch { found: usize, expected: usize },

    #[error("Converted block too big to be buffered: {needed} bytes, {remaining} remaining")]
    BufferOverflow { needed: usize, remaining: usize },

    #[error("Corrupt or missing data in bitstream near packet {packet}")]
    SyncLoss { packet: u64 },

    #[error("Failure reading bitstream: {0}")]
    Io(#[from] std::io::Error),
}

/// Rejection reported by a synthesis engine.
///
/// `code` carries the engine's own (negative) status value.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("synthesis engine status {code}")]
pub struct EngineError {
    pub code: i32,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum DemuxError {
    #[error("Page belongs to stream {found:#010X}, expected {expected:#010X}")]
    SerialMismatch { found: u32, expected: u32 },

    #[error("Page {sequence} arrived after the end-of-stream page")]
    PastEndOfStream { sequence: u32 },
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum FramingError {
    #[error("A page holds at most 255 segments, {0} requested")]
    TooManySegments(usize),

    #[error("Page segment limit must be between 1 and 255, got {0}")]
    InvalidSegmentLimit(usize),
}
