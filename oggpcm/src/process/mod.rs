/// Page extraction from raw bitstream bytes.
///
/// Provides the [`PageAccumulator`](page::PageAccumulator) for finding capture
/// patterns and extracting [`Page`](page::Page) objects from continuous data.
pub mod page;

/// Packet reconstruction from pages of one logical stream.
///
/// Provides the [`PacketDemultiplexer`](packet::PacketDemultiplexer) which joins
/// lacing segments into [`Packet`](packet::Packet) objects.
pub mod packet;

/// Page serialization, mostly for fixtures.
pub mod writer;

/// Three-packet header bootstrap.
pub mod header;

/// Steady-state packet synthesis and PCM draining.
pub mod data;

/// Float to interleaved 16-bit conversion.
pub mod convert;

/// Converted bytes pending consumption.
pub mod ring;

/// The pull-based adapter tying the phases together.
pub mod stream;

/// Result of a single extraction attempt on the page or packet layer.
///
/// `Hole` means data was lost (framing sync or page sequence). It is not an
/// error at this layer; each phase decides what it means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted<T> {
    NeedMoreData,
    Ready(T),
    Hole,
}

/// Outcome of one step of a phase state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    NeedMoreData,
    Advanced,
    Hole,
    Done,
}
