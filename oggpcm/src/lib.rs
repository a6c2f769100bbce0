//! Incremental Ogg demultiplexing and PCM conversion for pull-based audio playback.
//!
//! ## Technical Overview
//!
//! A byte source is consumed in small chunks and split into pages, pages into packets
//! of one logical stream, and packets are handed to a pluggable synthesis engine. The
//! engine's planar float output is converted to interleaved signed 16-bit samples in
//! host byte order and served one byte at a time.
//!
//! ### Stream Organization
//!
//! **Pages**: `OggS` capture pattern, 27-byte header, lacing table, CRC-32 checked.
//! **Packets**: Concatenated lacing segments; a segment shorter than 255 ends a packet.
//! **Headers**: Three header packets set up the engine before any audio packet.
//!
//! ### Damage Handling
//!
//! Lost or corrupted pages are skipped and reported as holes. During audio decoding a
//! hole is logged and decoding resumes on the next intact page; strict mode turns it
//! into an error. Damage inside the header packets always aborts the stream.
//!
//! ## Quick Start
//!
//! 1. Implement [`engine::SynthesisEngine`] for the codec in use
//! 2. Wrap the byte source in a [`process::stream::StreamAdapter`]
//! 3. Read PCM bytes with [`process::stream::StreamAdapter::read_byte`] or [`std::io::Read`]
//!
//! ```rust,no_run
//! use std::io::Read;
//! use oggpcm::engine::SynthesisEngine;
//! use oggpcm::process::stream::{AdapterConfig, StreamAdapter};
//!
//! fn decode_all<E: SynthesisEngine>(engine: E) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
//!     let source = std::fs::File::open("track.ogg")?;
//!
//!     let mut config = AdapterConfig::default();
//!     config.set_fail_level(log::Level::Warn);
//!
//!     let mut stream = StreamAdapter::with_config(source, engine, config);
//!     let parameters = stream.open()?;
//!     log::info!("{} channels, {} Hz", parameters.channels, parameters.sample_rate);
//!
//!     let mut pcm = Vec::new();
//!     stream.read_to_end(&mut pcm)?;
//!     Ok(pcm)
//! }
//! ```

/// Boundary to the codec performing header ingestion and block synthesis.
pub mod engine;

/// Stream processing stages.
///
/// 1. **Page Framing** ([`process::page`]): Sync, validate and extract pages.
/// 2. **Packet Assembly** ([`process::packet`]): Rebuild packets of one logical stream.
/// 3. **Header Phase** ([`process::header`]): Feed the header packets to the engine.
/// 4. **Data Phase** ([`process::data`]): Synthesize audio packets and convert PCM.
/// 5. **Conversion** ([`process::convert`], [`process::ring`]): 16-bit output buffering.
/// 6. **Adapter** ([`process::stream`]): Pull-based byte stream over all of the above.
/// 7. **Page Writer** ([`process::writer`]): Page framing for fixtures and tools.
pub mod process;

/// Supporting infrastructure.
///
/// - **CRC Validation** ([`utils::crc`]): Page checksums
/// - **Error Handling** ([`utils::errors`]): Error types and fail-level logging
pub mod utils;

pub use engine::{PcmFrames, SynthesisEngine};
pub use process::header::StreamParameters;
pub use process::stream::{AdapterConfig, StreamAdapter};
pub use utils::errors::{EngineError, StreamError};
