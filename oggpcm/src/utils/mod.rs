//! Utility functions and supporting infrastructure.
//!
//! Provides CRC validation and error handling for page and packet processing.

pub mod crc;
pub mod errors;
