//! # Utility Functions and Types
//!
//! This module provides common utility functions and types used throughout
//! the castio library. It includes implementations for:
//!
//! - Bit-level reading and writing across byte boundaries
//! - MPEG-2 CRC32 calculation for PSI tables
//! - Annex-B start-code handling for H.264/HEVC payloads
//! - A latest-value observable cell for pipeline state
//!
//! ## Bit Operations
//!
//! ```rust
//! use castio::utils::{BitReader, BitWriter};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut writer = BitWriter::new();
//! writer.put_uint(0b101, 3)?;
//! writer.put_bool(true);
//! let bytes = writer.into_bytes();
//!
//! let mut reader = BitReader::new(&bytes);
//! assert_eq!(reader.read_bits(3)?, 0b101);
//! # Ok(())
//! # }
//! ```

/// Bit manipulation and bitstream reading/writing utilities
pub mod bits;

/// CRC calculation implementations
pub mod crc;

/// Annex-B start-code helpers
pub mod nal;

/// Latest-value observable cell
pub mod observable;

// Re-export commonly used types
pub use bits::{BitReader, BitWriter};
pub use crc::Crc32Mpeg2;
pub use observable::Observable;
