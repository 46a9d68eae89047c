//! # AAC Payload Framing
//!
//! AAC elementary streams carry no framing of their own; each container
//! wraps the raw AAC frames differently:
//!
//! - MPEG-TS with AAC-LC uses 7-byte **ADTS** headers per frame
//! - MPEG-TS with the HE profiles uses **LATM** audio-mux elements
//! - FLV sends a one-off **AudioSpecificConfig** sequence header followed
//!   by raw frames
//!
//! ```rust
//! use castio::codec::aac::AudioSpecificConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let asc = AudioSpecificConfig::new(2, 44_100, 1)?;
//! let bytes = asc.to_bytes()?;
//! assert_eq!(AudioSpecificConfig::parse(&bytes)?, asc);
//! # Ok(())
//! # }
//! ```

/// AudioSpecificConfig synthesis and parsing
pub mod asc;
/// ADTS per-frame header
pub mod adts;
/// LATM audio-mux element framing
pub mod latm;

pub use adts::AdtsHeader;
pub use asc::AudioSpecificConfig;
pub use latm::LatmWrapper;
