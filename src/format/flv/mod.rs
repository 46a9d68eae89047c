//! # Flash Video (FLV) Implementation
//!
//! FLV muxing per the Adobe FLV 10.1 specification, including the
//! extended video tag header (IsExHeader + FourCC) for HEVC, AV1 and VP9:
//!
//! - 13-byte file header and `onMetaData` AMF0 script tag
//! - Per-track sequence header tags (decoder configuration records,
//!   AudioSpecificConfig)
//! - Startup gating on the first video key frame with timestamp rebasing
//!
//! ## Example Usage
//!
//! ```rust
//! use castio::av::{CodecId, Frame};
//! use castio::config::{AudioConfig, StreamConfig};
//! use castio::format::flv::FlvMuxer;
//! use tokio::sync::mpsc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (tx, mut rx) = mpsc::unbounded_channel();
//! let mut muxer = FlvMuxer::new(tx);
//! let pid = muxer.add_stream(StreamConfig::Audio(AudioConfig::default()))?;
//! muxer.start_stream();
//!
//! muxer.write(&Frame::new(CodecId::Aac, vec![0u8; 32], 0), pid)?;
//! let header = rx.try_recv()?;
//! assert_eq!(&header.buffer[0..3], b"FLV");
//! # Ok(())
//! # }
//! ```

/// AMF0 serialization for script tags
pub mod amf;

/// FLV muxer implementation
pub mod muxer;

/// Tag framing and codec-specific tag bodies
pub mod tags;


pub use muxer::FlvMuxer;
