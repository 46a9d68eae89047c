//! # Container Format Implementations
//!
//! This module provides the container muxers the pipeline can emit through:
//!
//! - **TS**: MPEG Transport Stream with multiple services and streams
//! - **FLV**: Flash Video with a single audio and/or video track
//!
//! Both muxers consume [`crate::av::Frame`]s and emit [`crate::av::Packet`]s
//! through an unbounded channel owned by the caller; the pipeline's writer
//! worker drains that channel into the sink.
//!
//! ## Example: muxing one AAC frame to TS
//!
//! ```rust
//! use castio::av::{CodecId, Frame};
//! use castio::config::{AudioConfig, ServiceInfo, StreamConfig};
//! use castio::format::ts::TsMuxer;
//! use tokio::sync::mpsc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (tx, mut rx) = mpsc::unbounded_channel();
//! let mut muxer = TsMuxer::new(tx);
//! muxer.add_service(ServiceInfo::default())?;
//! let pid = muxer.add_stream(StreamConfig::Audio(AudioConfig::default()))?;
//! muxer.start_stream();
//! muxer.write(&Frame::new(CodecId::Aac, vec![0u8; 64], 0), pid)?;
//! assert!(rx.try_recv().is_ok());
//! # Ok(())
//! # }
//! ```

/// Flash Video (FLV) format implementation
pub mod flv;

/// MPEG Transport Stream (TS) format implementation
pub mod ts;

// Re-export commonly used types
pub use self::flv::FlvMuxer;
pub use self::ts::{TsMuxer, TsPacketParser};
