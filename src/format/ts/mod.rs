//! # MPEG Transport Stream (TS) Implementation
//!
//! This module implements MPEG-TS muxing per ISO/IEC 13818-1:
//!
//! - 188-byte packet framing with continuity counters and adaptation fields
//! - PAT/PMT/SDT emission with versioning and periodic retransmission
//! - PES framing with 33-bit PTS/DTS and PCR insertion on key frames
//! - Per-codec payload wrapping (AUD insertion, ADTS/LATM, Opus control
//!   headers) via the [`crate::codec`] modules
//!
//! A verification-grade read-back parser lives alongside the muxer so the
//! emitted bytes can be demuxed and compared against the input frames.
//!
//! ## Example Usage
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
//!
//! let service = ServiceInfo::default();
//! muxer.add_service(service.clone())?;
//! let pid = muxer.add_stream(StreamConfig::Audio(AudioConfig::default()))?;
//! muxer.start_stream();
//!
//! muxer.write(&Frame::new(CodecId::Aac, vec![0u8; 32], 0), pid)?;
//! let batch = rx.try_recv()?;
//! assert_eq!(batch.buffer.len() % 188, 0);
//! # Ok(())
//! # }
//! ```

/// TS muxer implementation
pub mod muxer;

/// Read-back parsing utilities used to verify muxer output
pub mod parser;

/// PES packet framing
pub mod pes;

/// Core TS types, PSI tables and constants
pub mod types;


pub use muxer::TsMuxer;
pub use parser::{DemuxedPes, DemuxedService, TsPacketParser};
pub use types::{
    MAX_OUTPUT_PACKET_NUMBER, PAT_PACKET_PERIOD, PID_PAT, PID_SDT, SDT_PACKET_PERIOD,
    TS_PACKET_SIZE,
};
