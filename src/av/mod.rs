//! # Audio/Video Core Types
//!
//! This module provides the core types flowing through the pipeline:
//!
//! - [`CodecId`] identifies the codec of an elementary stream
//! - [`Frame`] is the unit flowing between encoders and muxers
//! - [`Packet`] is the unit flowing between muxers and sinks
//!
//! ## Example Usage
//!
//! ```rust
//! use castio::av::{CodecId, Frame};
//! use bytes::Bytes;
//!
//! let frame = Frame::new(CodecId::H264, Bytes::from_static(&[0x65, 0x00]), 33_000)
//!     .with_key_flag(true);
//! assert!(frame.mime.is_video());
//! ```

/// Supported codec identifiers for audio and video streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecId {
    /// H.264/AVC video
    H264,
    /// H.265/HEVC video
    Hevc,
    /// AV1 video
    Av1,
    /// VP9 video
    Vp9,
    /// Advanced Audio Coding
    Aac,
    /// Opus audio
    Opus,
    /// Uncompressed PCM audio
    RawAudio,
}

impl CodecId {
    /// Resolves a mime string to a codec identifier.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "video/avc" => Some(CodecId::H264),
            "video/hevc" => Some(CodecId::Hevc),
            "video/av01" => Some(CodecId::Av1),
            "video/x-vnd.on2.vp9" => Some(CodecId::Vp9),
            "audio/mp4a-latm" => Some(CodecId::Aac),
            "audio/opus" => Some(CodecId::Opus),
            "audio/raw" => Some(CodecId::RawAudio),
            _ => None,
        }
    }

    /// The canonical mime string for this codec.
    pub fn mime(&self) -> &'static str {
        match self {
            CodecId::H264 => "video/avc",
            CodecId::Hevc => "video/hevc",
            CodecId::Av1 => "video/av01",
            CodecId::Vp9 => "video/x-vnd.on2.vp9",
            CodecId::Aac => "audio/mp4a-latm",
            CodecId::Opus => "audio/opus",
            CodecId::RawAudio => "audio/raw",
        }
    }

    /// True for video codecs.
    pub fn is_video(&self) -> bool {
        matches!(
            self,
            CodecId::H264 | CodecId::Hevc | CodecId::Av1 | CodecId::Vp9
        )
    }

    /// True for audio codecs.
    pub fn is_audio(&self) -> bool {
        !self.is_video()
    }
}

impl std::fmt::Display for CodecId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mime())
    }
}

/// Encoded frame handling between encoders and muxers
pub mod frame;
pub use frame::{Frame, FrameFormat};

/// Container packet handling between muxers and sinks
pub mod packet;
pub use packet::{Packet, PacketKind};
