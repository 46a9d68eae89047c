use super::CodecId;
use crate::error::{CastError, Result};
use bytes::Bytes;

/// Side-channel codec parameters attached to a [`Frame`].
///
/// Encoders fill in whichever fields apply to their track; muxers read them
/// when building headers (sample-rate index for ADTS, dimensions for
/// `onMetaData`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameFormat {
    /// Audio sample rate in Hz
    pub sample_rate: Option<u32>,
    /// Audio channel count
    pub channel_count: Option<u8>,
    /// Video width in pixels
    pub width: Option<u32>,
    /// Video height in pixels
    pub height: Option<u32>,
    /// Codec profile identifier
    pub profile: Option<i32>,
    /// Codec level identifier
    pub level: Option<i32>,
}

/// A unit flowing between an encoder and a muxer.
///
/// Timestamps are in microseconds and monotonic within a track. `extra`
/// carries codec-specific configuration (SPS/PPS/VPS for video,
/// AudioSpecificConfig for AAC) and is present on the first frame of a
/// sequence and on every video key frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Encoded payload bytes
    pub buffer: Bytes,
    /// Codec of the track this frame belongs to
    pub mime: CodecId,
    /// Presentation timestamp in microseconds
    pub pts: i64,
    /// Decode timestamp in microseconds; `None` means equal to `pts`
    pub dts: Option<i64>,
    /// Key-frame flag; audio frames are always treated as key frames
    pub is_key_frame: bool,
    /// Codec-specific configuration byte sequences
    pub extra: Option<Vec<Bytes>>,
    /// Side-channel codec parameters
    pub format: FrameFormat,
}

impl Frame {
    /// Creates a frame with the given codec, payload and presentation time.
    pub fn new(mime: CodecId, buffer: impl Into<Bytes>, pts: i64) -> Self {
        Self {
            buffer: buffer.into(),
            mime,
            pts,
            dts: None,
            is_key_frame: false,
            extra: None,
            format: FrameFormat::default(),
        }
    }

    /// Sets a decode timestamp distinct from the presentation timestamp.
    pub fn with_dts(mut self, dts: i64) -> Self {
        self.dts = Some(dts);
        self
    }

    /// Sets the key-frame flag.
    pub fn with_key_flag(mut self, is_key: bool) -> Self {
        self.is_key_frame = is_key;
        self
    }

    /// Attaches codec-specific configuration byte sequences.
    pub fn with_extra(mut self, extra: Vec<Bytes>) -> Self {
        self.extra = Some(extra);
        self
    }

    /// Attaches side-channel codec parameters.
    pub fn with_format(mut self, format: FrameFormat) -> Self {
        self.format = format;
        self
    }

    /// The effective decode timestamp (`dts`, or `pts` when absent).
    pub fn decode_ts(&self) -> i64 {
        self.dts.unwrap_or(self.pts)
    }

    /// Whether this frame starts a decodable unit.
    ///
    /// Audio frames always do; video frames only when flagged.
    pub fn is_sync(&self) -> bool {
        self.mime.is_audio() || self.is_key_frame
    }

    /// Checks the frame invariants: non-empty payload, `dts <= pts`.
    pub fn validate(&self) -> Result<()> {
        if self.buffer.is_empty() {
            return Err(CastError::InvalidData("frame with empty payload".into()));
        }
        if let Some(dts) = self.dts {
            if dts > self.pts {
                return Err(CastError::InvalidData(format!(
                    "dts {} after pts {}",
                    dts, self.pts
                )));
            }
        }
        Ok(())
    }
}
