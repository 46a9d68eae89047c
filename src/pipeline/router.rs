use crate::av::{CodecId, Frame};
use crate::codec::{h264, h265};
use crate::error::{CastError, Result};
use std::collections::HashMap;

/// Routes encoder output to muxer streams.
///
/// The router owns the mime-to-PID registry built when streams were added
/// to the muxer, latches a session base timestamp shared by all tracks,
/// drops configuration-only buffers (the muxers take codec config from
/// frame extra data), and optionally gates everything before the first
/// video key frame to match the FLV startup policy.
pub struct FrameRouter {
    pids: HashMap<CodecId, u16>,
    base_pts: Option<i64>,
    gate_on_video_key: bool,
    video_key_seen: bool,
}

impl FrameRouter {
    /// Creates a router without the video key gate (MPEG-TS policy).
    pub fn new() -> Self {
        Self::with_video_key_gate(false)
    }

    /// Creates a router, gating all tracks before the first video key
    /// frame when `gate` is set (FLV policy).
    pub fn with_video_key_gate(gate: bool) -> Self {
        Self {
            pids: HashMap::new(),
            base_pts: None,
            gate_on_video_key: gate,
            video_key_seen: false,
        }
    }

    /// Registers the PID assigned to a codec's track.
    pub fn register(&mut self, mime: CodecId, pid: u16) {
        self.pids.insert(mime, pid);
    }

    /// True when a video track is registered.
    pub fn has_video(&self) -> bool {
        self.pids.keys().any(|m| m.is_video())
    }

    /// Resets the session state: base timestamp, gate and registry.
    pub fn clear(&mut self) {
        self.pids.clear();
        self.base_pts = None;
        self.video_key_seen = false;
    }

    /// Routes one frame: looks up its PID, applies the gate and rebases
    /// its timestamps.
    ///
    /// Returns `None` for frames the session drops (configuration-only
    /// payloads and gated frames).
    pub fn route(&mut self, mut frame: Frame) -> Result<Option<(Frame, u16)>> {
        let pid = *self
            .pids
            .get(&frame.mime)
            .ok_or_else(|| CastError::UnknownStream(format!("{} is not registered", frame.mime)))?;

        if is_configuration_only(&frame) {
            return Ok(None);
        }

        if self.gate_on_video_key && self.has_video() && !self.video_key_seen {
            if frame.mime.is_video() && frame.is_key_frame {
                self.video_key_seen = true;
            } else {
                return Ok(None);
            }
        }

        let base = *self.base_pts.get_or_insert(frame.pts);
        frame.pts -= base;
        if let Some(dts) = frame.dts {
            frame.dts = Some((dts - base).max(0));
        }
        Ok(Some((frame, pid)))
    }
}

impl Default for FrameRouter {
    fn default() -> Self {
        Self::new()
    }
}

// An access unit with no picture data carries nothing the muxer wants;
// codec config reaches it through frame extra data instead.
fn is_configuration_only(frame: &Frame) -> bool {
    match frame.mime {
        CodecId::H264 => h264::is_configuration_payload(&frame.buffer),
        CodecId::Hevc => h265::is_configuration_payload(&frame.buffer),
        _ => false,
    }
}
