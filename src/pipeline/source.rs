use crate::config::{AudioConfig, VideoConfig};
use crate::error::{CastError, Result};
use bytes::{Bytes, BytesMut};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// A raw PCM buffer delivered by an audio source.
#[derive(Debug, Clone)]
pub struct RawAudioFrame {
    /// Sample bytes in the configured byte format
    pub data: Bytes,
    /// Monotonic capture timestamp in microseconds
    pub timestamp_us: i64,
}

/// A raw picture delivered through a [`Surface`].
#[derive(Debug, Clone)]
pub struct RawVideoFrame {
    /// Pixel bytes in the encoder's input layout
    pub data: Bytes,
    /// Monotonic capture timestamp in microseconds
    pub timestamp_us: i64,
}

/// The drawable target a video encoder exposes and a video source posts
/// frames into.
///
/// Modeled as a bounded channel handle: the encoder owns the receiving
/// half, the source keeps this posting half and delivers frames at its
/// configured rate.
#[derive(Clone)]
pub struct Surface {
    tx: mpsc::Sender<RawVideoFrame>,
}

impl Surface {
    /// Creates a surface and the receiving half the encoder consumes.
    pub fn channel(depth: usize) -> (Self, mpsc::Receiver<RawVideoFrame>) {
        let (tx, rx) = mpsc::channel(depth);
        (Self { tx }, rx)
    }

    /// Posts a frame, waiting for encoder capacity.
    pub async fn post_frame(&self, frame: RawVideoFrame) -> Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| CastError::StateViolation("surface consumer is gone".into()))
    }

    /// Posts a frame without waiting; a full surface drops the frame.
    pub fn try_post_frame(&self, frame: RawVideoFrame) {
        if let Err(mpsc::error::TrySendError::Full(_)) = self.tx.try_send(frame) {
            log::debug!("surface full, dropping video frame");
        }
    }
}

/// A pull-based source of raw audio buffers.
///
/// The pipeline's audio worker calls [`AudioSource::get_frame`] in a loop
/// while streaming; the source fills the provided buffer and tags it with
/// a monotonic timestamp.
#[async_trait]
pub trait AudioSource: Send {
    /// Applies the track configuration.
    fn configure(&mut self, config: &AudioConfig) -> Result<()>;

    /// Begins capture.
    async fn start_stream(&mut self) -> Result<()>;

    /// Ends capture; a later `start_stream` must work again.
    async fn stop_stream(&mut self) -> Result<()>;

    /// Fills `buffer` with captured samples and returns them as a frame.
    async fn get_frame(&mut self, buffer: BytesMut) -> Result<RawAudioFrame>;

    /// Releases capture resources for good.
    fn release(&mut self);
}

/// A push-based source of raw video frames.
///
/// After [`VideoSource::attach_surface`] and `start_stream`, the source
/// posts frames into the surface at its configured frame rate.
#[async_trait]
pub trait VideoSource: Send {
    /// Applies the track configuration.
    fn configure(&mut self, config: &VideoConfig) -> Result<()>;

    /// Hands the source the encoder's input surface.
    fn attach_surface(&mut self, surface: Surface);

    /// Begins posting frames.
    async fn start_stream(&mut self) -> Result<()>;

    /// Stops posting frames; a later `start_stream` must work again.
    async fn stop_stream(&mut self) -> Result<()>;

    /// Current rotation of the captured image in degrees.
    fn rotation(&self) -> u32;

    /// Current capture resolution.
    fn resolution(&self) -> (u32, u32);

    /// Releases capture resources for good.
    fn release(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_surface_delivers_in_order() {
        let (surface, mut rx) = Surface::channel(4);
        for i in 0..3i64 {
            surface
                .post_frame(RawVideoFrame {
                    data: Bytes::from(vec![i as u8]),
                    timestamp_us: i * 33_000,
                })
                .await
                .unwrap();
        }
        for i in 0..3i64 {
            let frame = rx.recv().await.unwrap();
            assert_eq!(frame.timestamp_us, i * 33_000);
        }
    }

    #[tokio::test]
    async fn test_surface_error_after_consumer_drop() {
        let (surface, rx) = Surface::channel(1);
        drop(rx);
        let err = surface
            .post_frame(RawVideoFrame {
                data: Bytes::new(),
                timestamp_us: 0,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CastError::StateViolation(_)));
    }
}
