use super::source::{RawAudioFrame, Surface};
use crate::av::Frame;
use crate::config::{AudioConfig, VideoConfig};
use crate::error::{CastError, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Contract of a platform audio codec engine.
///
/// An engine consumes raw PCM buffers and emits tagged [`Frame`]s through
/// the output channel handed to `configure`. The first frame of a sequence
/// must carry the AudioSpecificConfig as extra data.
#[async_trait]
pub trait AudioEncoderEngine: Send {
    /// Parameterizes the engine. May fail with `Unsupported` when the
    /// profile is not available.
    fn configure(
        &mut self,
        config: &AudioConfig,
        output: mpsc::UnboundedSender<Frame>,
    ) -> Result<()>;

    /// Encodes one raw buffer; emitted frames must have monotonic PTS.
    async fn encode(&mut self, frame: RawAudioFrame) -> Result<()>;

    /// Flushes pending output; the engine must accept a later restart.
    async fn stop_stream(&mut self) -> Result<()>;

    /// Runtime bitrate update; must not block.
    fn set_bitrate(&mut self, bitrate: u32) -> Result<()>;

    /// Destroys the engine and drops its output channel.
    fn release(&mut self);
}

/// Contract of a platform video codec engine.
///
/// The engine consumes pictures through its input [`Surface`] and emits
/// tagged [`Frame`]s. Key frames must carry their parameter sets as extra
/// data.
#[async_trait]
pub trait VideoEncoderEngine: Send {
    /// Parameterizes the engine. May fail with `Unsupported` when the
    /// profile/level pair is not available.
    fn configure(
        &mut self,
        config: &VideoConfig,
        output: mpsc::UnboundedSender<Frame>,
    ) -> Result<()>;

    /// The surface the video source should post frames into.
    fn input_surface(&mut self) -> Result<Surface>;

    /// Begins consuming the surface.
    async fn start_stream(&mut self) -> Result<()>;

    /// Stops consuming and flushes; the engine must accept a later restart.
    async fn stop_stream(&mut self) -> Result<()>;

    /// Runtime bitrate update; must not block.
    fn set_bitrate(&mut self, bitrate: u32) -> Result<()>;

    /// Destroys the engine and drops its output channel.
    fn release(&mut self);
}

/// Factory for audio engines; the pipeline rebuilds engines across
/// streaming sessions.
pub type AudioEngineFactory = Box<dyn Fn() -> Box<dyn AudioEncoderEngine> + Send + Sync>;

/// Factory for video engines.
pub type VideoEngineFactory = Box<dyn Fn() -> Box<dyn VideoEncoderEngine> + Send + Sync>;

/// The pipeline-side audio encoder: an engine plus the configure-retry
/// policy.
pub struct AudioEncoder {
    engine: Box<dyn AudioEncoderEngine>,
}

impl AudioEncoder {
    /// Wraps an engine built by the session's factory.
    pub fn new(engine: Box<dyn AudioEncoderEngine>) -> Self {
        Self { engine }
    }

    /// Configures the engine; when the constrained profile is rejected,
    /// retries once without it.
    pub fn configure(
        &mut self,
        config: &AudioConfig,
        output: mpsc::UnboundedSender<Frame>,
    ) -> Result<()> {
        match self.engine.configure(config, output.clone()) {
            Err(CastError::Unsupported(reason)) if config.profile.is_some() => {
                log::warn!("audio profile rejected ({}), retrying unconstrained", reason);
                let relaxed = AudioConfig {
                    profile: None,
                    ..config.clone()
                };
                self.engine.configure(&relaxed, output)
            }
            other => other,
        }
    }

    /// Feeds one raw buffer through the engine.
    pub async fn encode(&mut self, frame: RawAudioFrame) -> Result<()> {
        self.engine.encode(frame).await
    }

    /// Flushes the engine.
    pub async fn stop_stream(&mut self) -> Result<()> {
        self.engine.stop_stream().await
    }

    /// Runtime bitrate update.
    pub fn set_bitrate(&mut self, bitrate: u32) -> Result<()> {
        self.engine.set_bitrate(bitrate)
    }

    /// Destroys the engine.
    pub fn release(&mut self) {
        self.engine.release();
    }
}

/// The pipeline-side video encoder: an engine plus the configure-retry
/// policy.
pub struct VideoEncoder {
    engine: Box<dyn VideoEncoderEngine>,
}

impl VideoEncoder {
    /// Wraps an engine built by the session's factory.
    pub fn new(engine: Box<dyn VideoEncoderEngine>) -> Self {
        Self { engine }
    }

    /// Configures the engine; when the constrained profile/level pair is
    /// rejected, retries once without them.
    pub fn configure(
        &mut self,
        config: &VideoConfig,
        output: mpsc::UnboundedSender<Frame>,
    ) -> Result<()> {
        match self.engine.configure(config, output.clone()) {
            Err(CastError::Unsupported(reason))
                if config.profile.is_some() || config.level.is_some() =>
            {
                log::warn!(
                    "video profile/level rejected ({}), retrying unconstrained",
                    reason
                );
                self.engine.configure(&config.without_profile_level(), output)
            }
            other => other,
        }
    }

    /// The surface to hand to the video source.
    pub fn input_surface(&mut self) -> Result<Surface> {
        self.engine.input_surface()
    }

    /// Begins consuming the surface.
    pub async fn start_stream(&mut self) -> Result<()> {
        self.engine.start_stream().await
    }

    /// Stops consuming and flushes.
    pub async fn stop_stream(&mut self) -> Result<()> {
        self.engine.stop_stream().await
    }

    /// Runtime bitrate update.
    pub fn set_bitrate(&mut self, bitrate: u32) -> Result<()> {
        self.engine.set_bitrate(bitrate)
    }

    /// Destroys the engine.
    pub fn release(&mut self) {
        self.engine.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AacProfile;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct PickyAudioEngine {
        configures: Arc<Mutex<Vec<Option<AacProfile>>>>,
    }

    #[async_trait]
    impl AudioEncoderEngine for PickyAudioEngine {
        fn configure(
            &mut self,
            config: &AudioConfig,
            _output: mpsc::UnboundedSender<Frame>,
        ) -> Result<()> {
            self.configures.lock().push(config.profile);
            if config.profile.is_some() {
                return Err(CastError::Unsupported("profile not available".into()));
            }
            Ok(())
        }

        async fn encode(&mut self, _frame: RawAudioFrame) -> Result<()> {
            Ok(())
        }

        async fn stop_stream(&mut self) -> Result<()> {
            Ok(())
        }

        fn set_bitrate(&mut self, _bitrate: u32) -> Result<()> {
            Ok(())
        }

        fn release(&mut self) {}
    }

    #[tokio::test]
    async fn test_configure_retries_without_profile() {
        let configures = Arc::new(Mutex::new(Vec::new()));
        let mut encoder = AudioEncoder::new(Box::new(PickyAudioEngine {
            configures: configures.clone(),
        }));

        let (tx, _rx) = mpsc::unbounded_channel();
        encoder.configure(&AudioConfig::default(), tx).unwrap();

        let seen = configures.lock().clone();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].is_some());
        assert!(seen[1].is_none());
    }
}
