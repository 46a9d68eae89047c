//! # Pipeline Orchestrator
//!
//! The pipeline owns the lifecycle of every other component: sources feed
//! encoders, encoded frames flow through the [`FrameRouter`] into the
//! session's muxer, and the muxer's packets are written to the sink by a
//! dedicated worker.
//!
//! ```text
//!  AudioSource ──► AudioEncoder ──┐
//!                                 ├──► FrameRouter ──► Muxer ──► Sink
//!  VideoSource ──► VideoEncoder ──┘
//! ```
//!
//! ## Lifecycle
//!
//! `Idle → Configured → Open → Streaming → Open → Idle`, with `Released`
//! terminal. Operations outside their documented states fail with
//! `StateViolation`; `stop_stream` and `release` never fail and tear down
//! best-effort. Encoder engines are rebuilt from their factories on every
//! `start_stream`, so the platform video codec never has to survive a
//! stop/start cycle.
//!
//! ## Workers
//!
//! While streaming, the session runs one worker per concern: the audio
//! pump (source → encoder), the mux worker (router + muxer, serializing
//! container output) and the sink writer. Encoded frames from both tracks
//! share one channel, so the muxer sees them in arrival order. Errors from
//! any worker reach a monitor task that parks the pipeline in a safe state
//! and publishes the error through `last_error`.

use crate::av::{Frame, Packet};
use crate::config::{
    AudioConfig, ContainerType, MediaDescriptor, ServiceInfo, StreamConfig, VideoConfig,
};
use crate::error::{CastError, Result};
use crate::format::flv::FlvMuxer;
use crate::format::ts::TsMuxer;
use crate::sink::{self, Sink};
use crate::utils::Observable;
use bytes::BytesMut;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex as TokioMutex};
use tokio::task::JoinHandle;

/// Encoder contracts and the pipeline-side encoder wrappers
pub mod encoder;

/// Frame routing between encoders and the muxer
pub mod router;

/// Source contracts and the surface handle
pub mod source;

pub use encoder::{
    AudioEncoder, AudioEncoderEngine, AudioEngineFactory, VideoEncoder, VideoEncoderEngine,
    VideoEngineFactory,
};
pub use router::FrameRouter;
pub use source::{AudioSource, RawAudioFrame, RawVideoFrame, Surface, VideoSource};

/// Lifecycle states of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Nothing configured
    Idle,
    /// At least one track configured
    Configured,
    /// Destination open, not streaming
    Open,
    /// Actively streaming
    Streaming,
    /// Terminal state; all resources released
    Released,
}

/// An audio source shared between the pipeline and its workers.
pub type SharedAudioSource = Arc<TokioMutex<Box<dyn AudioSource>>>;
/// A video source shared between the pipeline and its workers.
pub type SharedVideoSource = Arc<TokioMutex<Box<dyn VideoSource>>>;
/// Resolves a sink for a descriptor; injectable for tests.
pub type SinkFactory = Box<dyn Fn(&MediaDescriptor) -> Result<Box<dyn Sink>> + Send + Sync>;
/// Callback invoked on session errors, in addition to `last_error`.
pub type ErrorListener = Box<dyn Fn(&CastError) + Send + Sync>;

type SharedSink = Arc<TokioMutex<Box<dyn Sink>>>;

// State shared with worker tasks.
struct Shared {
    state: Mutex<PipelineState>,
    is_open: Observable<bool>,
    is_streaming: Observable<bool>,
    last_error: Observable<Option<CastError>>,
    error_listener: Mutex<Option<ErrorListener>>,
}

impl Shared {
    fn publish_error(&self, err: &CastError) {
        self.last_error.set(Some(err.clone()));
        if let Some(listener) = &*self.error_listener.lock() {
            listener(err);
        }
    }
}

enum SessionMuxer {
    Ts(TsMuxer),
    Flv(FlvMuxer),
}

impl SessionMuxer {
    fn write(&mut self, frame: &Frame, pid: u16) -> Result<()> {
        match self {
            SessionMuxer::Ts(m) => m.write(frame, pid),
            SessionMuxer::Flv(m) => m.write(frame, pid),
        }
    }

    fn stop_stream(&mut self) {
        match self {
            SessionMuxer::Ts(m) => m.stop_stream(),
            SessionMuxer::Flv(m) => m.stop_stream(),
        }
    }
}

// Everything owned by one streaming run.
struct Session {
    stop: Arc<watch::Sender<bool>>,
    tasks: Vec<JoinHandle<()>>,
    audio_encoder: Option<Arc<TokioMutex<AudioEncoder>>>,
    video_encoder: Option<Arc<TokioMutex<VideoEncoder>>>,
}

/// The streaming pipeline orchestrator.
pub struct Pipeline {
    shared: Arc<Shared>,
    audio_engine_factory: Option<AudioEngineFactory>,
    video_engine_factory: Option<VideoEngineFactory>,
    sink_factory: SinkFactory,
    service_info: ServiceInfo,
    audio_config: Option<AudioConfig>,
    video_config: Option<VideoConfig>,
    audio_source: Observable<Option<SharedAudioSource>>,
    video_source: Observable<Option<SharedVideoSource>>,
    descriptor: Option<MediaDescriptor>,
    sink: Option<SharedSink>,
    session: Option<Session>,
}

impl Pipeline {
    /// Creates a pipeline with the given encoder engine factories.
    ///
    /// Engines are rebuilt from these factories for every streaming
    /// session. Sinks are resolved with [`sink::create_sink`] unless
    /// replaced via [`Pipeline::set_sink_factory`].
    pub fn new(
        audio_engine_factory: Option<AudioEngineFactory>,
        video_engine_factory: Option<VideoEngineFactory>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(PipelineState::Idle),
                is_open: Observable::new(false),
                is_streaming: Observable::new(false),
                last_error: Observable::new(None),
                error_listener: Mutex::new(None),
            }),
            audio_engine_factory,
            video_engine_factory,
            sink_factory: Box::new(|descriptor| sink::create_sink(descriptor)),
            service_info: ServiceInfo::default(),
            audio_config: None,
            video_config: None,
            audio_source: Observable::new(None),
            video_source: Observable::new(None),
            descriptor: None,
            sink: None,
            session: None,
        }
    }

    /// Replaces the sink resolution used by [`Pipeline::open`].
    pub fn set_sink_factory(&mut self, factory: SinkFactory) {
        self.sink_factory = factory;
    }

    /// Sets the service announced by MPEG-TS destinations.
    pub fn set_service_info(&mut self, info: ServiceInfo) {
        self.service_info = info;
    }

    /// Registers a callback for session errors.
    pub fn set_error_listener(&mut self, listener: ErrorListener) {
        *self.shared.error_listener.lock() = Some(listener);
    }

    /// The current lifecycle state.
    pub fn state(&self) -> PipelineState {
        *self.shared.state.lock()
    }

    /// Observable: a destination is open.
    pub fn is_open(&self) -> &Observable<bool> {
        &self.shared.is_open
    }

    /// Observable: a streaming session is running.
    pub fn is_streaming(&self) -> &Observable<bool> {
        &self.shared.is_streaming
    }

    /// Observable: the last session or start error.
    ///
    /// Sticky until the next successful `open` or `start_stream`.
    pub fn last_error(&self) -> &Observable<Option<CastError>> {
        &self.shared.last_error
    }

    /// Observable: the current audio source.
    pub fn audio_source(&self) -> &Observable<Option<SharedAudioSource>> {
        &self.audio_source
    }

    /// Observable: the current video source.
    pub fn video_source(&self) -> &Observable<Option<SharedVideoSource>> {
        &self.video_source
    }

    /// Sets the audio track configuration.
    pub fn set_audio_config(&mut self, config: AudioConfig) -> Result<()> {
        config.validate()?;
        self.guard_state(
            &[PipelineState::Idle, PipelineState::Configured],
            "set_audio_config",
        )?;
        self.audio_config = Some(config);
        *self.shared.state.lock() = PipelineState::Configured;
        Ok(())
    }

    /// Sets the video track configuration.
    pub fn set_video_config(&mut self, config: VideoConfig) -> Result<()> {
        config.validate()?;
        self.guard_state(
            &[PipelineState::Idle, PipelineState::Configured],
            "set_video_config",
        )?;
        self.video_config = Some(config);
        *self.shared.state.lock() = PipelineState::Configured;
        Ok(())
    }

    /// Sets both track configurations atomically.
    pub fn set_config(&mut self, audio: AudioConfig, video: VideoConfig) -> Result<()> {
        audio.validate()?;
        video.validate()?;
        self.guard_state(
            &[PipelineState::Idle, PipelineState::Configured],
            "set_config",
        )?;
        self.audio_config = Some(audio);
        self.video_config = Some(video);
        *self.shared.state.lock() = PipelineState::Configured;
        Ok(())
    }

    /// Replaces the audio source, releasing the previous one.
    ///
    /// Not permitted while streaming.
    pub async fn set_audio_source(&mut self, source: Box<dyn AudioSource>) -> Result<()> {
        self.guard_state(
            &[
                PipelineState::Idle,
                PipelineState::Configured,
                PipelineState::Open,
            ],
            "set_audio_source",
        )?;
        if let Some(previous) = self.audio_source.get() {
            previous.lock().await.release();
        }
        self.audio_source
            .set(Some(Arc::new(TokioMutex::new(source))));
        Ok(())
    }

    /// Replaces the video source, releasing the previous one.
    ///
    /// Not permitted while streaming.
    pub async fn set_video_source(&mut self, source: Box<dyn VideoSource>) -> Result<()> {
        self.guard_state(
            &[
                PipelineState::Idle,
                PipelineState::Configured,
                PipelineState::Open,
            ],
            "set_video_source",
        )?;
        if let Some(previous) = self.video_source.get() {
            previous.lock().await.release();
        }
        self.video_source
            .set(Some(Arc::new(TokioMutex::new(source))));
        Ok(())
    }

    /// Opens the destination described by `descriptor`.
    pub async fn open(&mut self, descriptor: &MediaDescriptor) -> Result<()> {
        self.guard_state(&[PipelineState::Configured], "open")?;
        self.teardown_session().await;

        let mut new_sink = (self.sink_factory)(descriptor)?;
        new_sink.open(descriptor).await?;

        self.descriptor = Some(descriptor.clone());
        self.sink = Some(Arc::new(TokioMutex::new(new_sink)));
        *self.shared.state.lock() = PipelineState::Open;
        self.shared.is_open.set(true);
        self.shared.last_error.set(None);
        Ok(())
    }

    /// Closes the destination.
    pub async fn close(&mut self) -> Result<()> {
        self.guard_state(&[PipelineState::Open], "close")?;
        if let Some(sink) = self.sink.take() {
            if let Err(e) = sink.lock().await.close().await {
                log::warn!("sink close failed: {}", e);
            }
        }
        self.descriptor = None;
        *self.shared.state.lock() = PipelineState::Configured;
        self.shared.is_open.set(false);
        Ok(())
    }

    /// Starts a streaming session.
    ///
    /// On failure everything that was started is torn down again, the
    /// pipeline stays `Open`, and the error is both published through
    /// `last_error` and returned.
    pub async fn start_stream(&mut self) -> Result<()> {
        self.guard_state(&[PipelineState::Open], "start_stream")?;
        if self.audio_config.is_none() && self.video_config.is_none() {
            return Err(CastError::NotConfigured(
                "no audio or video track configured".into(),
            ));
        }
        self.teardown_session().await;

        match self.start_session().await {
            Ok(session) => {
                self.session = Some(session);
                *self.shared.state.lock() = PipelineState::Streaming;
                self.shared.is_streaming.set(true);
                self.shared.last_error.set(None);
                Ok(())
            }
            Err(e) => {
                self.shared.publish_error(&e);
                Err(e)
            }
        }
    }

    /// Stops the streaming session; never fails.
    ///
    /// Pending encoder output is drained into the sink, which stays open
    /// for a later restart. Encoders are destroyed here and rebuilt on the
    /// next `start_stream`.
    pub async fn stop_stream(&mut self) {
        self.teardown_session().await;
        {
            let mut state = self.shared.state.lock();
            if *state == PipelineState::Streaming {
                *state = PipelineState::Open;
            }
        }
        self.shared.is_streaming.set(false);
    }

    /// Releases every resource; the pipeline ends in `Released`.
    pub async fn release(&mut self) {
        self.teardown_session().await;
        if let Some(sink) = self.sink.take() {
            if let Err(e) = sink.lock().await.close().await {
                log::warn!("sink close failed during release: {}", e);
            }
        }
        if let Some(source) = self.audio_source.get() {
            source.lock().await.release();
        }
        if let Some(source) = self.video_source.get() {
            source.lock().await.release();
        }
        self.audio_source.set(None);
        self.video_source.set(None);
        self.descriptor = None;
        *self.shared.state.lock() = PipelineState::Released;
        self.shared.is_open.set(false);
        self.shared.is_streaming.set(false);
    }

    /// Runtime video bitrate update; forwarded to the live encoder.
    pub async fn set_video_bitrate(&mut self, bitrate: u32) -> Result<()> {
        if let Some(config) = &mut self.video_config {
            config.start_bitrate = bitrate;
        }
        if let Some(encoder) = self.session.as_ref().and_then(|s| s.video_encoder.clone()) {
            encoder.lock().await.set_bitrate(bitrate)?;
        }
        Ok(())
    }

    /// Runtime audio bitrate update; forwarded to the live encoder.
    pub async fn set_audio_bitrate(&mut self, bitrate: u32) -> Result<()> {
        if let Some(config) = &mut self.audio_config {
            config.start_bitrate = bitrate;
        }
        if let Some(encoder) = self.session.as_ref().and_then(|s| s.audio_encoder.clone()) {
            encoder.lock().await.set_bitrate(bitrate)?;
        }
        Ok(())
    }

    fn guard_state(&self, allowed: &[PipelineState], op: &str) -> Result<()> {
        let state = *self.shared.state.lock();
        if allowed.contains(&state) {
            Ok(())
        } else {
            Err(CastError::StateViolation(format!(
                "{} is not allowed in {:?}",
                op, state
            )))
        }
    }

    // Builds the muxer, encoders and workers of one streaming run.
    async fn start_session(&mut self) -> Result<Session> {
        let descriptor = self
            .descriptor
            .clone()
            .ok_or_else(|| CastError::NotConfigured("no destination open".into()))?;
        let session_sink = self
            .sink
            .clone()
            .ok_or_else(|| CastError::NotConfigured("no sink open".into()))?;

        let mut track_configs = Vec::new();
        if let Some(video) = &self.video_config {
            track_configs.push(StreamConfig::Video(video.clone()));
        }
        if let Some(audio) = &self.audio_config {
            track_configs.push(StreamConfig::Audio(audio.clone()));
        }

        let (frame_tx, frame_rx) = mpsc::unbounded_channel::<Frame>();
        let (packet_tx, packet_rx) = mpsc::unbounded_channel::<Packet>();
        let (error_tx, error_rx) = mpsc::unbounded_channel::<CastError>();
        let stop = Arc::new(watch::channel(false).0);

        let (muxer, router) = match descriptor.container.mux_format() {
            ContainerType::MpegTs => {
                let mut muxer = TsMuxer::new(packet_tx.clone());
                muxer.add_service(self.service_info.clone())?;
                let pids = muxer.add_streams(&self.service_info, &track_configs)?;
                let mut router = FrameRouter::new();
                for (config, pid) in track_configs.iter().zip(&pids) {
                    router.register(config.mime(), *pid);
                }
                muxer.start_stream();
                (SessionMuxer::Ts(muxer), router)
            }
            ContainerType::Flv => {
                let mut muxer = FlvMuxer::new(packet_tx.clone());
                let mut router = FrameRouter::with_video_key_gate(true);
                for config in &track_configs {
                    let pid = muxer.add_stream(config.clone())?;
                    router.register(config.mime(), pid);
                }
                muxer.start_stream();
                (SessionMuxer::Flv(muxer), router)
            }
            other => {
                return Err(CastError::Unsupported(format!(
                    "no muxer for {:?} destinations",
                    other
                )))
            }
        };
        drop(packet_tx);

        let audio_encoder = match self.setup_audio_track(&frame_tx).await {
            Ok(encoder) => encoder,
            Err(e) => return Err(e),
        };
        let video_encoder = match self.setup_video_track(&frame_tx).await {
            Ok(encoder) => encoder,
            Err(e) => {
                // The audio side may already be running
                if let Some(encoder) = &audio_encoder {
                    encoder.lock().await.release();
                    if let Some(source) = self.audio_source.get() {
                        if let Err(stop_err) = source.lock().await.stop_stream().await {
                            log::warn!("audio source stop during unwind failed: {}", stop_err);
                        }
                    }
                }
                return Err(e);
            }
        };
        drop(frame_tx);

        let mut tasks = Vec::new();

        // Audio pump: source → encoder
        if let (Some(encoder), Some(source)) = (&audio_encoder, self.audio_source.get()) {
            let encoder = encoder.clone();
            let error_tx = error_tx.clone();
            let mut stop_rx = stop.subscribe();
            tasks.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = stop_rx.changed() => break,
                        result = pump_audio_once(&source, &encoder) => {
                            if let Err(e) = result {
                                let _ = error_tx.send(e);
                                break;
                            }
                        }
                    }
                }
            }));
        }

        // Mux worker: router + muxer; ends when every encoder output
        // channel is gone, draining whatever is still buffered.
        {
            let error_tx = error_tx.clone();
            let mut frame_rx = frame_rx;
            let mut muxer = muxer;
            let mut router = router;
            tasks.push(tokio::spawn(async move {
                while let Some(frame) = frame_rx.recv().await {
                    let routed = match router.route(frame) {
                        Ok(routed) => routed,
                        Err(e) => {
                            let _ = error_tx.send(e);
                            break;
                        }
                    };
                    if let Some((frame, pid)) = routed {
                        if let Err(e) = muxer.write(&frame, pid) {
                            let _ = error_tx.send(e);
                            break;
                        }
                    }
                }
                muxer.stop_stream();
            }));
        }

        // Sink writer: serializes container output; a stop interrupts a
        // blocked write.
        {
            let writer_sink = session_sink.clone();
            let error_tx = error_tx.clone();
            let mut stop_rx = stop.subscribe();
            let mut packet_rx = packet_rx;
            tasks.push(tokio::spawn(async move {
                while let Some(packet) = packet_rx.recv().await {
                    let mut guard = writer_sink.lock().await;
                    // Completed writes win over the stop signal, so a stop
                    // drains buffered output; only a genuinely blocked
                    // write is abandoned.
                    tokio::select! {
                        biased;
                        result = guard.write(&packet) => {
                            if let Err(e) = result {
                                let _ = error_tx.send(e);
                                break;
                            }
                        }
                        _ = stop_rx.changed() => break,
                    }
                }
            }));
        }

        // Monitor: first worker error parks the pipeline in a safe state.
        {
            let shared = self.shared.clone();
            let monitor_sink = session_sink.clone();
            let monitor_stop = stop.clone();
            let audio_source = self.audio_source.get();
            let video_source = self.video_source.get();
            let mut error_rx = error_rx;
            tasks.push(tokio::spawn(async move {
                let Some(err) = error_rx.recv().await else {
                    return;
                };
                log::error!("streaming session failed: {}", err);
                let _ = monitor_stop.send(true);
                if let Some(source) = &audio_source {
                    if let Err(e) = source.lock().await.stop_stream().await {
                        log::warn!("audio source stop after error failed: {}", e);
                    }
                }
                if let Some(source) = &video_source {
                    if let Err(e) = source.lock().await.stop_stream().await {
                        log::warn!("video source stop after error failed: {}", e);
                    }
                }
                // A dead mid-stream sink cannot stay open
                if let Err(e) = monitor_sink.lock().await.close().await {
                    log::warn!("sink close after error failed: {}", e);
                }
                {
                    let mut state = shared.state.lock();
                    if *state == PipelineState::Streaming {
                        *state = PipelineState::Configured;
                    }
                }
                shared.is_streaming.set(false);
                shared.is_open.set(false);
                shared.publish_error(&err);
            }));
        }
        drop(error_tx);

        Ok(Session {
            stop,
            tasks,
            audio_encoder,
            video_encoder,
        })
    }

    async fn setup_audio_track(
        &self,
        frame_tx: &mpsc::UnboundedSender<Frame>,
    ) -> Result<Option<Arc<TokioMutex<AudioEncoder>>>> {
        let Some(config) = &self.audio_config else {
            return Ok(None);
        };
        let factory = self.audio_engine_factory.as_ref().ok_or_else(|| {
            CastError::NotConfigured("audio is configured but no encoder factory is set".into())
        })?;
        let source = self
            .audio_source
            .get()
            .ok_or_else(|| CastError::NotConfigured("audio is configured but no source is set".into()))?;

        let mut encoder = AudioEncoder::new(factory());
        if let Err(e) = encoder.configure(config, frame_tx.clone()) {
            encoder.release();
            return Err(e);
        }
        {
            let mut guard = source.lock().await;
            if let Err(e) = guard.configure(config) {
                encoder.release();
                return Err(e);
            }
            if let Err(e) = guard.start_stream().await {
                encoder.release();
                return Err(e);
            }
        }
        Ok(Some(Arc::new(TokioMutex::new(encoder))))
    }

    async fn setup_video_track(
        &self,
        frame_tx: &mpsc::UnboundedSender<Frame>,
    ) -> Result<Option<Arc<TokioMutex<VideoEncoder>>>> {
        let Some(config) = &self.video_config else {
            return Ok(None);
        };
        let factory = self.video_engine_factory.as_ref().ok_or_else(|| {
            CastError::NotConfigured("video is configured but no encoder factory is set".into())
        })?;
        let source = self
            .video_source
            .get()
            .ok_or_else(|| CastError::NotConfigured("video is configured but no source is set".into()))?;

        let mut encoder = VideoEncoder::new(factory());
        if let Err(e) = encoder.configure(config, frame_tx.clone()) {
            encoder.release();
            return Err(e);
        }
        let surface = match encoder.input_surface() {
            Ok(surface) => surface,
            Err(e) => {
                encoder.release();
                return Err(e);
            }
        };
        {
            let mut guard = source.lock().await;
            if let Err(e) = guard.configure(config) {
                encoder.release();
                return Err(e);
            }
            guard.attach_surface(surface);
            if let Err(e) = guard.start_stream().await {
                encoder.release();
                return Err(e);
            }
        }
        if let Err(e) = encoder.start_stream().await {
            let mut guard = source.lock().await;
            if let Err(stop_err) = guard.stop_stream().await {
                log::warn!("video source stop during unwind failed: {}", stop_err);
            }
            encoder.release();
            return Err(e);
        }
        Ok(Some(Arc::new(TokioMutex::new(encoder))))
    }

    // Best-effort teardown of the current session, if any. Failures never
    // propagate; they are collected and the first one is surfaced through
    // `last_error`.
    async fn teardown_session(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let mut failures: Vec<CastError> = Vec::new();

        // Park the pump first so nothing reads from a stopping source
        let _ = session.stop.send(true);

        if let Some(source) = self.audio_source.get() {
            if let Err(e) = source.lock().await.stop_stream().await {
                failures.push(e);
            }
        }
        if let Some(source) = self.video_source.get() {
            if let Err(e) = source.lock().await.stop_stream().await {
                failures.push(e);
            }
        }

        // Flush and destroy the encoders; releasing drops their output
        // channels, which lets the mux and writer workers drain and end.
        if let Some(encoder) = &session.audio_encoder {
            let mut guard = encoder.lock().await;
            if let Err(e) = guard.stop_stream().await {
                failures.push(e);
            }
            guard.release();
        }
        if let Some(encoder) = &session.video_encoder {
            let mut guard = encoder.lock().await;
            if let Err(e) = guard.stop_stream().await {
                failures.push(e);
            }
            guard.release();
        }

        for result in futures::future::join_all(session.tasks).await {
            if let Err(e) = result {
                log::warn!("session worker ended abnormally: {}", e);
            }
        }

        if !failures.is_empty() {
            for failure in &failures {
                log::warn!("teardown failure: {}", failure);
            }
            self.shared.publish_error(&failures[0]);
        }
    }
}

async fn pump_audio_once(
    source: &SharedAudioSource,
    encoder: &Arc<TokioMutex<AudioEncoder>>,
) -> Result<()> {
    let frame = {
        let mut guard = source.lock().await;
        guard.get_frame(BytesMut::with_capacity(8192)).await?
    };
    encoder.lock().await.encode(frame).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_config_transitions() {
        let mut pipeline = Pipeline::new(None, None);
        assert_eq!(pipeline.state(), PipelineState::Idle);

        pipeline.set_audio_config(AudioConfig::default()).unwrap();
        assert_eq!(pipeline.state(), PipelineState::Configured);

        // Reconfiguring an already-configured pipeline stays in Configured
        pipeline.set_video_config(VideoConfig::default()).unwrap();
        assert_eq!(pipeline.state(), PipelineState::Configured);
    }

    #[tokio::test]
    async fn test_invalid_config_does_not_advance_state() {
        let mut pipeline = Pipeline::new(None, None);
        let bad = AudioConfig {
            channel_count: 6,
            ..AudioConfig::default()
        };
        assert!(matches!(
            pipeline.set_audio_config(bad),
            Err(CastError::InvalidConfig(_))
        ));
        assert_eq!(pipeline.state(), PipelineState::Idle);
    }

    #[tokio::test]
    async fn test_open_requires_configured() {
        let mut pipeline = Pipeline::new(None, None);
        let descriptor = MediaDescriptor::parse("file:///tmp/never-created.ts").unwrap();
        let err = pipeline.open(&descriptor).await.unwrap_err();
        assert!(matches!(err, CastError::StateViolation(_)));
        assert!(!pipeline.is_open().get());
    }

    #[tokio::test]
    async fn test_start_requires_open() {
        let mut pipeline = Pipeline::new(None, None);
        pipeline.set_audio_config(AudioConfig::default()).unwrap();
        let err = pipeline.start_stream().await.unwrap_err();
        assert!(matches!(err, CastError::StateViolation(_)));
    }

    #[tokio::test]
    async fn test_release_is_terminal() {
        let mut pipeline = Pipeline::new(None, None);
        pipeline.release().await;
        assert_eq!(pipeline.state(), PipelineState::Released);
        assert!(matches!(
            pipeline.set_audio_config(AudioConfig::default()),
            Err(CastError::StateViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_stop_stream_never_fails_outside_streaming() {
        let mut pipeline = Pipeline::new(None, None);
        pipeline.stop_stream().await;
        assert_eq!(pipeline.state(), PipelineState::Idle);
        assert!(!pipeline.is_streaming().get());
    }
}
