//! Shared test doubles: deterministic encoder engines, capture sources and
//! an in-memory sink.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use castio::av::{CodecId, Frame, FrameFormat, Packet};
use castio::codec::aac::AudioSpecificConfig;
use castio::config::{AudioConfig, MediaDescriptor, VideoConfig};
use castio::error::{CastError, Result};
use castio::pipeline::{
    AudioEncoderEngine, AudioEngineFactory, AudioSource, RawAudioFrame, RawVideoFrame,
    SinkFactory, Surface, VideoEncoderEngine, VideoEngineFactory, VideoSource,
};
use castio::sink::Sink;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const SPS: [u8; 8] = [0x67, 0x64, 0x00, 0x1F, 0xAC, 0xD9, 0x40, 0x50];
pub const PPS: [u8; 4] = [0x68, 0xEB, 0xE3, 0xCB];

/// Counters shared between the engine factories and a test, verifying
/// that every engine a session creates is destroyed again.
#[derive(Default)]
pub struct EngineCounters {
    pub created: AtomicUsize,
    pub released: AtomicUsize,
    pub last_bitrate: AtomicU32,
}

pub struct MockAudioEngine {
    counters: Arc<EngineCounters>,
    output: Option<mpsc::UnboundedSender<Frame>>,
    config: Option<AudioConfig>,
    sent_config: bool,
}

#[async_trait]
impl AudioEncoderEngine for MockAudioEngine {
    fn configure(
        &mut self,
        config: &AudioConfig,
        output: mpsc::UnboundedSender<Frame>,
    ) -> Result<()> {
        self.config = Some(config.clone());
        self.output = Some(output);
        Ok(())
    }

    async fn encode(&mut self, raw: RawAudioFrame) -> Result<()> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| CastError::NotConfigured("audio engine not configured".into()))?;
        let output = self
            .output
            .as_ref()
            .ok_or_else(|| CastError::NotConfigured("audio engine not configured".into()))?;

        let mut frame =
            Frame::new(CodecId::Aac, raw.data, raw.timestamp_us).with_format(FrameFormat {
                sample_rate: Some(config.sample_rate),
                channel_count: Some(config.channel_count),
                ..FrameFormat::default()
            });
        if !self.sent_config {
            let asc = AudioSpecificConfig::new(
                config.aac_profile().audio_object_type(),
                config.sample_rate,
                config.channel_count,
            )?
            .to_bytes()?;
            frame = frame.with_extra(vec![Bytes::from(asc)]);
            self.sent_config = true;
        }
        output
            .send(frame)
            .map_err(|_| CastError::SinkWrite("encoder output closed".into()))
    }

    async fn stop_stream(&mut self) -> Result<()> {
        Ok(())
    }

    fn set_bitrate(&mut self, bitrate: u32) -> Result<()> {
        self.counters.last_bitrate.store(bitrate, Ordering::SeqCst);
        Ok(())
    }

    fn release(&mut self) {
        self.output = None;
        self.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct MockVideoEngine {
    counters: Arc<EngineCounters>,
    output: Option<mpsc::UnboundedSender<Frame>>,
    config: Option<VideoConfig>,
    surface_rx: Option<mpsc::Receiver<RawVideoFrame>>,
    worker: Option<JoinHandle<()>>,
}

#[async_trait]
impl VideoEncoderEngine for MockVideoEngine {
    fn configure(
        &mut self,
        config: &VideoConfig,
        output: mpsc::UnboundedSender<Frame>,
    ) -> Result<()> {
        self.config = Some(config.clone());
        self.output = Some(output);
        Ok(())
    }

    fn input_surface(&mut self) -> Result<Surface> {
        let (surface, rx) = Surface::channel(16);
        self.surface_rx = Some(rx);
        Ok(surface)
    }

    async fn start_stream(&mut self) -> Result<()> {
        let mut rx = self
            .surface_rx
            .take()
            .ok_or_else(|| CastError::NotConfigured("no input surface".into()))?;
        let output = self
            .output
            .clone()
            .ok_or_else(|| CastError::NotConfigured("video engine not configured".into()))?;

        let mut count = 0u64;
        self.worker = Some(tokio::spawn(async move {
            while let Some(raw) = rx.recv().await {
                // Every fifth frame is an IDR carrying its parameter sets
                let key = count % 5 == 0;
                count += 1;
                let mut frame = Frame::new(CodecId::H264, raw.data, raw.timestamp_us)
                    .with_key_flag(key);
                if key {
                    frame = frame
                        .with_extra(vec![Bytes::from_static(&SPS), Bytes::from_static(&PPS)]);
                }
                if output.send(frame).is_err() {
                    break;
                }
            }
        }));
        Ok(())
    }

    async fn stop_stream(&mut self) -> Result<()> {
        if let Some(worker) = self.worker.take() {
            worker.abort();
            let _ = worker.await;
        }
        Ok(())
    }

    fn set_bitrate(&mut self, bitrate: u32) -> Result<()> {
        self.counters.last_bitrate.store(bitrate, Ordering::SeqCst);
        Ok(())
    }

    fn release(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
        self.output = None;
        self.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn audio_engine_factory(counters: Arc<EngineCounters>) -> AudioEngineFactory {
    Box::new(move || {
        counters.created.fetch_add(1, Ordering::SeqCst);
        Box::new(MockAudioEngine {
            counters: counters.clone(),
            output: None,
            config: None,
            sent_config: false,
        })
    })
}

pub fn video_engine_factory(counters: Arc<EngineCounters>) -> VideoEngineFactory {
    Box::new(move || {
        counters.created.fetch_add(1, Ordering::SeqCst);
        Box::new(MockVideoEngine {
            counters: counters.clone(),
            output: None,
            config: None,
            surface_rx: None,
            worker: None,
        })
    })
}

/// Delivers a 256-byte PCM pattern every couple of milliseconds with
/// timestamps advancing by one AAC frame duration at 48 kHz.
pub struct MockAudioSource {
    next_ts: i64,
    running: bool,
}

impl MockAudioSource {
    pub fn new(start_ts_us: i64) -> Self {
        Self {
            next_ts: start_ts_us,
            running: false,
        }
    }
}

#[async_trait]
impl AudioSource for MockAudioSource {
    fn configure(&mut self, _config: &AudioConfig) -> Result<()> {
        Ok(())
    }

    async fn start_stream(&mut self) -> Result<()> {
        self.running = true;
        Ok(())
    }

    async fn stop_stream(&mut self) -> Result<()> {
        self.running = false;
        Ok(())
    }

    async fn get_frame(&mut self, mut buffer: BytesMut) -> Result<RawAudioFrame> {
        if !self.running {
            // The pump is parked by the stop signal before the source
            // stops; losing that race just parks the read until cancelled.
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
        buffer.resize(256, 0xA5);
        let ts = self.next_ts;
        self.next_ts += 21_333;
        Ok(RawAudioFrame {
            data: buffer.freeze(),
            timestamp_us: ts,
        })
    }

    fn release(&mut self) {
        self.running = false;
    }
}

/// Posts a 128-byte picture into the attached surface every few
/// milliseconds at ~30 fps timestamps.
pub struct MockVideoSource {
    surface: Option<Surface>,
    worker: Option<JoinHandle<()>>,
    start_ts: i64,
}

impl MockVideoSource {
    pub fn new(start_ts_us: i64) -> Self {
        Self {
            surface: None,
            worker: None,
            start_ts: start_ts_us,
        }
    }
}

#[async_trait]
impl VideoSource for MockVideoSource {
    fn configure(&mut self, _config: &VideoConfig) -> Result<()> {
        Ok(())
    }

    fn attach_surface(&mut self, surface: Surface) {
        self.surface = Some(surface);
    }

    async fn start_stream(&mut self) -> Result<()> {
        let surface = self
            .surface
            .clone()
            .ok_or_else(|| CastError::NotConfigured("no surface attached".into()))?;
        let mut ts = self.start_ts;
        self.worker = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(3)).await;
                let frame = RawVideoFrame {
                    data: Bytes::from(vec![0xC3u8; 128]),
                    timestamp_us: ts,
                };
                ts += 33_000;
                if surface.post_frame(frame).await.is_err() {
                    break;
                }
            }
        }));
        Ok(())
    }

    async fn stop_stream(&mut self) -> Result<()> {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
        Ok(())
    }

    fn rotation(&self) -> u32 {
        0
    }

    fn resolution(&self) -> (u32, u32) {
        (1280, 720)
    }

    fn release(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
        self.surface = None;
    }
}

/// Collects written packets in memory; failure is injectable.
pub struct MemorySink {
    data: Arc<Mutex<Vec<u8>>>,
    fail_writes: Arc<AtomicBool>,
    open: bool,
}

#[async_trait]
impl Sink for MemorySink {
    async fn open(&mut self, _descriptor: &MediaDescriptor) -> Result<()> {
        self.open = true;
        Ok(())
    }

    async fn write(&mut self, packet: &Packet) -> Result<()> {
        if !self.open {
            return Err(CastError::SinkWrite("memory sink is not open".into()));
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CastError::SinkWrite("simulated connection loss".into()));
        }
        self.data.lock().extend_from_slice(&packet.buffer);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.open = false;
        Ok(())
    }
}

/// Test-side handles into the sinks a [`memory_sink_factory`] produces.
pub struct MemorySinkHandle {
    pub data: Arc<Mutex<Vec<u8>>>,
    pub fail_writes: Arc<AtomicBool>,
}

pub fn memory_sink_factory() -> (SinkFactory, MemorySinkHandle) {
    let data = Arc::new(Mutex::new(Vec::new()));
    let fail_writes = Arc::new(AtomicBool::new(false));
    let handle = MemorySinkHandle {
        data: data.clone(),
        fail_writes: fail_writes.clone(),
    };
    let factory: SinkFactory = Box::new(move |_descriptor| {
        Ok(Box::new(MemorySink {
            data: data.clone(),
            fail_writes: fail_writes.clone(),
            open: false,
        }) as Box<dyn Sink>)
    });
    (factory, handle)
}

/// A parsed FLV tag.
pub struct FlvTag {
    pub tag_type: u8,
    pub timestamp: u32,
    pub body: Vec<u8>,
}

/// Walks an FLV byte stream into its header and tags.
pub fn parse_flv(bytes: &[u8]) -> (Vec<u8>, Vec<FlvTag>) {
    let header = bytes[..13].to_vec();
    let mut tags = Vec::new();
    let mut offset = 13;
    while offset + 11 <= bytes.len() {
        let tag_type = bytes[offset];
        let size = ((bytes[offset + 1] as usize) << 16)
            | ((bytes[offset + 2] as usize) << 8)
            | bytes[offset + 3] as usize;
        let timestamp = ((bytes[offset + 7] as u32) << 24)
            | ((bytes[offset + 4] as u32) << 16)
            | ((bytes[offset + 5] as u32) << 8)
            | bytes[offset + 6] as u32;
        let body = bytes[offset + 11..offset + 11 + size].to_vec();
        tags.push(FlvTag {
            tag_type,
            timestamp,
            body,
        });
        offset += 11 + size + 4;
    }
    (header, tags)
}
