#![doc(html_root_url = "https://docs.rs/castio/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

//! # castio - Live Streaming Pipeline Core
//!
//! `castio` is the streaming core of a live media broadcaster: it ingests
//! raw audio samples and raw video frames from capture sources, pushes
//! them through encoder engines, muxes the elementary streams into
//! MPEG-TS or FLV, and emits the container bytes to a file or network
//! sink.
//!
//! ```text
//!  AudioSource ──► AudioEncoder ──┐
//!                                 ├──► FrameRouter ──► Muxer ──► Sink
//!  VideoSource ──► VideoEncoder ──┘
//! ```
//!
//! ## Features
//!
//! ### Containers
//! - MPEG-TS muxing per ISO/IEC 13818-1, with multi-service PSI tables,
//!   PES framing, PCR insertion and table retransmission
//! - FLV muxing per Adobe FLV 10.1, including extended video tags for
//!   HEVC/AV1/VP9 and key-frame startup gating
//!
//! ### Codec payload handling
//! - H.264/HEVC access-unit delimiter insertion and parameter-set
//!   prefixing; AVC/HEVC decoder configuration records
//! - AAC framing as ADTS (LC) or LATM (HE profiles), with
//!   AudioSpecificConfig synthesis
//! - Opus MPEG-TS control headers
//!
//! ### Pipeline
//! - An orchestrator owning the source/encoder/muxer/sink lifecycles,
//!   with a lawful state machine, observable state cells, error
//!   containment and restart-without-leaks semantics
//!
//! ## Quick Start
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! castio = "0.1.0"
//! ```
//!
//! ### Muxing frames to MPEG-TS
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
//!
//! muxer.write(&Frame::new(CodecId::Aac, vec![0u8; 64], 0), pid)?;
//! while let Ok(packet) = rx.try_recv() {
//!     assert_eq!(packet.buffer.len() % 188, 0);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Driving the pipeline
//!
//! ```rust,no_run
//! use castio::config::{AudioConfig, MediaDescriptor};
//! use castio::pipeline::Pipeline;
//!
//! # async fn example(
//! #     audio_engines: castio::pipeline::AudioEngineFactory,
//! #     microphone: Box<dyn castio::pipeline::AudioSource>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let mut pipeline = Pipeline::new(Some(audio_engines), None);
//! pipeline.set_audio_config(AudioConfig::default())?;
//! pipeline.set_audio_source(microphone).await?;
//!
//! let destination = MediaDescriptor::parse("file:///tmp/live.ts")?;
//! pipeline.open(&destination).await?;
//! pipeline.start_stream().await?;
//! // ... streaming ...
//! pipeline.stop_stream().await;
//! pipeline.release().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - `av`: the frame and packet model flowing through the pipeline
//! - `codec`: per-codec payload wrapping (ADTS/LATM, AUD insertion,
//!   decoder configuration records, Opus control headers)
//! - `config`: typed track configurations, destination descriptors and
//!   their validators
//! - `format`: the MPEG-TS and FLV muxers
//! - `pipeline`: the orchestrator, frame router, and the source/encoder
//!   contracts
//! - `sink`: file and network packet sinks
//! - `error`: the error taxonomy
//! - `utils`: bit-level I/O, MPEG CRC32, Annex-B helpers, observables

/// Audio/Video frame and packet model
pub mod av;

/// Per-codec payload wrapping
pub mod codec;

/// Track configurations and destination descriptors
pub mod config;

/// Error types and utilities
pub mod error;

/// Container format implementations (TS, FLV)
pub mod format;

/// Pipeline orchestrator and component contracts
pub mod pipeline;

/// Packet sinks (file, network)
pub mod sink;

/// Common utilities and helper functions
pub mod utils;

pub use error::{CastError, Result};
