//! Pipeline orchestrator tests: lawful state machine, restart safety,
//! error containment and the observable state cells.

mod common;

use castio::config::{AudioConfig, MediaDescriptor, VideoConfig};
use castio::error::CastError;
use castio::format::ts::TsPacketParser;
use castio::pipeline::{Pipeline, PipelineState};
use common::*;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

fn ts_descriptor() -> MediaDescriptor {
    MediaDescriptor::parse("file:///tmp/castio-memory-backed.ts").unwrap()
}

fn flv_descriptor() -> MediaDescriptor {
    MediaDescriptor::parse("file:///tmp/castio-memory-backed.flv").unwrap()
}

fn memory_pipeline() -> (Pipeline, MemorySinkHandle, Arc<EngineCounters>) {
    let counters = Arc::new(EngineCounters::default());
    let mut pipeline = Pipeline::new(
        Some(audio_engine_factory(counters.clone())),
        Some(video_engine_factory(counters.clone())),
    );
    let (factory, handle) = memory_sink_factory();
    pipeline.set_sink_factory(factory);
    (pipeline, handle, counters)
}

async fn audio_pipeline_open() -> (Pipeline, MemorySinkHandle, Arc<EngineCounters>) {
    let (mut pipeline, handle, counters) = memory_pipeline();
    pipeline.set_audio_config(AudioConfig::default()).unwrap();
    pipeline
        .set_audio_source(Box::new(MockAudioSource::new(1_000_000)))
        .await
        .unwrap();
    pipeline.open(&ts_descriptor()).await.unwrap();
    (pipeline, handle, counters)
}

#[tokio::test]
async fn test_audio_session_end_to_end() {
    let (mut pipeline, handle, _) = audio_pipeline_open().await;

    pipeline.start_stream().await.unwrap();
    assert!(pipeline.is_streaming().get());
    assert_eq!(pipeline.state(), PipelineState::Streaming);

    sleep(Duration::from_millis(150)).await;
    pipeline.stop_stream().await;
    assert!(!pipeline.is_streaming().get());
    assert_eq!(pipeline.state(), PipelineState::Open);

    let bytes = handle.data.lock().clone();
    assert!(!bytes.is_empty());
    assert_eq!(bytes.len() % 188, 0);

    let mut parser = TsPacketParser::new();
    parser.push(&bytes).unwrap();
    assert!(parser.pat_count() >= 1);
    assert_eq!(parser.programs().len(), 1);

    let frames = parser.finish();
    assert!(!frames.is_empty());
    // Rebasing: the session's first frame lands at timestamp zero even
    // though the source clock started at one second
    assert_eq!(frames[0].pts, Some(0));
    // And PTS stays monotonic
    let timestamps: Vec<u64> = frames.iter().filter_map(|f| f.pts).collect();
    assert!(timestamps.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn test_flv_session_end_to_end() {
    let (mut pipeline, handle, _) = memory_pipeline();
    pipeline
        .set_config(AudioConfig::default(), VideoConfig::default())
        .unwrap();
    pipeline
        .set_audio_source(Box::new(MockAudioSource::new(500_000)))
        .await
        .unwrap();
    pipeline
        .set_video_source(Box::new(MockVideoSource::new(500_000)))
        .await
        .unwrap();
    pipeline.open(&flv_descriptor()).await.unwrap();

    pipeline.start_stream().await.unwrap();
    sleep(Duration::from_millis(200)).await;
    pipeline.stop_stream().await;
    pipeline.release().await;

    let bytes = handle.data.lock().clone();
    let (header, tags) = parse_flv(&bytes);
    assert_eq!(&header[0..3], b"FLV");
    assert_eq!(header[4], 0x05); // audio + video

    assert_eq!(tags[0].tag_type, 18);
    let video_tags: Vec<_> = tags.iter().filter(|t| t.tag_type == 9).collect();
    assert!(video_tags.len() >= 2);
    // Sequence header first, then a key frame at timestamp zero
    assert_eq!(video_tags[0].body[1], 0);
    assert_eq!(video_tags[1].timestamp, 0);
    assert_eq!(video_tags[1].body[0] >> 4, 1);
}

#[tokio::test]
async fn test_restart_leaves_no_leaks() {
    let (mut pipeline, _handle, counters) = audio_pipeline_open().await;

    for i in 0..100 {
        pipeline.start_stream().await.unwrap();
        assert!(pipeline.is_streaming().get(), "iteration {}", i);
        if i % 20 == 0 {
            sleep(Duration::from_millis(5)).await;
        }
        pipeline.stop_stream().await;
        assert!(!pipeline.is_streaming().get(), "iteration {}", i);
        assert_eq!(pipeline.state(), PipelineState::Open);
    }
    pipeline.release().await;

    let created = counters.created.load(Ordering::SeqCst);
    let released = counters.released.load(Ordering::SeqCst);
    assert_eq!(created, 100);
    assert_eq!(created, released, "leaked encoder engines");
}

#[tokio::test]
async fn test_sink_failure_parks_pipeline() {
    let (mut pipeline, handle, _) = audio_pipeline_open().await;
    pipeline.start_stream().await.unwrap();

    // Let some healthy output through, then cut the connection
    sleep(Duration::from_millis(50)).await;
    assert!(!handle.data.lock().is_empty());
    handle.fail_writes.store(true, Ordering::SeqCst);

    let mut parked = false;
    for _ in 0..200 {
        if pipeline.state() == PipelineState::Configured {
            parked = true;
            break;
        }
        sleep(Duration::from_millis(5)).await;
    }
    assert!(parked, "pipeline did not leave Streaming after sink failure");
    assert!(!pipeline.is_open().get());
    assert!(!pipeline.is_streaming().get());
    assert!(matches!(
        pipeline.last_error().get(),
        Some(CastError::SinkWrite(_))
    ));

    // Restart after reconfigure: open a fresh destination and stream again
    handle.fail_writes.store(false, Ordering::SeqCst);
    pipeline.stop_stream().await;
    pipeline.open(&ts_descriptor()).await.unwrap();
    assert!(pipeline.last_error().get().is_none(), "error not cleared");
    pipeline.start_stream().await.unwrap();
    sleep(Duration::from_millis(30)).await;
    pipeline.stop_stream().await;
    pipeline.release().await;
}

#[tokio::test]
async fn test_start_failure_unwinds_and_publishes() {
    let (mut pipeline, _handle, _) = memory_pipeline();
    pipeline.set_audio_config(AudioConfig::default()).unwrap();
    // No audio source set: the session cannot start
    pipeline.open(&ts_descriptor()).await.unwrap();

    let err = pipeline.start_stream().await.unwrap_err();
    assert!(matches!(err, CastError::NotConfigured(_)));
    // Still open, not streaming, error published and sticky
    assert_eq!(pipeline.state(), PipelineState::Open);
    assert!(pipeline.is_open().get());
    assert!(!pipeline.is_streaming().get());
    assert!(matches!(
        pipeline.last_error().get(),
        Some(CastError::NotConfigured(_))
    ));

    // Fixing the configuration clears the error on the next success
    pipeline
        .set_audio_source(Box::new(MockAudioSource::new(0)))
        .await
        .unwrap();
    assert!(pipeline.last_error().get().is_some(), "error not sticky");
    pipeline.start_stream().await.unwrap();
    assert!(pipeline.last_error().get().is_none());
    pipeline.stop_stream().await;
    pipeline.release().await;
}

#[tokio::test]
async fn test_set_source_while_streaming_rejected() {
    let (mut pipeline, _handle, _) = audio_pipeline_open().await;
    pipeline.start_stream().await.unwrap();

    let err = pipeline
        .set_audio_source(Box::new(MockAudioSource::new(0)))
        .await
        .unwrap_err();
    assert!(matches!(err, CastError::StateViolation(_)));

    pipeline.stop_stream().await;
    pipeline.release().await;
}

#[tokio::test]
async fn test_bitrate_passthrough() {
    let (mut pipeline, _handle, counters) = audio_pipeline_open().await;
    pipeline.start_stream().await.unwrap();

    pipeline.set_audio_bitrate(96_000).await.unwrap();
    assert_eq!(counters.last_bitrate.load(Ordering::SeqCst), 96_000);

    pipeline.stop_stream().await;
    pipeline.release().await;
}

// Every operation, in every state, either performs its documented
// transition or reports StateViolation; nothing panics.
#[tokio::test]
async fn test_state_machine_lawfulness() {
    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Op {
        SetConfig,
        SetSource,
        Open,
        StartStream,
        StopStream,
        Close,
        Release,
    }
    let ops = [
        Op::SetConfig,
        Op::SetSource,
        Op::Open,
        Op::StartStream,
        Op::StopStream,
        Op::Close,
        Op::Release,
    ];
    let states = [
        PipelineState::Idle,
        PipelineState::Configured,
        PipelineState::Open,
        PipelineState::Streaming,
        PipelineState::Released,
    ];

    for state in states {
        for op in ops {
            let (mut pipeline, _handle, _) = memory_pipeline();

            // Drive the pipeline into the starting state
            if state != PipelineState::Idle {
                pipeline.set_audio_config(AudioConfig::default()).unwrap();
                pipeline
                    .set_audio_source(Box::new(MockAudioSource::new(0)))
                    .await
                    .unwrap();
            }
            if state == PipelineState::Open || state == PipelineState::Streaming {
                pipeline.open(&ts_descriptor()).await.unwrap();
            }
            if state == PipelineState::Streaming {
                pipeline.start_stream().await.unwrap();
            }
            if state == PipelineState::Released {
                pipeline.release().await;
            }
            assert_eq!(pipeline.state(), state);

            let result = match op {
                Op::SetConfig => pipeline.set_audio_config(AudioConfig::default()).map(|_| ()),
                Op::SetSource => pipeline
                    .set_audio_source(Box::new(MockAudioSource::new(0)))
                    .await
                    .map(|_| ()),
                Op::Open => pipeline.open(&ts_descriptor()).await.map(|_| ()),
                Op::StartStream => pipeline.start_stream().await.map(|_| ()),
                Op::StopStream => {
                    pipeline.stop_stream().await;
                    Ok(())
                }
                Op::Close => pipeline.close().await.map(|_| ()),
                Op::Release => {
                    pipeline.release().await;
                    Ok(())
                }
            };

            let expected_ok: bool = match (state, op) {
                (_, Op::StopStream) | (_, Op::Release) => true,
                (PipelineState::Idle | PipelineState::Configured, Op::SetConfig) => true,
                (
                    PipelineState::Idle | PipelineState::Configured | PipelineState::Open,
                    Op::SetSource,
                ) => true,
                (PipelineState::Configured, Op::Open) => true,
                (PipelineState::Open, Op::StartStream) => true,
                (PipelineState::Open, Op::Close) => true,
                _ => false,
            };

            match (expected_ok, &result) {
                (true, Ok(())) => {}
                (false, Err(CastError::StateViolation(_))) => {}
                other => panic!(
                    "state {:?}, op {:?}: unexpected result {:?}",
                    state, op, other.1
                ),
            }

            pipeline.release().await;
        }
    }
}
