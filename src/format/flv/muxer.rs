use super::amf::{self, Amf0Value};
use super::tags::*;
use crate::av::{CodecId, Frame, Packet, PacketKind};
use crate::codec::aac::AudioSpecificConfig;
use crate::codec::{h264, h265};
use crate::config::{AudioConfig, StreamConfig, VideoConfig};
use crate::error::{CastError, Result};
use bytes::{BufMut, Bytes, BytesMut};
use tokio::sync::mpsc;

struct FlvStream {
    config: StreamConfig,
    send_header: bool,
}

/// FLV muxer for a single audio and/or single video track.
///
/// Output begins with the 13-byte file header and an `onMetaData` script
/// tag, then one tag per frame (preceded by a sequence-header tag the first
/// time each track appears). When a video track is registered, everything
/// before the first video key frame is dropped and that frame's timestamp
/// becomes the zero point; audio-only sessions start on the first frame.
pub struct FlvMuxer {
    output: mpsc::UnboundedSender<Packet>,
    streams: Vec<FlvStream>,
    running: bool,
    start_up_time: Option<i64>,
}

impl FlvMuxer {
    /// Creates a muxer emitting tags through `output`.
    pub fn new(output: mpsc::UnboundedSender<Packet>) -> Self {
        Self {
            output,
            streams: Vec::new(),
            running: false,
            start_up_time: None,
        }
    }

    /// Registers a track and returns its ordinal stream id.
    pub fn add_stream(&mut self, config: StreamConfig) -> Result<u16> {
        match &config {
            StreamConfig::Video(_) => {
                if self
                    .streams
                    .iter()
                    .any(|s| matches!(s.config, StreamConfig::Video(_)))
                {
                    return Err(CastError::Unsupported(
                        "FLV accepts a single video stream".into(),
                    ));
                }
            }
            StreamConfig::Audio(audio) => {
                if audio.mime != CodecId::Aac {
                    return Err(CastError::Unsupported(format!(
                        "{} cannot be carried in FLV",
                        audio.mime
                    )));
                }
                if self
                    .streams
                    .iter()
                    .any(|s| matches!(s.config, StreamConfig::Audio(_)))
                {
                    return Err(CastError::Unsupported(
                        "FLV accepts a single audio stream".into(),
                    ));
                }
            }
        }
        self.streams.push(FlvStream {
            config,
            send_header: true,
        });
        Ok((self.streams.len() - 1) as u16)
    }

    /// Starts the muxer.
    pub fn start_stream(&mut self) {
        self.running = true;
    }

    /// Stops the muxer and clears all tracks and startup state.
    pub fn stop_stream(&mut self) {
        self.running = false;
        self.streams.clear();
        self.start_up_time = None;
    }

    /// Releases the muxer.
    pub fn release(&mut self) {
        self.stop_stream();
    }

    /// Transforms one encoded frame into FLV tags.
    ///
    /// Returns `Ok(())` for frames dropped by the startup gate.
    pub fn write(&mut self, frame: &Frame, pid: u16) -> Result<()> {
        if !self.running {
            return Err(CastError::StateViolation("muxer is not started".into()));
        }
        frame.validate()?;
        let index = pid as usize;
        if index >= self.streams.len() {
            return Err(CastError::UnknownStream(format!(
                "no FLV stream with id {}",
                pid
            )));
        }

        let start = match self.start_up_time {
            Some(start) => start,
            None => {
                let has_video = self
                    .streams
                    .iter()
                    .any(|s| matches!(s.config, StreamConfig::Video(_)));
                let starts = if has_video {
                    frame.mime.is_video() && frame.is_key_frame
                } else {
                    frame.mime.is_audio()
                };
                if !starts {
                    return Ok(());
                }
                frame.pts
            }
        };

        // Translate the whole frame before mutating anything; a frame that
        // fails here leaves the muxer exactly as it was.
        let header_body = if self.streams[index].send_header {
            Some(self.sequence_header_body(index, frame)?)
        } else {
            None
        };
        let coded_body = self.coded_frame_body(frame)?;

        if self.start_up_time.is_none() {
            self.start_up_time = Some(start);
            self.emit_preamble(frame.pts)?;
        }

        let ts_ms = ((frame.pts - start).max(0) / 1_000) as u32;
        if let Some(body) = header_body {
            self.emit_tag(tag_type_for(frame.mime), ts_ms, &body, frame)?;
            self.streams[index].send_header = false;
        }
        self.emit_tag(tag_type_for(frame.mime), ts_ms, &coded_body, frame)
    }

    fn emit_tag(
        &self,
        tag_type: FlvTagType,
        ts_ms: u32,
        body: &[u8],
        frame: &Frame,
    ) -> Result<()> {
        let mut buf = BytesMut::with_capacity(15 + body.len());
        write_tag(&mut buf, tag_type, ts_ms, body);
        let kind = if frame.mime.is_video() {
            PacketKind::Video
        } else {
            PacketKind::Audio
        };
        self.send(
            Packet::new(buf.freeze())
                .with_pts(frame.pts)
                .with_kind(kind),
        )
    }

    fn send(&self, packet: Packet) -> Result<()> {
        self.output
            .send(packet)
            .map_err(|_| CastError::SinkWrite("packet listener closed".into()))
    }

    // FLV file header plus the onMetaData script tag.
    fn emit_preamble(&self, pts: i64) -> Result<()> {
        let audio = self.streams.iter().find_map(|s| match &s.config {
            StreamConfig::Audio(a) => Some(a.clone()),
            _ => None,
        });
        let video = self.streams.iter().find_map(|s| match &s.config {
            StreamConfig::Video(v) => Some(v.clone()),
            _ => None,
        });

        let header = flv_file_header(audio.is_some(), video.is_some());
        self.send(
            Packet::new(Bytes::copy_from_slice(&header))
                .with_pts(pts)
                .with_kind(PacketKind::Metadata),
        )?;

        let mut body = BytesMut::new();
        amf::put_string(&mut body, "onMetaData");
        let mut entries: Vec<(&str, Amf0Value)> = vec![("duration", Amf0Value::Number(0.0))];
        if let Some(v) = &video {
            entries.push(("width", Amf0Value::Number(v.width as f64)));
            entries.push(("height", Amf0Value::Number(v.height as f64)));
            entries.push((
                "videodatarate",
                Amf0Value::Number(v.start_bitrate as f64 / 1_000.0),
            ));
            entries.push(("framerate", Amf0Value::Number(v.fps as f64)));
            entries.push(("videocodecid", Amf0Value::Number(video_codec_id(v)?)));
        }
        if let Some(a) = &audio {
            entries.push(("audiocodecid", Amf0Value::Number(AUDIO_FORMAT_AAC as f64)));
            entries.push((
                "audiodatarate",
                Amf0Value::Number(a.start_bitrate as f64 / 1_000.0),
            ));
            entries.push(("audiosamplerate", Amf0Value::Number(a.sample_rate as f64)));
            entries.push(("audiosamplesize", Amf0Value::Number(16.0)));
            entries.push(("stereo", Amf0Value::Boolean(a.channel_count == 2)));
        }
        amf::put_ecma_array(&mut body, &entries);

        let mut tag = BytesMut::with_capacity(15 + body.len());
        write_tag(&mut tag, FlvTagType::Script, 0, &body);
        self.send(
            Packet::new(tag.freeze())
                .with_pts(pts)
                .with_kind(PacketKind::Metadata),
        )
    }

    fn sequence_header_body(&self, index: usize, frame: &Frame) -> Result<BytesMut> {
        match &self.streams[index].config {
            StreamConfig::Video(_) => {
                let extra = frame.extra.as_ref().ok_or_else(|| {
                    CastError::MissingCodecConfig(format!(
                        "{} sequence header needs codec extra data",
                        frame.mime
                    ))
                })?;
                match frame.mime {
                    CodecId::H264 => {
                        let record = h264::decoder_configuration_record(extra)?;
                        Ok(avc_video_body(FRAME_TYPE_KEY, AVC_SEQUENCE_HEADER, 0, &record))
                    }
                    CodecId::Hevc => {
                        let record = h265::decoder_configuration_record(extra)?;
                        ex_video_body(FRAME_TYPE_KEY, EX_SEQUENCE_START, frame.mime, None, &record)
                    }
                    CodecId::Av1 | CodecId::Vp9 => {
                        let mut record = BytesMut::new();
                        for seq in extra {
                            record.put_slice(seq);
                        }
                        ex_video_body(FRAME_TYPE_KEY, EX_SEQUENCE_START, frame.mime, None, &record)
                    }
                    other => Err(CastError::Unsupported(format!(
                        "{} cannot be carried in FLV",
                        other
                    ))),
                }
            }
            StreamConfig::Audio(audio) => {
                let asc = match frame.extra.as_ref().and_then(|e| e.first()) {
                    Some(bytes) => bytes.to_vec(),
                    None => synthesize_asc(audio)?,
                };
                Ok(aac_audio_body(0, &asc))
            }
        }
    }

    fn coded_frame_body(&self, frame: &Frame) -> Result<BytesMut> {
        let frame_type = if frame.is_key_frame {
            FRAME_TYPE_KEY
        } else {
            FRAME_TYPE_INTER
        };
        match frame.mime {
            CodecId::H264 => {
                let cts_ms = ((frame.pts - frame.decode_ts()) / 1_000) as i32;
                let data = to_length_prefixed(&frame.buffer);
                Ok(avc_video_body(frame_type, AVC_NALU, cts_ms, &data))
            }
            CodecId::Hevc => {
                let cts_ms = ((frame.pts - frame.decode_ts()) / 1_000) as i32;
                let data = to_length_prefixed(&frame.buffer);
                if cts_ms == 0 {
                    ex_video_body(frame_type, EX_CODED_FRAMES_X, frame.mime, None, &data)
                } else {
                    ex_video_body(frame_type, EX_CODED_FRAMES, frame.mime, Some(cts_ms), &data)
                }
            }
            CodecId::Av1 | CodecId::Vp9 => {
                ex_video_body(frame_type, EX_CODED_FRAMES_X, frame.mime, None, &frame.buffer)
            }
            CodecId::Aac => Ok(aac_audio_body(1, &frame.buffer)),
            other => Err(CastError::Unsupported(format!(
                "{} cannot be carried in FLV",
                other
            ))),
        }
    }
}

fn tag_type_for(mime: CodecId) -> FlvTagType {
    if mime.is_video() {
        FlvTagType::Video
    } else {
        FlvTagType::Audio
    }
}

fn video_codec_id(config: &VideoConfig) -> Result<f64> {
    if config.mime == CodecId::H264 {
        Ok(VIDEO_CODEC_AVC as f64)
    } else {
        Ok(u32::from_be_bytes(four_cc(config.mime)?) as f64)
    }
}

fn synthesize_asc(audio: &AudioConfig) -> Result<Vec<u8>> {
    AudioSpecificConfig::new(
        audio.aac_profile().audio_object_type(),
        audio.sample_rate,
        audio.channel_count,
    )?
    .to_bytes()
}
