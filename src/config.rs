//! # Configuration and Descriptor Model
//!
//! Typed descriptions of codecs, tracks and destinations, with the
//! validators applied at configure time. These are plain value types: the
//! pipeline owns one `AudioConfig`/`VideoConfig` per track and a
//! `MediaDescriptor` per destination.

use crate::av::CodecId;
use crate::error::{CastError, Result};
use url::Url;

/// Sample rates an AAC encoder may be configured with.
pub const AAC_SAMPLE_RATES: [u32; 12] = [
    8_000, 11_025, 12_000, 16_000, 22_050, 24_000, 32_000, 44_100, 48_000, 64_000, 88_200, 96_000,
];

/// AAC encoder profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AacProfile {
    /// AAC Low Complexity
    Lc,
    /// High Efficiency AAC (SBR)
    He,
    /// High Efficiency AAC v2 (SBR + PS)
    HeV2,
}

impl AacProfile {
    /// MPEG-4 audio object type for this profile.
    pub fn audio_object_type(&self) -> u8 {
        match self {
            AacProfile::Lc => 2,
            AacProfile::He => 5,
            AacProfile::HeV2 => 29,
        }
    }
}

/// Raw sample layout delivered by an audio source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteFormat {
    /// Signed 16-bit little-endian PCM
    S16Le,
    /// 32-bit float little-endian PCM
    F32Le,
}

/// Transfer characteristics of a video track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicRange {
    /// Standard dynamic range
    Sdr,
    /// Hybrid log-gamma HDR
    Hlg,
    /// HDR10 (PQ)
    Hdr10,
}

/// Configuration of an audio track.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioConfig {
    /// Audio codec
    pub mime: CodecId,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Channel count, 1 or 2
    pub channel_count: u8,
    /// Raw sample layout expected from the source
    pub byte_format: ByteFormat,
    /// Initial encoder bitrate in bits per second
    pub start_bitrate: u32,
    /// AAC profile; ignored for other codecs
    pub profile: Option<AacProfile>,
}

impl AudioConfig {
    /// Validates the configuration against codec constraints.
    pub fn validate(&self) -> Result<()> {
        if !self.mime.is_audio() {
            return Err(CastError::InvalidConfig(format!(
                "{} is not an audio codec",
                self.mime
            )));
        }
        if self.channel_count != 1 && self.channel_count != 2 {
            return Err(CastError::InvalidConfig(format!(
                "unsupported channel count {}",
                self.channel_count
            )));
        }
        if self.mime == CodecId::Aac && !AAC_SAMPLE_RATES.contains(&self.sample_rate) {
            return Err(CastError::InvalidConfig(format!(
                "sample rate {} not supported by AAC",
                self.sample_rate
            )));
        }
        Ok(())
    }

    /// The effective AAC profile, defaulting to LC.
    pub fn aac_profile(&self) -> AacProfile {
        self.profile.unwrap_or(AacProfile::Lc)
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            mime: CodecId::Aac,
            sample_rate: 44_100,
            channel_count: 2,
            byte_format: ByteFormat::S16Le,
            start_bitrate: 128_000,
            profile: Some(AacProfile::Lc),
        }
    }
}

/// Configuration of a video track.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoConfig {
    /// Video codec
    pub mime: CodecId,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Target frames per second
    pub fps: u32,
    /// Initial encoder bitrate in bits per second
    pub start_bitrate: u32,
    /// Codec profile identifier, if constrained
    pub profile: Option<i32>,
    /// Codec level identifier, if constrained
    pub level: Option<i32>,
    /// Transfer characteristics
    pub dynamic_range: Option<DynamicRange>,
}

impl VideoConfig {
    /// Validates the configuration against encoder constraints.
    pub fn validate(&self) -> Result<()> {
        if !self.mime.is_video() {
            return Err(CastError::InvalidConfig(format!(
                "{} is not a video codec",
                self.mime
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(CastError::InvalidConfig(
                "width and height must be positive".into(),
            ));
        }
        if self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(CastError::InvalidConfig(format!(
                "dimensions {}x{} must be multiples of 2",
                self.width, self.height
            )));
        }
        if self.fps == 0 {
            return Err(CastError::InvalidConfig("fps must be positive".into()));
        }
        Ok(())
    }

    /// A copy of this configuration with profile and level cleared.
    ///
    /// Used for the configure retry when an encoder rejects the constrained
    /// form.
    pub fn without_profile_level(&self) -> Self {
        Self {
            profile: None,
            level: None,
            ..self.clone()
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            mime: CodecId::H264,
            width: 1280,
            height: 720,
            fps: 30,
            start_bitrate: 2_000_000,
            profile: None,
            level: None,
            dynamic_range: Some(DynamicRange::Sdr),
        }
    }
}

/// Configuration of a single muxer stream, audio or video.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamConfig {
    /// An audio track
    Audio(AudioConfig),
    /// A video track
    Video(VideoConfig),
}

impl StreamConfig {
    /// Codec of the described track.
    pub fn mime(&self) -> CodecId {
        match self {
            StreamConfig::Audio(c) => c.mime,
            StreamConfig::Video(c) => c.mime,
        }
    }

    /// Validates the underlying track configuration.
    pub fn validate(&self) -> Result<()> {
        match self {
            StreamConfig::Audio(c) => c.validate(),
            StreamConfig::Video(c) => c.validate(),
        }
    }
}

/// Container format of a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerType {
    /// MPEG Transport Stream
    MpegTs,
    /// Flash Video
    Flv,
    /// Fragmented MP4
    Mp4,
    /// FLV carried over RTMP
    Rtmp,
    /// MPEG-TS carried over a reliable-datagram transport
    Srt,
}

impl ContainerType {
    /// The container actually emitted by the muxer for this destination.
    pub fn mux_format(&self) -> ContainerType {
        match self {
            ContainerType::Rtmp => ContainerType::Flv,
            ContainerType::Srt => ContainerType::MpegTs,
            other => *other,
        }
    }
}

/// Where the container bytes end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkType {
    /// Local filesystem
    File,
    /// Host-platform content provider
    Content,
    /// Network transport
    Network,
}

/// An addressable destination for the pipeline output.
#[derive(Debug, Clone)]
pub struct MediaDescriptor {
    /// Destination URI
    pub uri: Url,
    /// Container format, inferred from the URI unless given explicitly
    pub container: ContainerType,
    /// Sink category, inferred from the URI scheme
    pub sink: SinkType,
}

impl MediaDescriptor {
    /// Creates a descriptor with explicit container and sink types.
    pub fn new(uri: Url, container: ContainerType, sink: SinkType) -> Self {
        Self {
            uri,
            container,
            sink,
        }
    }

    /// Parses a URI and infers container and sink from scheme and extension.
    ///
    /// Plain absolute paths are accepted as file destinations.
    pub fn parse(uri: &str) -> Result<Self> {
        let url = match Url::parse(uri) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => Url::from_file_path(uri)
                .map_err(|_| {
                    CastError::InvalidConfig(format!("not an absolute path or URI: {}", uri))
                })?,
            Err(e) => return Err(CastError::InvalidConfig(format!("bad URI {}: {}", uri, e))),
        };

        match url.scheme() {
            "file" => {
                let container = Self::container_from_extension(url.path())?;
                Ok(Self::new(url, container, SinkType::File))
            }
            "rtmp" | "rtmps" => Ok(Self::new(url, ContainerType::Rtmp, SinkType::Network)),
            "srt" => Ok(Self::new(url, ContainerType::Srt, SinkType::Network)),
            "content" => {
                let hint = url
                    .query_pairs()
                    .find(|(k, _)| k == "format")
                    .map(|(_, v)| v.to_string());
                let container = match hint.as_deref() {
                    Some("ts") => ContainerType::MpegTs,
                    Some("flv") => ContainerType::Flv,
                    Some("mp4") | None => ContainerType::Mp4,
                    Some(other) => {
                        return Err(CastError::InvalidConfig(format!(
                            "unknown container hint {}",
                            other
                        )))
                    }
                };
                Ok(Self::new(url, container, SinkType::Content))
            }
            other => Err(CastError::InvalidConfig(format!(
                "unsupported scheme {}",
                other
            ))),
        }
    }

    fn container_from_extension(path: &str) -> Result<ContainerType> {
        let ext = path.rsplit('.').next().unwrap_or("");
        match ext {
            "ts" => Ok(ContainerType::MpegTs),
            "flv" => Ok(ContainerType::Flv),
            "mp4" => Ok(ContainerType::Mp4),
            other => Err(CastError::InvalidConfig(format!(
                "cannot infer container from extension .{}",
                other
            ))),
        }
    }
}

/// DVB service type carried in the SDT service descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceType {
    /// Digital television service
    DigitalTv,
    /// Digital radio service
    DigitalRadio,
    /// Advanced codec HD digital television
    HdDigitalTv,
}

impl ServiceType {
    /// The on-wire service_type value (EN 300 468).
    pub fn value(&self) -> u8 {
        match self {
            ServiceType::DigitalTv => 0x01,
            ServiceType::DigitalRadio => 0x02,
            ServiceType::HdDigitalTv => 0x19,
        }
    }
}

/// A logical program in an MPEG-TS multiplex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    /// DVB service type
    pub service_type: ServiceType,
    /// Program number; also the SDT service id
    pub id: u16,
    /// Service name announced in the SDT
    pub name: String,
    /// Provider name announced in the SDT
    pub provider_name: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service_type: ServiceType::DigitalTv,
            id: 0x0001,
            name: "castio".to_string(),
            provider_name: "castio".to_string(),
        }
    }
}
