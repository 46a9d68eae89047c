use bytes::Bytes;

/// Classifies the content of a container [`Packet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// Video elementary stream bytes
    Video,
    /// Audio elementary stream bytes
    Audio,
    /// Container metadata (PSI tables, script tags)
    Metadata,
    /// A batch mixing several of the above
    Mixed,
}

/// A unit flowing between a muxer and a sink.
///
/// For MPEG-TS the buffer holds a batch of 188-byte packets; for FLV it
/// holds one or more complete tags.
#[derive(Debug, Clone)]
pub struct Packet {
    /// Container output bytes
    pub buffer: Bytes,
    /// Timestamp in microseconds associated with the content
    pub pts: i64,
    /// Content classification for sinks that care
    pub kind: PacketKind,
}

impl Packet {
    /// Creates a packet with the given content bytes.
    pub fn new(buffer: impl Into<Bytes>) -> Self {
        Self {
            buffer: buffer.into(),
            pts: 0,
            kind: PacketKind::Mixed,
        }
    }

    /// Sets the associated timestamp in microseconds.
    pub fn with_pts(mut self, pts: i64) -> Self {
        self.pts = pts;
        self
    }

    /// Sets the content classification.
    pub fn with_kind(mut self, kind: PacketKind) -> Self {
        self.kind = kind;
        self
    }
}
