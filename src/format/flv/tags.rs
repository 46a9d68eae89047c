use crate::av::CodecId;
use crate::error::{CastError, Result};
use crate::utils::nal::split_nal_units;
use bytes::{BufMut, BytesMut};

/// FLV tag types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlvTagType {
    /// Audio data tag
    Audio,
    /// Video data tag
    Video,
    /// AMF0 script data tag
    Script,
}

impl FlvTagType {
    /// On-wire tag type value.
    pub fn value(&self) -> u8 {
        match self {
            FlvTagType::Audio => 8,
            FlvTagType::Video => 9,
            FlvTagType::Script => 18,
        }
    }
}

/// Video frame types used in the video tag header.
pub const FRAME_TYPE_KEY: u8 = 1;
/// Inter frame type
pub const FRAME_TYPE_INTER: u8 = 2;
/// Video codec id of AVC in the classic video tag header
pub const VIDEO_CODEC_AVC: u8 = 7;
/// Audio format value of AAC in the audio tag header
pub const AUDIO_FORMAT_AAC: u8 = 10;

/// AVCPacketType values of the classic AVC video tag.
pub const AVC_SEQUENCE_HEADER: u8 = 0;
/// AVCPacketType of a coded NALU tag
pub const AVC_NALU: u8 = 1;

/// Packet types of the extended (IsExHeader) video tag.
pub const EX_SEQUENCE_START: u8 = 0;
/// Coded frames with composition time (HEVC)
pub const EX_CODED_FRAMES: u8 = 1;
/// Coded frames without composition time
pub const EX_CODED_FRAMES_X: u8 = 3;

/// Returns the FourCC the extended video tag header carries for a codec.
pub fn four_cc(mime: CodecId) -> Result<[u8; 4]> {
    match mime {
        CodecId::Hevc => Ok(*b"hvc1"),
        CodecId::Av1 => Ok(*b"av01"),
        CodecId::Vp9 => Ok(*b"vp09"),
        other => Err(CastError::Unsupported(format!(
            "{} has no extended video tag FourCC",
            other
        ))),
    }
}

/// True when the codec uses the extended video tag header.
pub fn is_extended_codec(mime: CodecId) -> bool {
    matches!(mime, CodecId::Hevc | CodecId::Av1 | CodecId::Vp9)
}

/// Builds the 13-byte FLV file header (9 header bytes plus the leading
/// zero previous-tag-size).
pub fn flv_file_header(has_audio: bool, has_video: bool) -> [u8; 13] {
    let mut header = [0u8; 13];
    header[0..3].copy_from_slice(b"FLV");
    header[3] = 1; // version
    header[4] = ((has_audio as u8) << 2) | (has_video as u8);
    header[8] = 9; // data offset
    header
}

/// Frames one FLV tag: header, body and trailing previous-tag-size.
pub fn write_tag(buf: &mut BytesMut, tag_type: FlvTagType, timestamp_ms: u32, body: &[u8]) {
    buf.put_u8(tag_type.value());
    buf.put_uint(body.len() as u64, 3);
    buf.put_uint((timestamp_ms & 0x00FF_FFFF) as u64, 3);
    buf.put_u8((timestamp_ms >> 24) as u8);
    buf.put_uint(0, 3); // stream id
    buf.put_slice(body);
    buf.put_u32(11 + body.len() as u32);
}

/// Converts an Annex-B access unit to length-prefixed (AVCC/HVCC) form.
pub fn to_length_prefixed(payload: &[u8]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(payload.len() + 16);
    for unit in split_nal_units(payload) {
        buf.put_u32(unit.len() as u32);
        buf.put_slice(unit);
    }
    buf
}

/// Builds a classic AVC video tag body.
pub fn avc_video_body(
    frame_type: u8,
    packet_type: u8,
    composition_time_ms: i32,
    data: &[u8],
) -> BytesMut {
    let mut body = BytesMut::with_capacity(5 + data.len());
    body.put_u8((frame_type << 4) | VIDEO_CODEC_AVC);
    body.put_u8(packet_type);
    body.put_int(composition_time_ms as i64, 3);
    body.put_slice(data);
    body
}

/// Builds an extended video tag body (IsExHeader set, FourCC after the
/// first byte).
pub fn ex_video_body(
    frame_type: u8,
    packet_type: u8,
    mime: CodecId,
    composition_time_ms: Option<i32>,
    data: &[u8],
) -> Result<BytesMut> {
    let mut body = BytesMut::with_capacity(8 + data.len());
    body.put_u8(0x80 | (frame_type << 4) | (packet_type & 0x0F));
    body.put_slice(&four_cc(mime)?);
    if packet_type == EX_CODED_FRAMES {
        body.put_int(composition_time_ms.unwrap_or(0) as i64, 3);
    }
    body.put_slice(data);
    Ok(body)
}

/// Builds an AAC audio tag body.
///
/// The FLV audio tag header pins AAC to 44 kHz/16-bit/stereo regardless of
/// the actual stream parameters; the real values travel in the
/// AudioSpecificConfig.
pub fn aac_audio_body(packet_type: u8, data: &[u8]) -> BytesMut {
    let mut body = BytesMut::with_capacity(2 + data.len());
    body.put_u8((AUDIO_FORMAT_AAC << 4) | 0x0F);
    body.put_u8(packet_type);
    body.put_slice(data);
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_header_flags() {
        let both = flv_file_header(true, true);
        assert_eq!(&both[0..3], b"FLV");
        assert_eq!(both[3], 1);
        assert_eq!(both[4], 0x05);
        assert_eq!(both[8], 9);
        assert_eq!(&both[9..13], &[0, 0, 0, 0]);

        assert_eq!(flv_file_header(true, false)[4], 0x04);
        assert_eq!(flv_file_header(false, true)[4], 0x01);
    }

    #[test]
    fn test_tag_framing() {
        let mut buf = BytesMut::new();
        write_tag(&mut buf, FlvTagType::Video, 0x0102_0304, &[0xAA; 5]);

        assert_eq!(buf[0], 9);
        // 24-bit data size
        assert_eq!(&buf[1..4], &[0, 0, 5]);
        // 24-bit timestamp + extension byte
        assert_eq!(&buf[4..7], &[0x02, 0x03, 0x04]);
        assert_eq!(buf[7], 0x01);
        // stream id
        assert_eq!(&buf[8..11], &[0, 0, 0]);
        // previous tag size
        let prev = u32::from_be_bytes([buf[16], buf[17], buf[18], buf[19]]);
        assert_eq!(prev, 11 + 5);
    }

    #[test]
    fn test_length_prefixed_conversion() {
        let annexb = [0u8, 0, 0, 1, 0x65, 0x01, 0, 0, 1, 0x41, 0x02, 0x03];
        let avcc = to_length_prefixed(&annexb);
        assert_eq!(
            &avcc[..],
            &[0, 0, 0, 2, 0x65, 0x01, 0, 0, 0, 3, 0x41, 0x02, 0x03]
        );
    }

    #[test]
    fn test_extended_body_header() {
        let body = ex_video_body(FRAME_TYPE_KEY, EX_SEQUENCE_START, CodecId::Hevc, None, &[1, 2])
            .unwrap();
        assert_eq!(body[0], 0x80 | (1 << 4));
        assert_eq!(&body[1..5], b"hvc1");
        assert_eq!(&body[5..], &[1, 2]);
    }

    #[test]
    fn test_aac_body_header() {
        let body = aac_audio_body(1, &[0xFE]);
        assert_eq!(body[0], 0xAF);
        assert_eq!(body[1], 1);
        assert_eq!(body[2], 0xFE);
    }
}
