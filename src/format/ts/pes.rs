use super::types::pts_90khz;
use crate::error::Result;
use bytes::{BufMut, BytesMut};

/// Packetized Elementary Stream header.
///
/// Timestamps are stored in the 33-bit 90 kHz clock; use the `with_*_us`
/// builders to convert from the pipeline's microsecond timestamps.
#[derive(Debug, Clone)]
pub struct PesHeader {
    /// PES stream id (0xE0 video, 0xC0 audio, 0xBD private)
    pub stream_id: u8,
    /// PES_packet_length; 0 means unbounded (video only)
    pub packet_length: u16,
    /// Data alignment indicator; set since every PES starts an access unit
    pub data_alignment: bool,
    /// Presentation timestamp, 90 kHz
    pub pts: Option<u64>,
    /// Decode timestamp, 90 kHz; only written when distinct from `pts`
    pub dts: Option<u64>,
}

impl PesHeader {
    /// Creates a header for the given stream id.
    pub fn new(stream_id: u8) -> Self {
        Self {
            stream_id,
            packet_length: 0,
            data_alignment: true,
            pts: None,
            dts: None,
        }
    }

    /// Sets the presentation timestamp from microseconds.
    pub fn with_pts_us(mut self, pts_us: i64) -> Self {
        self.pts = Some(pts_90khz(pts_us));
        self
    }

    /// Sets a decode timestamp from microseconds.
    pub fn with_dts_us(mut self, dts_us: i64) -> Self {
        self.dts = Some(pts_90khz(dts_us));
        self
    }

    /// Number of optional-field bytes following PES_header_data_length.
    pub fn header_data_length(&self) -> u8 {
        let mut len = 0;
        if self.pts.is_some() {
            len += 5;
        }
        if self.dts.is_some() {
            len += 5;
        }
        len
    }

    /// Writes the complete PES header.
    pub fn write_to(&self, buf: &mut BytesMut) -> Result<()> {
        // Start code prefix
        buf.put_u8(0x00);
        buf.put_u8(0x00);
        buf.put_u8(0x01);

        buf.put_u8(self.stream_id);
        buf.put_u16(self.packet_length);

        // '10' marker, no scrambling, no priority, alignment flag
        let mut flags = 0x80u8;
        if self.data_alignment {
            flags |= 0x04;
        }
        buf.put_u8(flags);

        let mut pts_dts_flags = 0u8;
        if self.pts.is_some() {
            pts_dts_flags |= 0x80;
        }
        if self.dts.is_some() {
            pts_dts_flags |= 0x40;
        }
        buf.put_u8(pts_dts_flags);

        buf.put_u8(self.header_data_length());

        if let Some(pts) = self.pts {
            let marker = if self.dts.is_some() { 0x30 } else { 0x20 };
            write_timestamp(buf, marker, pts);
        }
        if let Some(dts) = self.dts {
            write_timestamp(buf, 0x10, dts);
        }

        Ok(())
    }
}

/// Builds a complete PES packet for one access unit.
///
/// A DTS is only encoded when it differs from the PTS. The packet length
/// field is left at 0 when the payload would overflow its 16 bits.
pub fn build_pes(stream_id: u8, payload: &[u8], pts_us: i64, dts_us: Option<i64>) -> Result<BytesMut> {
    let mut header = PesHeader::new(stream_id).with_pts_us(pts_us);
    if let Some(dts) = dts_us {
        if dts != pts_us {
            header = header.with_dts_us(dts);
        }
    }

    let contents_len = 3 + header.header_data_length() as usize + payload.len();
    if contents_len <= u16::MAX as usize {
        header.packet_length = contents_len as u16;
    }

    let mut buf = BytesMut::with_capacity(9 + header.header_data_length() as usize + payload.len());
    header.write_to(&mut buf)?;
    buf.extend_from_slice(payload);
    Ok(buf)
}

// PTS/DTS are 33 bits spread over 5 bytes with marker bits between.
fn write_timestamp(buf: &mut BytesMut, marker: u8, ts: u64) {
    let ts = ts & 0x1_FFFF_FFFF;

    buf.put_u8(marker | ((ts >> 29) & 0x0E) as u8 | 0x01);
    buf.put_u16((((ts >> 14) & 0xFFFE) | 0x01) as u16);
    buf.put_u16((((ts << 1) & 0xFFFE) | 0x01) as u16);
}
