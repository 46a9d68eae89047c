use crate::error::Result;
use crate::utils::Crc32Mpeg2;
use bytes::{BufMut, BytesMut};

// Stream IDs
/// PES stream ID for video elementary streams
pub const STREAM_ID_VIDEO: u8 = 0xe0;
/// PES stream ID for audio elementary streams
pub const STREAM_ID_AUDIO: u8 = 0xc0;
/// PES stream ID for private data streams (Opus)
pub const STREAM_ID_PRIVATE: u8 = 0xbd;

// PIDs
/// PID of the Program Association Table
pub const PID_PAT: u16 = 0x0000;
/// PID reserved for the Network Information Table
pub const PID_NIT: u16 = 0x0010;
/// PID of the Service Description Table
pub const PID_SDT: u16 = 0x0011;
/// First PID handed out by the allocator
pub const BASE_PID: u16 = 0x0100;
/// Last allocatable PID
pub const MAX_PID: u16 = 0x1FFA;

// Table IDs
/// Table ID of the PAT
pub const TABLE_ID_PAT: u8 = 0x00;
/// Table ID of the PMT
pub const TABLE_ID_PMT: u8 = 0x02;
/// Table ID of the SDT describing the actual transport stream
pub const TABLE_ID_SDT: u8 = 0x42;

// Elementary stream types
/// Stream type for H.264 video
pub const STREAM_TYPE_H264: u8 = 0x1b;
/// Stream type for H.265 video
pub const STREAM_TYPE_H265: u8 = 0x24;
/// Stream type for AAC in ADTS framing
pub const STREAM_TYPE_AAC_ADTS: u8 = 0x0f;
/// Stream type for AAC in LATM framing
pub const STREAM_TYPE_AAC_LATM: u8 = 0x11;
/// Stream type for PES private data (Opus)
pub const STREAM_TYPE_PRIVATE_DATA: u8 = 0x06;

// Constants
/// Size of a Transport Stream packet in bytes
pub const TS_PACKET_SIZE: usize = 188;
/// TS packets between PAT/PMT retransmissions
pub const PAT_PACKET_PERIOD: u32 = 40;
/// TS packets between SDT retransmissions
pub const SDT_PACKET_PERIOD: u32 = 200;
/// Maximum TS packets handed to the listener per output packet
pub const MAX_OUTPUT_PACKET_NUMBER: usize = 7;
/// Clock frequency for presentation timestamps
pub const PTS_HZ: u64 = 90_000;
/// Clock frequency for the program clock reference
pub const PCR_HZ: u64 = 27_000_000;

/// Converts a microsecond timestamp to the 33-bit 90 kHz PTS clock.
pub fn pts_90khz(us: i64) -> u64 {
    ((us as i128 * PTS_HZ as i128 / 1_000_000) as u64) & 0x1_FFFF_FFFF
}

/// Converts a microsecond timestamp to PCR base (33 bits of 90 kHz) and
/// extension (9 bits of leftover 27 MHz ticks).
pub fn pcr_base_ext(us: i64) -> (u64, u64) {
    let ticks = us as i128 * (PCR_HZ / 1_000_000) as i128;
    let base = ((ticks / 300) as u64) & 0x1_FFFF_FFFF;
    let ext = (ticks % 300) as u64;
    (base, ext)
}

/// Represents a Transport Stream packet header, the fixed 4-byte prefix of
/// each TS packet.
#[derive(Debug)]
pub struct TsHeader {
    /// Payload unit start indicator; set on the first packet of a PES or
    /// PSI section
    pub payload_unit_start: bool,
    /// 13-bit packet identifier
    pub pid: u16,
    /// True when an adaptation field follows the header
    pub adaptation_field_exists: bool,
    /// True when the packet carries payload bytes
    pub contains_payload: bool,
    /// 4-bit continuity counter of the source stream
    pub continuity_counter: u8,
}

impl TsHeader {
    /// Writes the 4 header bytes in bit-correct positions.
    pub fn write_to(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_u8(0x47);

        let mut b1 = 0u8;
        if self.payload_unit_start {
            b1 |= 0x40;
        }
        b1 |= ((self.pid >> 8) & 0x1f) as u8;
        buf.put_u8(b1);

        buf.put_u8((self.pid & 0xff) as u8);

        let mut b3 = 0u8;
        if self.adaptation_field_exists {
            b3 |= 0x20;
        }
        if self.contains_payload {
            b3 |= 0x10;
        }
        b3 |= self.continuity_counter & 0x0f;
        buf.put_u8(b3);

        Ok(())
    }
}

/// A descriptor attached to a program or elementary stream in the PMT.
#[derive(Debug, Clone)]
pub struct Descriptor {
    /// Tag identifying the descriptor type
    pub tag: u8,
    /// Raw descriptor payload
    pub data: Vec<u8>,
}

impl Descriptor {
    fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u8(self.tag);
        buf.put_u8(self.data.len() as u8);
        buf.put_slice(&self.data);
    }
}

/// An entry in the Program Association Table mapping a program number to
/// its PMT PID.
#[derive(Debug, Clone)]
pub struct PatEntry {
    /// Program number; 0 is reserved for the network PID
    pub program_number: u16,
    /// PID of the program's PMT
    pub pmt_pid: u16,
}

/// Program Association Table body.
#[derive(Debug, Clone, Default)]
pub struct Pat {
    /// One entry per announced program
    pub entries: Vec<PatEntry>,
}

impl Pat {
    /// Writes the table body (the program loop).
    pub fn write_body(&self, buf: &mut BytesMut) {
        for entry in &self.entries {
            buf.put_u16(entry.program_number);
            buf.put_u16(entry.pmt_pid & 0x1fff | 7 << 13);
        }
    }
}

/// Elementary stream entry of a PMT.
#[derive(Debug, Clone)]
pub struct ElementaryStreamInfo {
    /// Elementary stream type
    pub stream_type: u8,
    /// PID carrying the elementary stream
    pub elementary_pid: u16,
    /// Stream-level descriptors
    pub descriptors: Vec<Descriptor>,
}

/// Program Map Table body for one program.
#[derive(Debug, Clone, Default)]
pub struct Pmt {
    /// PID carrying the program clock reference
    pub pcr_pid: u16,
    /// Program-level descriptors
    pub program_descriptors: Vec<Descriptor>,
    /// One entry per elementary stream
    pub elementary_stream_infos: Vec<ElementaryStreamInfo>,
}

impl Pmt {
    /// Writes the table body: PCR PID, program descriptors and the
    /// elementary stream loop.
    pub fn write_body(&self, buf: &mut BytesMut) {
        buf.put_u16(self.pcr_pid & 0x1fff | 7 << 13);

        let prog_desc_len = self
            .program_descriptors
            .iter()
            .map(|d| 2 + d.data.len())
            .sum::<usize>();
        buf.put_u16((prog_desc_len as u16) & 0x3ff | 0xf << 12);
        for desc in &self.program_descriptors {
            desc.write_to(buf);
        }

        for info in &self.elementary_stream_infos {
            buf.put_u8(info.stream_type);
            buf.put_u16(info.elementary_pid & 0x1fff | 7 << 13);

            let es_desc_len = info
                .descriptors
                .iter()
                .map(|d| 2 + d.data.len())
                .sum::<usize>();
            buf.put_u16((es_desc_len as u16) & 0x3ff | 0xf << 12);
            for desc in &info.descriptors {
                desc.write_to(buf);
            }
        }
    }
}

/// One service announced by the SDT.
#[derive(Debug, Clone)]
pub struct SdtService {
    /// Service id; equals the program number
    pub service_id: u16,
    /// DVB service type
    pub service_type: u8,
    /// Provider name placed in the service descriptor
    pub provider_name: String,
    /// Service name placed in the service descriptor
    pub service_name: String,
}

/// Service Description Table body.
#[derive(Debug, Clone, Default)]
pub struct Sdt {
    /// Original network id announced by the table
    pub original_network_id: u16,
    /// One entry per announced service
    pub services: Vec<SdtService>,
}

impl Sdt {
    /// Writes the table body: network id and the service loop with one
    /// service descriptor per service.
    pub fn write_body(&self, buf: &mut BytesMut) {
        buf.put_u16(self.original_network_id);
        buf.put_u8(0xFF); // reserved

        for service in &self.services {
            buf.put_u16(service.service_id);
            buf.put_u8(0xFC); // reserved + no EIT flags

            let provider = service.provider_name.as_bytes();
            let name = service.service_name.as_bytes();
            let descriptor_len = 5 + provider.len() + name.len();
            // running_status = 4 (running), not scrambled
            buf.put_u16(0x8000 | (descriptor_len as u16 & 0x0fff));

            buf.put_u8(0x48); // service_descriptor tag
            buf.put_u8((descriptor_len - 2) as u8);
            buf.put_u8(service.service_type);
            buf.put_u8(provider.len() as u8);
            buf.put_slice(provider);
            buf.put_u8(name.len() as u8);
            buf.put_slice(name);
        }
    }
}

/// Serializes a complete PSI section: header, body and CRC32.
///
/// `table_id_ext` is the transport stream id for PAT/SDT and the program
/// number for a PMT.
pub fn write_section(
    crc: &Crc32Mpeg2,
    table_id: u8,
    table_id_ext: u16,
    version: u8,
    body: &[u8],
) -> BytesMut {
    let mut section = BytesMut::with_capacity(body.len() + 12);
    section.put_u8(table_id);

    let section_length = body.len() + 5 + 4;
    section.put_u16(0xB000 | (section_length as u16 & 0x3FF));
    section.put_u16(table_id_ext);
    section.put_u8(0xC1 | ((version & 0x1F) << 1));
    section.put_u8(0); // section number
    section.put_u8(0); // last section number
    section.put_slice(body);

    let checksum = crc.calculate(&section);
    section.put_u32(checksum);
    section
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ts_header_bits() {
        let mut buf = BytesMut::new();
        TsHeader {
            payload_unit_start: true,
            pid: 0x0100,
            adaptation_field_exists: false,
            contains_payload: true,
            continuity_counter: 5,
        }
        .write_to(&mut buf)
        .unwrap();

        assert_eq!(&buf[..], &[0x47, 0x41, 0x00, 0x15]);
    }

    #[test]
    fn test_timestamp_conversions() {
        assert_eq!(pts_90khz(0), 0);
        assert_eq!(pts_90khz(1_000_000), 90_000);
        // A tenth of a second past the 33-bit rollover wraps to the start
        let wrap_us = ((0x2_0000_0000u64 + 9_000) * 1_000_000 / 90_000) as i64;
        assert!(pts_90khz(wrap_us) < 90_000);

        let (base, ext) = pcr_base_ext(1_000_000);
        assert_eq!(base, 90_000);
        assert_eq!(ext, 0);
        let (_, ext) = pcr_base_ext(7);
        assert_eq!(ext, (7 * 27) % 300);
    }

    #[test]
    fn test_section_header_and_crc() {
        let crc = Crc32Mpeg2::new();
        let pat = Pat {
            entries: vec![PatEntry {
                program_number: 1,
                pmt_pid: 0x0100,
            }],
        };
        let mut body = BytesMut::new();
        pat.write_body(&mut body);
        let section = write_section(&crc, TABLE_ID_PAT, 1, 0, &body);

        assert_eq!(section[0], TABLE_ID_PAT);
        // section_length covers everything after it
        let length = (((section[1] & 0x0F) as usize) << 8) | section[2] as usize;
        assert_eq!(length, section.len() - 3);
        // version 0, current_next set
        assert_eq!(section[5], 0xC1);
        // stored CRC matches a recomputation over the preceding bytes
        let stored = u32::from_be_bytes([
            section[section.len() - 4],
            section[section.len() - 3],
            section[section.len() - 2],
            section[section.len() - 1],
        ]);
        assert_eq!(stored, crc.calculate(&section[..section.len() - 4]));
    }
}
