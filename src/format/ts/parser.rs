use super::types::{PID_PAT, PID_SDT, TS_PACKET_SIZE};
use crate::error::{CastError, Result};
use bytes::BytesMut;
use std::collections::HashMap;

/// A PES packet reassembled from transport packets.
#[derive(Debug, Clone)]
pub struct DemuxedPes {
    /// PID the PES arrived on
    pub pid: u16,
    /// PES stream id
    pub stream_id: u8,
    /// Presentation timestamp, 90 kHz
    pub pts: Option<u64>,
    /// Decode timestamp, 90 kHz
    pub dts: Option<u64>,
    /// Elementary stream payload after PES unwrapping
    pub payload: Vec<u8>,
}

/// A service announcement read back from the SDT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemuxedService {
    /// Service id
    pub service_id: u16,
    /// DVB service type
    pub service_type: u8,
    /// Provider name from the service descriptor
    pub provider_name: String,
    /// Service name from the service descriptor
    pub service_name: String,
}

/// Minimal TS read-back used to verify the muxer's output.
///
/// Feeds on whole 188-byte packets, tracks PAT/PMT/SDT state and
/// reassembles PES packets per PID. This is a verification tool, not a
/// general-purpose demuxer: it assumes the well-formed output of
/// [`super::TsMuxer`].
#[derive(Default)]
pub struct TsPacketParser {
    /// program number -> PMT PID
    programs: HashMap<u16, u16>,
    /// elementary PID -> stream type
    stream_types: HashMap<u16, u8>,
    /// services parsed from the SDT
    services: Vec<DemuxedService>,
    /// PIDs of every packet pushed, in arrival order
    packet_pids: Vec<u16>,
    /// count of PAT packets seen
    pat_count: usize,
    /// count of SDT packets seen
    sdt_count: usize,
    /// per-PID PES reassembly buffers
    buffers: HashMap<u16, BytesMut>,
    /// completed PES packets in arrival order
    completed: Vec<DemuxedPes>,
}

impl TsPacketParser {
    /// Creates an empty parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes a buffer holding a whole number of TS packets.
    pub fn push(&mut self, data: &[u8]) -> Result<()> {
        if data.len() % TS_PACKET_SIZE != 0 {
            return Err(CastError::InvalidData(format!(
                "{} bytes is not a whole number of TS packets",
                data.len()
            )));
        }
        for chunk in data.chunks_exact(TS_PACKET_SIZE) {
            self.push_packet(chunk)?;
        }
        Ok(())
    }

    /// Flushes pending reassembly buffers (in ascending PID order) and
    /// returns every completed PES.
    pub fn finish(&mut self) -> Vec<DemuxedPes> {
        let mut pids: Vec<u16> = self.buffers.keys().copied().collect();
        pids.sort_unstable();
        for pid in pids {
            self.flush_pes(pid);
        }
        std::mem::take(&mut self.completed)
    }

    /// Program number to PMT PID mapping from the latest PAT.
    pub fn programs(&self) -> &HashMap<u16, u16> {
        &self.programs
    }

    /// Elementary PID to stream type mapping from the latest PMTs.
    pub fn stream_types(&self) -> &HashMap<u16, u8> {
        &self.stream_types
    }

    /// Services announced by the latest SDT.
    pub fn services(&self) -> &[DemuxedService] {
        &self.services
    }

    /// PIDs of all pushed packets in arrival order.
    pub fn packet_pids(&self) -> &[u16] {
        &self.packet_pids
    }

    /// Number of PAT packets seen so far.
    pub fn pat_count(&self) -> usize {
        self.pat_count
    }

    /// Number of SDT packets seen so far.
    pub fn sdt_count(&self) -> usize {
        self.sdt_count
    }

    fn push_packet(&mut self, packet: &[u8]) -> Result<()> {
        if packet[0] != 0x47 {
            return Err(CastError::InvalidData("lost TS sync byte".into()));
        }
        let payload_unit_start = packet[1] & 0x40 != 0;
        let pid = ((packet[1] as u16 & 0x1F) << 8) | packet[2] as u16;
        let has_adaptation = packet[3] & 0x20 != 0;
        let has_payload = packet[3] & 0x10 != 0;
        self.packet_pids.push(pid);

        if !has_payload {
            return Ok(());
        }
        let mut offset = 4;
        if has_adaptation {
            offset += 1 + packet[4] as usize;
        }
        if offset >= TS_PACKET_SIZE {
            return Err(CastError::InvalidData("adaptation field overruns packet".into()));
        }
        let payload = &packet[offset..];

        if pid == PID_PAT {
            self.pat_count += 1;
            self.parse_pat(Self::section(payload)?)?;
        } else if pid == PID_SDT {
            self.sdt_count += 1;
            self.parse_sdt(Self::section(payload)?)?;
        } else if self.programs.values().any(|&pmt| pmt == pid) {
            self.parse_pmt(Self::section(payload)?)?;
        } else {
            self.push_es_payload(pid, payload_unit_start, payload);
        }
        Ok(())
    }

    // Strips the pointer field and bounds the section by its length field.
    fn section(payload: &[u8]) -> Result<&[u8]> {
        if payload.is_empty() {
            return Err(CastError::InvalidData("empty PSI payload".into()));
        }
        let pointer = payload[0] as usize;
        let section = &payload[1 + pointer..];
        if section.len() < 3 {
            return Err(CastError::InvalidData("truncated PSI section".into()));
        }
        let length = (((section[1] & 0x0F) as usize) << 8) | section[2] as usize;
        section
            .get(..3 + length)
            .ok_or_else(|| CastError::InvalidData("PSI section length overrun".into()))
    }

    fn parse_pat(&mut self, section: &[u8]) -> Result<()> {
        self.programs.clear();
        // 8 bytes of section header, 4 bytes of CRC
        let entries = &section[8..section.len() - 4];
        for entry in entries.chunks_exact(4) {
            let program_number = u16::from_be_bytes([entry[0], entry[1]]);
            let pid = (((entry[2] & 0x1F) as u16) << 8) | entry[3] as u16;
            if program_number != 0 {
                self.programs.insert(program_number, pid);
            }
        }
        Ok(())
    }

    fn parse_pmt(&mut self, section: &[u8]) -> Result<()> {
        let body = &section[8..section.len() - 4];
        if body.len() < 4 {
            return Err(CastError::InvalidData("truncated PMT body".into()));
        }
        let program_info_len = (((body[2] & 0x0F) as usize) << 8) | body[3] as usize;
        let mut streams = &body[4 + program_info_len..];
        while streams.len() >= 5 {
            let stream_type = streams[0];
            let pid = (((streams[1] & 0x1F) as u16) << 8) | streams[2] as u16;
            let es_info_len = (((streams[3] & 0x0F) as usize) << 8) | streams[4] as usize;
            self.stream_types.insert(pid, stream_type);
            streams = &streams[5 + es_info_len..];
        }
        Ok(())
    }

    fn parse_sdt(&mut self, section: &[u8]) -> Result<()> {
        self.services.clear();
        // section header (8), original_network_id (2), reserved (1)
        let mut body = &section[11..section.len() - 4];
        while body.len() >= 5 {
            let service_id = u16::from_be_bytes([body[0], body[1]]);
            let loop_len = (((body[3] & 0x0F) as usize) << 8) | body[4] as usize;
            let descriptors = &body[5..5 + loop_len];
            if descriptors.len() >= 2 && descriptors[0] == 0x48 {
                let service_type = descriptors[2];
                let provider_len = descriptors[3] as usize;
                let provider_name =
                    String::from_utf8_lossy(&descriptors[4..4 + provider_len]).to_string();
                let name_len = descriptors[4 + provider_len] as usize;
                let name_start = 5 + provider_len;
                let service_name =
                    String::from_utf8_lossy(&descriptors[name_start..name_start + name_len])
                        .to_string();
                self.services.push(DemuxedService {
                    service_id,
                    service_type,
                    provider_name,
                    service_name,
                });
            }
            body = &body[5 + loop_len..];
        }
        Ok(())
    }

    fn push_es_payload(&mut self, pid: u16, payload_unit_start: bool, payload: &[u8]) {
        if payload_unit_start {
            self.flush_pes(pid);
        }
        self.buffers
            .entry(pid)
            .or_default()
            .extend_from_slice(payload);
    }

    fn flush_pes(&mut self, pid: u16) {
        let Some(buffer) = self.buffers.remove(&pid) else {
            return;
        };
        if buffer.len() < 9 || buffer[0] != 0 || buffer[1] != 0 || buffer[2] != 1 {
            return;
        }
        let stream_id = buffer[3];
        let pts_dts_flags = buffer[7] >> 6;
        let header_len = buffer[8] as usize;
        let mut pts = None;
        let mut dts = None;
        if pts_dts_flags & 0x2 != 0 && buffer.len() >= 14 {
            pts = Some(Self::read_timestamp(&buffer[9..14]));
        }
        if pts_dts_flags & 0x1 != 0 && buffer.len() >= 19 {
            dts = Some(Self::read_timestamp(&buffer[14..19]));
        }
        let payload = buffer[9 + header_len..].to_vec();
        self.completed.push(DemuxedPes {
            pid,
            stream_id,
            pts,
            dts,
            payload,
        });
    }

    fn read_timestamp(b: &[u8]) -> u64 {
        (((b[0] >> 1) & 0x07) as u64) << 30
            | (b[1] as u64) << 22
            | (((b[2] >> 1) & 0x7F) as u64) << 15
            | (b[3] as u64) << 7
            | (b[4] >> 1) as u64
    }
}
