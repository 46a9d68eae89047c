use super::pes::build_pes;
use super::types::*;
use crate::av::{CodecId, Frame, Packet, PacketKind};
use crate::codec::aac::{AdtsHeader, AudioSpecificConfig, LatmWrapper};
use crate::codec::{h264, h265, opus};
use crate::config::{AacProfile, ServiceInfo, StreamConfig};
use crate::error::{CastError, Result};
use crate::utils::nal::put_with_start_code;
use crate::utils::Crc32Mpeg2;
use bytes::{BufMut, BytesMut};
use tokio::sync::mpsc;

/// A registered elementary stream of a service.
struct TsStream {
    config: StreamConfig,
    pid: u16,
    stream_id: u8,
    stream_type: u8,
    descriptors: Vec<Descriptor>,
    continuity: u8,
    latm: Option<LatmWrapper>,
}

/// A logical program of the multiplex.
struct TsService {
    info: ServiceInfo,
    pmt_pid: u16,
    pmt_version: u8,
    pmt_continuity: u8,
    pcr_pid: Option<u16>,
    streams: Vec<TsStream>,
}

impl TsService {
    // PCR rides on the first video stream, or the first stream at all when
    // the service has no video.
    fn recompute_pcr_pid(&mut self) {
        self.pcr_pid = self
            .streams
            .iter()
            .find(|s| s.config.mime().is_video())
            .or_else(|| self.streams.first())
            .map(|s| s.pid);
    }
}

// Collects 188-byte packets and hands them to the listener in batches of
// up to MAX_OUTPUT_PACKET_NUMBER.
struct TsBatcher<'a> {
    output: &'a mpsc::UnboundedSender<Packet>,
    buf: BytesMut,
    count: usize,
    pts: i64,
    kind: PacketKind,
}

impl<'a> TsBatcher<'a> {
    fn new(output: &'a mpsc::UnboundedSender<Packet>, pts: i64, kind: PacketKind) -> Self {
        Self {
            output,
            buf: BytesMut::with_capacity(MAX_OUTPUT_PACKET_NUMBER * TS_PACKET_SIZE),
            count: 0,
            pts,
            kind,
        }
    }

    fn push(&mut self, packet: &[u8]) -> Result<()> {
        debug_assert_eq!(packet.len(), TS_PACKET_SIZE);
        self.buf.extend_from_slice(packet);
        self.count += 1;
        if self.count == MAX_OUTPUT_PACKET_NUMBER {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.count == 0 {
            return Ok(());
        }
        let packet = Packet::new(self.buf.split().freeze())
            .with_pts(self.pts)
            .with_kind(self.kind);
        self.count = 0;
        self.output
            .send(packet)
            .map_err(|_| CastError::SinkWrite("packet listener closed".into()))
    }
}

/// Multi-service MPEG-TS muxer.
///
/// Registered streams are written one frame at a time with [`TsMuxer::write`];
/// the resulting 188-byte packets are emitted through the listener channel in
/// batches. PAT/PMT are retransmitted every [`PAT_PACKET_PERIOD`] payload
/// packets and forced ahead of every video key frame; the SDT every
/// [`SDT_PACKET_PERIOD`].
pub struct TsMuxer {
    services: Vec<TsService>,
    output: mpsc::UnboundedSender<Packet>,
    crc: Crc32Mpeg2,
    transport_stream_id: u16,
    pat_version: u8,
    sdt_version: u8,
    pat_continuity: u8,
    sdt_continuity: u8,
    packets_since_pat: u32,
    packets_since_sdt: u32,
    tables_emitted: bool,
    running: bool,
}

impl TsMuxer {
    /// Creates a muxer emitting packet batches through `output`.
    pub fn new(output: mpsc::UnboundedSender<Packet>) -> Self {
        Self {
            services: Vec::new(),
            output,
            crc: Crc32Mpeg2::new(),
            transport_stream_id: 0x0001,
            pat_version: 0,
            sdt_version: 0,
            pat_continuity: 0,
            sdt_continuity: 0,
            packets_since_pat: PAT_PACKET_PERIOD,
            packets_since_sdt: SDT_PACKET_PERIOD,
            tables_emitted: false,
            running: false,
        }
    }

    /// Registers a new service.
    pub fn add_service(&mut self, info: ServiceInfo) -> Result<()> {
        if self.services.iter().any(|s| s.info.id == info.id) {
            return Err(CastError::InvalidConfig(format!(
                "service {:#06x} already registered",
                info.id
            )));
        }
        let pmt_pid = self.allocate_pid()?;
        self.services.push(TsService {
            info,
            pmt_pid,
            pmt_version: 0,
            pmt_continuity: 0,
            pcr_pid: None,
            streams: Vec::new(),
        });
        self.on_structure_changed(true, true)
    }

    /// Unregisters a service; its PIDs become invalid immediately.
    pub fn remove_service(&mut self, info: &ServiceInfo) -> Result<()> {
        let index = self
            .services
            .iter()
            .position(|s| s.info.id == info.id)
            .ok_or_else(|| {
                CastError::InvalidConfig(format!("service {:#06x} not registered", info.id))
            })?;
        self.services.remove(index);
        self.on_structure_changed(true, true)
    }

    /// Adds streams to a service and returns their PIDs in input order.
    pub fn add_streams(
        &mut self,
        service: &ServiceInfo,
        configs: &[StreamConfig],
    ) -> Result<Vec<u16>> {
        let mut pids = Vec::with_capacity(configs.len());
        for config in configs {
            let pid = self.allocate_pid()?;
            let stream = Self::build_stream(config.clone(), pid)?;
            let svc = self.service_mut(service.id)?;
            svc.streams.push(stream);
            svc.recompute_pcr_pid();
            pids.push(pid);
        }
        let bump = self.tables_emitted;
        let svc = self.service_mut(service.id)?;
        if bump {
            svc.pmt_version = (svc.pmt_version + 1) & 0x1F;
        }
        self.on_structure_changed(false, false)?;
        Ok(pids)
    }

    /// Adds a stream to the first registered service.
    pub fn add_stream(&mut self, config: StreamConfig) -> Result<u16> {
        let info = self
            .services
            .first()
            .map(|s| s.info.clone())
            .ok_or_else(|| CastError::NotConfigured("no service registered".into()))?;
        let pids = self.add_streams(&info, std::slice::from_ref(&config))?;
        Ok(pids[0])
    }

    /// Removes streams from a service by PID.
    pub fn remove_streams(&mut self, service: &ServiceInfo, pids: &[u16]) -> Result<()> {
        let bump = self.tables_emitted;
        let svc = self.service_mut(service.id)?;
        svc.streams.retain(|s| !pids.contains(&s.pid));
        svc.recompute_pcr_pid();
        if bump {
            svc.pmt_version = (svc.pmt_version + 1) & 0x1F;
        }
        self.on_structure_changed(false, false)
    }

    /// Starts the muxer; the next write emits fresh tables first.
    pub fn start_stream(&mut self) {
        self.running = true;
        self.packets_since_pat = PAT_PACKET_PERIOD;
        self.packets_since_sdt = SDT_PACKET_PERIOD;
    }

    /// Stops the muxer and clears all services and streams.
    pub fn stop_stream(&mut self) {
        self.running = false;
        self.services.clear();
        self.tables_emitted = false;
    }

    /// Releases the muxer; equivalent to a stop with no restart expected.
    pub fn release(&mut self) {
        self.stop_stream();
    }

    /// Transforms one encoded frame into TS packets on the stream `pid`.
    pub fn write(&mut self, frame: &Frame, pid: u16) -> Result<()> {
        if !self.running {
            return Err(CastError::StateViolation("muxer is not started".into()));
        }
        frame.validate()?;

        let (si, sti) = self.find_stream(pid)?;
        let payload = self.wrap_payload(si, sti, frame)?;

        let is_key_video = frame.mime.is_video() && frame.is_key_frame;
        let kind = if frame.mime.is_video() {
            PacketKind::Video
        } else {
            PacketKind::Audio
        };
        let mut batch = TsBatcher::new(&self.output, frame.pts, kind);

        if is_key_video || self.packets_since_pat >= PAT_PACKET_PERIOD {
            Self::emit_pat_pmt(
                &mut self.services,
                &self.crc,
                self.transport_stream_id,
                self.pat_version,
                &mut self.pat_continuity,
                &mut batch,
            )?;
            self.packets_since_pat = 0;
            self.tables_emitted = true;
        }
        if self.packets_since_sdt >= SDT_PACKET_PERIOD {
            Self::emit_sdt(
                &self.services,
                &self.crc,
                self.transport_stream_id,
                self.sdt_version,
                &mut self.sdt_continuity,
                &mut batch,
            )?;
            self.packets_since_sdt = 0;
        }

        let svc = &self.services[si];
        let stream_id = svc.streams[sti].stream_id;
        let pcr_us = if is_key_video && svc.pcr_pid == Some(pid) {
            Some(frame.pts)
        } else {
            None
        };
        let pes = build_pes(stream_id, &payload, frame.pts, frame.dts)?;
        let written = Self::write_pes_packets(
            &mut self.services[si].streams[sti],
            &pes,
            is_key_video,
            pcr_us,
            &mut batch,
        )?;

        self.packets_since_pat += written;
        self.packets_since_sdt += written;
        batch.flush()
    }

    fn service_mut(&mut self, service_id: u16) -> Result<&mut TsService> {
        self.services
            .iter_mut()
            .find(|s| s.info.id == service_id)
            .ok_or_else(|| {
                CastError::InvalidConfig(format!("service {:#06x} not registered", service_id))
            })
    }

    fn find_stream(&self, pid: u16) -> Result<(usize, usize)> {
        for (si, svc) in self.services.iter().enumerate() {
            if let Some(sti) = svc.streams.iter().position(|s| s.pid == pid) {
                return Ok((si, sti));
            }
        }
        Err(CastError::UnknownStream(format!(
            "no stream with pid {:#06x}",
            pid
        )))
    }

    // Linear scan for the first PID unused by any PMT or elementary stream.
    fn allocate_pid(&self) -> Result<u16> {
        let used: Vec<u16> = self
            .services
            .iter()
            .flat_map(|s| {
                std::iter::once(s.pmt_pid).chain(s.streams.iter().map(|st| st.pid))
            })
            .collect();
        (BASE_PID..=MAX_PID)
            .find(|pid| !used.contains(pid))
            .ok_or_else(|| CastError::Exhausted("TS PID space".into()))
    }

    fn build_stream(config: StreamConfig, pid: u16) -> Result<TsStream> {
        let mime = config.mime();
        let (stream_type, stream_id, descriptors, latm) = match (&config, mime) {
            (_, CodecId::H264) => (STREAM_TYPE_H264, STREAM_ID_VIDEO, Vec::new(), None),
            (_, CodecId::Hevc) => (STREAM_TYPE_H265, STREAM_ID_VIDEO, Vec::new(), None),
            (StreamConfig::Audio(audio), CodecId::Aac) => {
                if audio.aac_profile() == AacProfile::Lc {
                    (STREAM_TYPE_AAC_ADTS, STREAM_ID_AUDIO, Vec::new(), None)
                } else {
                    let asc = AudioSpecificConfig::new(
                        audio.aac_profile().audio_object_type(),
                        audio.sample_rate,
                        audio.channel_count,
                    )?;
                    (
                        STREAM_TYPE_AAC_LATM,
                        STREAM_ID_AUDIO,
                        Vec::new(),
                        Some(LatmWrapper::new(asc)),
                    )
                }
            }
            (StreamConfig::Audio(audio), CodecId::Opus) => (
                STREAM_TYPE_PRIVATE_DATA,
                STREAM_ID_PRIVATE,
                vec![
                    Descriptor {
                        tag: 0x05,
                        data: b"Opus".to_vec(),
                    },
                    Descriptor {
                        tag: 0x7F,
                        data: vec![0x80, audio.channel_count],
                    },
                ],
                None,
            ),
            (_, other) => {
                return Err(CastError::Unsupported(format!(
                    "{} cannot be carried in MPEG-TS",
                    other
                )))
            }
        };
        Ok(TsStream {
            config,
            pid,
            stream_id,
            stream_type,
            descriptors,
            continuity: 0,
            latm,
        })
    }

    fn wrap_payload(&mut self, si: usize, sti: usize, frame: &Frame) -> Result<BytesMut> {
        let stream = &mut self.services[si].streams[sti];
        match frame.mime {
            CodecId::H264 => {
                if !frame.is_key_frame {
                    return Ok(BytesMut::from(&frame.buffer[..]));
                }
                let extra = frame.extra.as_ref().ok_or_else(|| {
                    CastError::MissingCodecConfig("H.264 key frame without SPS/PPS".into())
                })?;
                let mut buf = BytesMut::with_capacity(frame.buffer.len() + 64);
                buf.put_slice(&h264::ACCESS_UNIT_DELIMITER);
                for seq in extra {
                    put_with_start_code(&mut buf, seq);
                }
                buf.put_slice(&frame.buffer);
                Ok(buf)
            }
            CodecId::Hevc => {
                if !frame.is_key_frame {
                    return Ok(BytesMut::from(&frame.buffer[..]));
                }
                let extra = frame.extra.as_ref().ok_or_else(|| {
                    CastError::MissingCodecConfig("HEVC key frame without VPS/SPS/PPS".into())
                })?;
                let mut buf = BytesMut::with_capacity(frame.buffer.len() + 96);
                buf.put_slice(&h265::ACCESS_UNIT_DELIMITER);
                for seq in extra {
                    put_with_start_code(&mut buf, seq);
                }
                buf.put_slice(&frame.buffer);
                Ok(buf)
            }
            CodecId::Aac => match (&stream.config, &mut stream.latm) {
                (_, Some(latm)) => Ok(BytesMut::from(&latm.wrap(&frame.buffer)?[..])),
                (StreamConfig::Audio(audio), None) => {
                    let header = AdtsHeader::for_frame(audio, frame.buffer.len())?;
                    let mut buf = BytesMut::with_capacity(7 + frame.buffer.len());
                    buf.put_slice(&header.to_bytes());
                    buf.put_slice(&frame.buffer);
                    Ok(buf)
                }
                _ => Err(CastError::UnknownStream(
                    "AAC frame on a non-audio stream".into(),
                )),
            },
            CodecId::Opus => {
                let header = opus::control_header(frame.buffer.len());
                let mut buf = BytesMut::with_capacity(header.len() + frame.buffer.len());
                buf.put_slice(&header);
                buf.put_slice(&frame.buffer);
                Ok(buf)
            }
            other => Err(CastError::Unsupported(format!(
                "{} cannot be carried in MPEG-TS",
                other
            ))),
        }
    }

    fn emit_pat_pmt(
        services: &mut [TsService],
        crc: &Crc32Mpeg2,
        transport_stream_id: u16,
        pat_version: u8,
        pat_continuity: &mut u8,
        batch: &mut TsBatcher<'_>,
    ) -> Result<()> {
        let pat = Pat {
            entries: services
                .iter()
                .map(|s| PatEntry {
                    program_number: s.info.id,
                    pmt_pid: s.pmt_pid,
                })
                .collect(),
        };
        let mut body = BytesMut::new();
        pat.write_body(&mut body);
        let section = write_section(crc, TABLE_ID_PAT, transport_stream_id, pat_version, &body);
        *pat_continuity = (*pat_continuity + 1) & 0x0F;
        batch.push(&psi_packet(PID_PAT, *pat_continuity, &section)?)?;

        for service in services.iter_mut() {
            let pmt = Pmt {
                pcr_pid: service.pcr_pid.unwrap_or(0x1FFF),
                program_descriptors: Vec::new(),
                elementary_stream_infos: service
                    .streams
                    .iter()
                    .map(|s| ElementaryStreamInfo {
                        stream_type: s.stream_type,
                        elementary_pid: s.pid,
                        descriptors: s.descriptors.clone(),
                    })
                    .collect(),
            };
            let mut body = BytesMut::new();
            pmt.write_body(&mut body);
            let section =
                write_section(crc, TABLE_ID_PMT, service.info.id, service.pmt_version, &body);
            service.pmt_continuity = (service.pmt_continuity + 1) & 0x0F;
            batch.push(&psi_packet(service.pmt_pid, service.pmt_continuity, &section)?)?;
        }
        Ok(())
    }

    fn emit_sdt(
        services: &[TsService],
        crc: &Crc32Mpeg2,
        transport_stream_id: u16,
        sdt_version: u8,
        sdt_continuity: &mut u8,
        batch: &mut TsBatcher<'_>,
    ) -> Result<()> {
        let sdt = Sdt {
            original_network_id: 0xFF01,
            services: services
                .iter()
                .map(|s| SdtService {
                    service_id: s.info.id,
                    service_type: s.info.service_type.value(),
                    provider_name: s.info.provider_name.clone(),
                    service_name: s.info.name.clone(),
                })
                .collect(),
        };
        let mut body = BytesMut::new();
        sdt.write_body(&mut body);
        let section = write_section(crc, TABLE_ID_SDT, transport_stream_id, sdt_version, &body);
        *sdt_continuity = (*sdt_continuity + 1) & 0x0F;
        batch.push(&psi_packet(PID_SDT, *sdt_continuity, &section)?)
    }

    fn write_pes_packets(
        stream: &mut TsStream,
        pes: &[u8],
        key: bool,
        pcr_us: Option<i64>,
        batch: &mut TsBatcher<'_>,
    ) -> Result<u32> {
        let mut remaining = pes;
        let mut first = true;
        let mut written = 0u32;

        while !remaining.is_empty() {
            let pcr = if first { pcr_us } else { None };
            let mut af_size = if pcr.is_some() { 8 } else { 0 };

            let mut payload_len = remaining.len().min(184 - af_size);
            let total = 4 + af_size + payload_len;
            if total < TS_PACKET_SIZE {
                let stuffing = TS_PACKET_SIZE - total;
                af_size += stuffing;
                payload_len = 184 - af_size;
            }

            stream.continuity = (stream.continuity + 1) & 0x0F;
            let mut packet = BytesMut::with_capacity(TS_PACKET_SIZE);
            TsHeader {
                payload_unit_start: first,
                pid: stream.pid,
                adaptation_field_exists: af_size > 0,
                contains_payload: true,
                continuity_counter: stream.continuity,
            }
            .write_to(&mut packet)?;

            if af_size > 0 {
                packet.put_u8((af_size - 1) as u8);
                if af_size > 1 {
                    let mut flags = 0u8;
                    if pcr.is_some() {
                        flags |= 0x10;
                    }
                    if first && key {
                        flags |= 0x40; // random access indicator
                    }
                    packet.put_u8(flags);
                    if let Some(us) = pcr {
                        let (base, ext) = pcr_base_ext(us);
                        let value = (base << 15) | (0x3F << 9) | ext;
                        packet.put_uint(value, 6);
                    }
                    while packet.len() < 4 + af_size {
                        packet.put_u8(0xFF);
                    }
                }
            }

            packet.put_slice(&remaining[..payload_len]);
            debug_assert_eq!(packet.len(), TS_PACKET_SIZE);
            batch.push(&packet)?;

            remaining = &remaining[payload_len..];
            first = false;
            written += 1;
        }

        Ok(written)
    }

    // Structural changes bump table versions and, while running, re-emit
    // the affected tables right away.
    fn on_structure_changed(&mut self, pat: bool, sdt: bool) -> Result<()> {
        if self.tables_emitted {
            if pat {
                self.pat_version = (self.pat_version + 1) & 0x1F;
            }
            if sdt {
                self.sdt_version = (self.sdt_version + 1) & 0x1F;
            }
        }
        if self.running && self.tables_emitted {
            let mut batch = TsBatcher::new(&self.output, 0, PacketKind::Metadata);
            Self::emit_pat_pmt(
                &mut self.services,
                &self.crc,
                self.transport_stream_id,
                self.pat_version,
                &mut self.pat_continuity,
                &mut batch,
            )?;
            self.packets_since_pat = 0;
            Self::emit_sdt(
                &self.services,
                &self.crc,
                self.transport_stream_id,
                self.sdt_version,
                &mut self.sdt_continuity,
                &mut batch,
            )?;
            self.packets_since_sdt = 0;
            batch.flush()?;
        }
        Ok(())
    }
}

// One PSI section in one TS packet: pointer field, section bytes, 0xFF fill.
fn psi_packet(pid: u16, continuity: u8, section: &[u8]) -> Result<BytesMut> {
    if section.len() > TS_PACKET_SIZE - 5 {
        return Err(CastError::Exhausted(format!(
            "PSI section of {} bytes does not fit one TS packet",
            section.len()
        )));
    }
    let mut packet = BytesMut::with_capacity(TS_PACKET_SIZE);
    TsHeader {
        payload_unit_start: true,
        pid,
        adaptation_field_exists: false,
        contains_payload: true,
        continuity_counter: continuity,
    }
    .write_to(&mut packet)?;
    packet.put_u8(0); // pointer field
    packet.put_slice(section);
    while packet.len() < TS_PACKET_SIZE {
        packet.put_u8(0xFF);
    }
    Ok(packet)
}
