//! # H.265/HEVC Payload Handling
//!
//! The HEVC counterparts of the H.264 helpers: NAL classification over the
//! two-byte NAL header, the HEVC access-unit delimiter, parameter-set
//! splitting (VPS/SPS/PPS) and the HEVCDecoderConfigurationRecord used by
//! FLV extended video tags.

use crate::error::{CastError, Result};
use crate::utils::nal::split_nal_units;
use crate::utils::BitReader;
use bytes::{BufMut, Bytes, BytesMut};

/// Access-unit delimiter NAL with its Annex-B start code.
pub const ACCESS_UNIT_DELIMITER: [u8; 7] = [0x00, 0x00, 0x00, 0x01, 0x46, 0x01, 0x50];

/// Extracts the 6-bit NAL unit type from the first NAL header byte.
pub fn nal_type(header: u8) -> u8 {
    (header >> 1) & 0x3F
}

/// HEVC NAL unit types the muxers care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NalUnitType {
    /// IDR with RADL pictures
    IdrWRadl,
    /// IDR without leading pictures
    IdrNLp,
    /// Video parameter set
    Vps,
    /// Sequence parameter set
    Sps,
    /// Picture parameter set
    Pps,
    /// Access unit delimiter
    AccessUnitDelimiter,
    /// Prefix SEI
    PrefixSei,
    /// Suffix SEI
    SuffixSei,
    /// Anything else
    Other(u8),
}

impl From<u8> for NalUnitType {
    fn from(value: u8) -> Self {
        match value {
            19 => NalUnitType::IdrWRadl,
            20 => NalUnitType::IdrNLp,
            32 => NalUnitType::Vps,
            33 => NalUnitType::Sps,
            34 => NalUnitType::Pps,
            35 => NalUnitType::AccessUnitDelimiter,
            39 => NalUnitType::PrefixSei,
            40 => NalUnitType::SuffixSei,
            other => NalUnitType::Other(other),
        }
    }
}

impl NalUnitType {
    /// True for VPS/SPS/PPS/SEI units, which carry no picture data.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            NalUnitType::Vps
                | NalUnitType::Sps
                | NalUnitType::Pps
                | NalUnitType::PrefixSei
                | NalUnitType::SuffixSei
        )
    }
}

/// True when an Annex-B payload contains only configuration NAL units.
pub fn is_configuration_payload(payload: &[u8]) -> bool {
    let units = split_nal_units(payload);
    !units.is_empty()
        && units
            .iter()
            .all(|u| !u.is_empty() && NalUnitType::from(nal_type(u[0])).is_configuration())
}

/// Splits extra data into VPS, SPS and PPS lists (start codes tolerated).
pub fn split_parameter_sets(extra: &[Bytes]) -> (Vec<&[u8]>, Vec<&[u8]>, Vec<&[u8]>) {
    let mut vps = Vec::new();
    let mut sps = Vec::new();
    let mut pps = Vec::new();
    for seq in extra {
        for unit in split_nal_units(seq) {
            if unit.is_empty() {
                continue;
            }
            match NalUnitType::from(nal_type(unit[0])) {
                NalUnitType::Vps => vps.push(unit),
                NalUnitType::Sps => sps.push(unit),
                NalUnitType::Pps => pps.push(unit),
                _ => {}
            }
        }
    }
    (vps, sps, pps)
}

/// The profile_tier_level fields the configuration record repeats.
struct ProfileTierLevel {
    profile_space: u8,
    tier_flag: bool,
    profile_idc: u8,
    compatibility_flags: u32,
    constraint_flags: u64,
    level_idc: u8,
}

// The PTL sits right after the fixed SPS prefix: 2-byte NAL header,
// sps_video_parameter_set_id(4), sps_max_sub_layers_minus1(3),
// sps_temporal_id_nesting_flag(1).
fn parse_profile_tier_level(sps: &[u8]) -> Result<ProfileTierLevel> {
    if sps.len() < 15 {
        return Err(CastError::InvalidData("truncated HEVC SPS".into()));
    }
    let mut reader = BitReader::new(&sps[2..]);
    reader.skip_bits(8)?;

    let profile_space = reader.read_bits(2)? as u8;
    let tier_flag = reader.read_bool()?;
    let profile_idc = reader.read_bits(5)? as u8;
    let compatibility_flags = reader.read_bits(32)?;
    let constraint_hi = reader.read_bits(16)? as u64;
    let constraint_lo = reader.read_bits(32)? as u64;
    let level_idc = reader.read_bits(8)? as u8;

    Ok(ProfileTierLevel {
        profile_space,
        tier_flag,
        profile_idc,
        compatibility_flags,
        constraint_flags: (constraint_hi << 32) | constraint_lo,
        level_idc,
    })
}

/// Builds the HEVCDecoderConfigurationRecord for an FLV extended video
/// sequence header. Requires at least one VPS, SPS and PPS.
pub fn decoder_configuration_record(extra: &[Bytes]) -> Result<Vec<u8>> {
    let (vps_list, sps_list, pps_list) = split_parameter_sets(extra);
    if vps_list.is_empty() || sps_list.is_empty() || pps_list.is_empty() {
        return Err(CastError::MissingCodecConfig(
            "hevc configuration record needs VPS, SPS and PPS".into(),
        ));
    }
    let ptl = parse_profile_tier_level(sps_list[0])?;

    let mut buf = BytesMut::new();
    buf.put_u8(1); // configurationVersion
    buf.put_u8((ptl.profile_space << 6) | ((ptl.tier_flag as u8) << 5) | ptl.profile_idc);
    buf.put_u32(ptl.compatibility_flags);
    buf.put_uint(ptl.constraint_flags, 6);
    buf.put_u8(ptl.level_idc);
    buf.put_u16(0xF000); // min_spatial_segmentation_idc = 0
    buf.put_u8(0xFC); // parallelismType = 0
    buf.put_u8(0xFD); // chromaFormat = 1 (4:2:0)
    buf.put_u8(0xF8); // bitDepthLumaMinus8 = 0
    buf.put_u8(0xF8); // bitDepthChromaMinus8 = 0
    buf.put_u16(0); // avgFrameRate
    // constantFrameRate = 0, numTemporalLayers = 1, temporalIdNested = 1,
    // lengthSizeMinusOne = 3
    buf.put_u8(0x0F);

    let arrays: [(u8, &[&[u8]]); 3] = [
        (32, &vps_list),
        (33, &sps_list),
        (34, &pps_list),
    ];
    buf.put_u8(arrays.len() as u8);
    for (nal_unit_type, list) in arrays {
        buf.put_u8(0x80 | nal_unit_type); // array_completeness set
        buf.put_u16(list.len() as u16);
        for unit in list {
            buf.put_u16(unit.len() as u16);
            buf.put_slice(unit);
        }
    }

    Ok(buf.to_vec())
}
