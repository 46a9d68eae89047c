//! # H.264/AVC Payload Handling
//!
//! The muxers need a small amount of H.264 bitstream knowledge: NAL unit
//! classification (to detect configuration-only frames and parameter sets),
//! the access-unit delimiter each TS access unit is prefixed with, and the
//! AVCDecoderConfigurationRecord FLV sequence headers carry.
//!
//! ```rust
//! use castio::codec::h264::{nal_type, NalUnitType};
//!
//! let idr_nal = [0x65, 0x88, 0x84];
//! assert_eq!(NalUnitType::from(nal_type(idr_nal[0])), NalUnitType::CodedSliceIdr);
//! ```

use crate::error::{CastError, Result};
use crate::utils::nal::split_nal_units;
use bytes::{BufMut, Bytes, BytesMut};

/// Access-unit delimiter NAL with its Annex-B start code, prepended to
/// every key-frame access unit in MPEG-TS.
pub const ACCESS_UNIT_DELIMITER: [u8; 6] = [0x00, 0x00, 0x00, 0x01, 0x09, 0xF0];

/// Extracts the 5-bit NAL unit type from a NAL header byte.
pub fn nal_type(header: u8) -> u8 {
    header & 0x1F
}

/// H.264 NAL unit types the muxers care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NalUnitType {
    /// Coded slice of a non-IDR picture
    CodedSliceNonIdr,
    /// Coded slice of an IDR picture
    CodedSliceIdr,
    /// Supplemental enhancement information
    Sei,
    /// Sequence parameter set
    Sps,
    /// Picture parameter set
    Pps,
    /// Access unit delimiter
    AccessUnitDelimiter,
    /// Anything else
    Other(u8),
}

impl From<u8> for NalUnitType {
    fn from(value: u8) -> Self {
        match value {
            1 => NalUnitType::CodedSliceNonIdr,
            5 => NalUnitType::CodedSliceIdr,
            6 => NalUnitType::Sei,
            7 => NalUnitType::Sps,
            8 => NalUnitType::Pps,
            9 => NalUnitType::AccessUnitDelimiter,
            other => NalUnitType::Other(other),
        }
    }
}

impl NalUnitType {
    /// True for SPS/PPS/SEI units, which carry no picture data.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            NalUnitType::Sps | NalUnitType::Pps | NalUnitType::Sei
        )
    }
}

/// True when an Annex-B payload contains only configuration NAL units.
///
/// Encoders emit such buffers once at stream start; the router drops them
/// because the muxers take codec config from frame extra data instead.
pub fn is_configuration_payload(payload: &[u8]) -> bool {
    let units = split_nal_units(payload);
    !units.is_empty()
        && units
            .iter()
            .all(|u| !u.is_empty() && NalUnitType::from(nal_type(u[0])).is_configuration())
}

/// Splits extra data into SPS and PPS lists (start codes tolerated).
pub fn split_parameter_sets(extra: &[Bytes]) -> (Vec<&[u8]>, Vec<&[u8]>) {
    let mut sps = Vec::new();
    let mut pps = Vec::new();
    for seq in extra {
        for unit in split_nal_units(seq) {
            if unit.is_empty() {
                continue;
            }
            match NalUnitType::from(nal_type(unit[0])) {
                NalUnitType::Sps => sps.push(unit),
                NalUnitType::Pps => pps.push(unit),
                _ => {}
            }
        }
    }
    (sps, pps)
}

/// Builds the AVCDecoderConfigurationRecord for an FLV sequence header.
///
/// Requires at least one SPS and one PPS; profile, compatibility and level
/// come from the first SPS.
pub fn decoder_configuration_record(extra: &[Bytes]) -> Result<Vec<u8>> {
    let (sps_list, pps_list) = split_parameter_sets(extra);
    if sps_list.is_empty() || pps_list.is_empty() {
        return Err(CastError::MissingCodecConfig(
            "avc configuration record needs SPS and PPS".into(),
        ));
    }
    let first_sps = sps_list[0];
    if first_sps.len() < 4 {
        return Err(CastError::InvalidData("truncated SPS".into()));
    }

    let mut buf = BytesMut::new();
    buf.put_u8(1); // configurationVersion
    buf.put_u8(first_sps[1]); // AVCProfileIndication
    buf.put_u8(first_sps[2]); // profile_compatibility
    buf.put_u8(first_sps[3]); // AVCLevelIndication
    buf.put_u8(0xFF); // lengthSizeMinusOne = 3

    buf.put_u8(0xE0 | (sps_list.len() as u8 & 0x1F));
    for sps in &sps_list {
        buf.put_u16(sps.len() as u16);
        buf.put_slice(sps);
    }
    buf.put_u8(pps_list.len() as u8);
    for pps in &pps_list {
        buf.put_u16(pps.len() as u16);
        buf.put_slice(pps);
    }

    Ok(buf.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPS: [u8; 8] = [0x67, 0x64, 0x00, 0x1F, 0xAC, 0xD9, 0x40, 0x50];
    const PPS: [u8; 4] = [0x68, 0xEB, 0xE3, 0xCB];

    #[test]
    fn test_nal_type_classification() {
        assert_eq!(NalUnitType::from(nal_type(0x65)), NalUnitType::CodedSliceIdr);
        assert_eq!(NalUnitType::from(nal_type(0x41)), NalUnitType::CodedSliceNonIdr);
        assert_eq!(NalUnitType::from(nal_type(0x67)), NalUnitType::Sps);
        assert_eq!(NalUnitType::from(nal_type(0x68)), NalUnitType::Pps);
    }

    #[test]
    fn test_configuration_payload_detection() {
        let mut config_only = Vec::new();
        config_only.extend_from_slice(&[0, 0, 0, 1]);
        config_only.extend_from_slice(&SPS);
        config_only.extend_from_slice(&[0, 0, 0, 1]);
        config_only.extend_from_slice(&PPS);
        assert!(is_configuration_payload(&config_only));

        let mut with_slice = config_only.clone();
        with_slice.extend_from_slice(&[0, 0, 0, 1, 0x65, 0x88]);
        assert!(!is_configuration_payload(&with_slice));
    }

    #[test]
    fn test_decoder_configuration_record() {
        let extra = vec![Bytes::from_static(&SPS), Bytes::from_static(&PPS)];
        let record = decoder_configuration_record(&extra).unwrap();

        assert_eq!(record[0], 1);
        assert_eq!(record[1], 0x64); // profile from SPS
        assert_eq!(record[3], 0x1F); // level from SPS
        assert_eq!(record[5], 0xE1); // one SPS
        let sps_len = u16::from_be_bytes([record[6], record[7]]) as usize;
        assert_eq!(sps_len, SPS.len());
        assert_eq!(&record[8..8 + sps_len], &SPS);
    }

    #[test]
    fn test_decoder_configuration_record_requires_both_sets() {
        let only_sps = vec![Bytes::from_static(&SPS)];
        assert!(matches!(
            decoder_configuration_record(&only_sps),
            Err(CastError::MissingCodecConfig(_))
        ));
    }
}
