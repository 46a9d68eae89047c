//! Annex-B byte stream helpers for H.264/HEVC payloads.
//!
//! Encoders surface parameter sets and access units either as raw NAL bytes
//! or with `00 00 00 01` / `00 00 01` start codes already attached. The
//! muxers need to detect, strip and re-attach those prefixes when building
//! container payloads.

use bytes::{BufMut, BytesMut};

/// Returns the size of the Annex-B start code at the beginning of `data`,
/// or `None` if the data does not start with one.
pub fn start_code_size(data: &[u8]) -> Option<usize> {
    if data.len() >= 4 && data[0] == 0 && data[1] == 0 && data[2] == 0 && data[3] == 1 {
        Some(4)
    } else if data.len() >= 3 && data[0] == 0 && data[1] == 0 && data[2] == 1 {
        Some(3)
    } else {
        None
    }
}

/// True if `data` begins with an Annex-B start code.
pub fn has_start_code(data: &[u8]) -> bool {
    start_code_size(data).is_some()
}

/// Returns `data` with a leading Annex-B start code removed, if present.
pub fn strip_start_code(data: &[u8]) -> &[u8] {
    match start_code_size(data) {
        Some(n) => &data[n..],
        None => data,
    }
}

/// Appends `nal` to `buf`, prefixing a 4-byte start code unless the data
/// already carries one.
pub fn put_with_start_code(buf: &mut BytesMut, nal: &[u8]) {
    if !has_start_code(nal) {
        buf.put_slice(&[0x00, 0x00, 0x00, 0x01]);
    }
    buf.put_slice(nal);
}

/// Splits an Annex-B byte stream into its NAL units (start codes removed).
///
/// Data without any start code is returned as a single unit.
pub fn split_nal_units(data: &[u8]) -> Vec<&[u8]> {
    let mut units = Vec::new();
    let Some(first) = start_code_size(data) else {
        if !data.is_empty() {
            units.push(data);
        }
        return units;
    };

    let mut start = first;
    let mut i = first;
    while i + 2 < data.len() {
        if data[i] == 0 && data[i + 1] == 0 && (data[i + 2] == 1 || (i + 3 < data.len() && data[i + 2] == 0 && data[i + 3] == 1)) {
            let code = if data[i + 2] == 1 { 3 } else { 4 };
            if i > start {
                units.push(&data[start..i]);
            }
            i += code;
            start = i;
        } else {
            i += 1;
        }
    }
    if start < data.len() {
        units.push(&data[start..]);
    }
    units
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_code_size() {
        assert_eq!(start_code_size(&[0, 0, 0, 1, 0x65]), Some(4));
        assert_eq!(start_code_size(&[0, 0, 1, 0x65]), Some(3));
        assert_eq!(start_code_size(&[0x65, 0, 0]), None);
        assert_eq!(start_code_size(&[0, 0]), None);
    }

    #[test]
    fn test_strip_start_code() {
        assert_eq!(strip_start_code(&[0, 0, 0, 1, 0x67, 0x42]), &[0x67, 0x42]);
        assert_eq!(strip_start_code(&[0, 0, 1, 0x68]), &[0x68]);
        assert_eq!(strip_start_code(&[0x68, 0x01]), &[0x68, 0x01]);
    }

    #[test]
    fn test_put_with_start_code() {
        let mut buf = BytesMut::new();
        put_with_start_code(&mut buf, &[0x67, 0x42]);
        assert_eq!(&buf[..], &[0, 0, 0, 1, 0x67, 0x42]);

        let mut buf = BytesMut::new();
        put_with_start_code(&mut buf, &[0, 0, 1, 0x68]);
        assert_eq!(&buf[..], &[0, 0, 1, 0x68]);
    }

    #[test]
    fn test_split_nal_units() {
        let stream = [
            0u8, 0, 0, 1, 0x67, 0xAA, // SPS
            0, 0, 0, 1, 0x68, 0xBB, // PPS
            0, 0, 1, 0x65, 0xCC, 0xDD, // IDR slice, 3-byte code
        ];
        let units = split_nal_units(&stream);
        assert_eq!(units.len(), 3);
        assert_eq!(units[0], &[0x67, 0xAA]);
        assert_eq!(units[1], &[0x68, 0xBB]);
        assert_eq!(units[2], &[0x65, 0xCC, 0xDD]);
    }

    #[test]
    fn test_split_without_start_code() {
        let units = split_nal_units(&[0x65, 0x01, 0x02]);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0], &[0x65, 0x01, 0x02]);
    }
}
