//! Minimal AMF0 serialization, just enough for the `onMetaData` script tag.

use bytes::{BufMut, BytesMut};

/// An AMF0 value the metadata writer can emit.
#[derive(Debug, Clone)]
pub enum Amf0Value {
    /// IEEE-754 double
    Number(f64),
    /// Boolean
    Boolean(bool),
    /// UTF-8 string (short form)
    String(String),
}

/// Writes an AMF0 string marker and value.
pub fn put_string(buf: &mut BytesMut, value: &str) {
    buf.put_u8(0x02);
    put_string_payload(buf, value);
}

/// Writes an AMF0 number marker and value.
pub fn put_number(buf: &mut BytesMut, value: f64) {
    buf.put_u8(0x00);
    buf.put_f64(value);
}

/// Writes an AMF0 boolean marker and value.
pub fn put_bool(buf: &mut BytesMut, value: bool) {
    buf.put_u8(0x01);
    buf.put_u8(value as u8);
}

/// Writes an AMF0 ECMA array of named values, with the object end marker.
pub fn put_ecma_array(buf: &mut BytesMut, entries: &[(&str, Amf0Value)]) {
    buf.put_u8(0x08);
    buf.put_u32(entries.len() as u32);
    for (key, value) in entries {
        put_string_payload(buf, key);
        match value {
            Amf0Value::Number(n) => put_number(buf, *n),
            Amf0Value::Boolean(b) => put_bool(buf, *b),
            Amf0Value::String(s) => put_string(buf, s),
        }
    }
    // object end: empty key + end marker
    buf.put_u16(0);
    buf.put_u8(0x09);
}

fn put_string_payload(buf: &mut BytesMut, value: &str) {
    buf.put_u16(value.len() as u16);
    buf.put_slice(value.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_encoding() {
        let mut buf = BytesMut::new();
        put_string(&mut buf, "onMetaData");
        assert_eq!(buf[0], 0x02);
        assert_eq!(u16::from_be_bytes([buf[1], buf[2]]), 10);
        assert_eq!(&buf[3..], b"onMetaData");
    }

    #[test]
    fn test_ecma_array_end_marker() {
        let mut buf = BytesMut::new();
        put_ecma_array(
            &mut buf,
            &[
                ("duration", Amf0Value::Number(0.0)),
                ("stereo", Amf0Value::Boolean(true)),
            ],
        );
        assert_eq!(buf[0], 0x08);
        assert_eq!(u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]), 2);
        assert_eq!(&buf[buf.len() - 3..], &[0x00, 0x00, 0x09]);
    }
}
