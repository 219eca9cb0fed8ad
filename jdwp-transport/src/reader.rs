// Helpers for reading JDWP data types from reply and event buffers

use crate::protocol::{JdwpError, JdwpResult};
use crate::types::{Location, Value, ValueData};
use bytes::Buf;

fn need(buf: &&[u8], bytes: usize, what: &str) -> JdwpResult<()> {
    if buf.remaining() < bytes {
        return Err(JdwpError::Protocol(format!(
            "not enough data for {}: need {}, have {}",
            what,
            bytes,
            buf.remaining()
        )));
    }
    Ok(())
}

pub fn read_u8(buf: &mut &[u8]) -> JdwpResult<u8> {
    need(buf, 1, "u8")?;
    Ok(buf.get_u8())
}

pub fn read_u32(buf: &mut &[u8]) -> JdwpResult<u32> {
    need(buf, 4, "u32")?;
    Ok(buf.get_u32())
}

pub fn read_i32(buf: &mut &[u8]) -> JdwpResult<i32> {
    need(buf, 4, "i32")?;
    Ok(buf.get_i32())
}

pub fn read_u64(buf: &mut &[u8]) -> JdwpResult<u64> {
    need(buf, 8, "u64")?;
    Ok(buf.get_u64())
}

/// Read a JDWP string (4-byte length prefix + UTF-8 bytes).
pub fn read_string(buf: &mut &[u8]) -> JdwpResult<String> {
    let len = read_u32(buf)? as usize;
    need(buf, len, "string body")?;

    let bytes = &buf[..len];
    let text = String::from_utf8(bytes.to_vec())
        .map_err(|e| JdwpError::Protocol(format!("invalid UTF-8 in string: {}", e)))?;
    buf.advance(len);
    Ok(text)
}

/// Read a location: type tag, class id, method id, bytecode index.
pub fn read_location(buf: &mut &[u8]) -> JdwpResult<Location> {
    let type_tag = read_u8(buf)?;
    let class_id = read_u64(buf)?;
    let method_id = read_u64(buf)?;
    let index = read_u64(buf)?;

    Ok(Location {
        type_tag,
        class_id,
        method_id,
        index,
    })
}

/// Read a tagged value (1-byte tag followed by the tag-specific payload).
pub fn read_tagged_value(buf: &mut &[u8]) -> JdwpResult<Value> {
    let tag = read_u8(buf)?;
    let data = match tag {
        // 'B' byte
        66 => {
            need(buf, 1, "byte value")?;
            ValueData::Byte(buf.get_i8())
        }
        // 'C' char
        67 => {
            need(buf, 2, "char value")?;
            ValueData::Char(buf.get_u16())
        }
        // 'D' double
        68 => {
            need(buf, 8, "double value")?;
            ValueData::Double(buf.get_f64())
        }
        // 'F' float
        70 => {
            need(buf, 4, "float value")?;
            ValueData::Float(buf.get_f32())
        }
        // 'I' int
        73 => {
            need(buf, 4, "int value")?;
            ValueData::Int(buf.get_i32())
        }
        // 'J' long
        74 => {
            need(buf, 8, "long value")?;
            ValueData::Long(buf.get_i64())
        }
        // 'S' short
        83 => {
            need(buf, 2, "short value")?;
            ValueData::Short(buf.get_i16())
        }
        // 'Z' boolean
        90 => {
            need(buf, 1, "boolean value")?;
            ValueData::Boolean(buf.get_u8() != 0)
        }
        // 'V' void
        86 => ValueData::Void,
        // object-like tags: L, s, t, g, l, c, [
        76 | 115 | 116 | 103 | 108 | 99 | 91 => ValueData::Object(read_u64(buf)?),
        _ => {
            return Err(JdwpError::Protocol(format!("unknown value tag: {}", tag)));
        }
    };

    Ok(Value { tag, data })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_string_consumes_prefix_and_body() {
        let raw = [0u8, 0, 0, 4, b'm', b'a', b'i', b'n', 0xff];
        let mut buf = &raw[..];
        assert_eq!(read_string(&mut buf).unwrap(), "main");
        assert_eq!(buf, &[0xff]);
    }

    #[test]
    fn read_string_rejects_truncated_body() {
        let raw = [0u8, 0, 0, 9, b'x'];
        let mut buf = &raw[..];
        assert!(read_string(&mut buf).is_err());
    }

    #[test]
    fn tagged_int_value() {
        let raw = [73u8, 0, 0, 0, 42];
        let mut buf = &raw[..];
        let value = read_tagged_value(&mut buf).unwrap();
        assert!(matches!(value.data, ValueData::Int(42)));
    }

    #[test]
    fn tagged_void_value_has_no_payload() {
        let raw = [86u8];
        let mut buf = &raw[..];
        let value = read_tagged_value(&mut buf).unwrap();
        assert!(matches!(value.data, ValueData::Void));
        assert!(buf.is_empty());
    }
}
