//! Order-preserving key encoding.
//!
//! Row keys are the encoded identity value of the row. Link-table keys are the
//! encoded source key followed by the encoded target key, so all links of one
//! source can be read with a prefix scan.
//!
//! Key format: `[tag (1 byte)][payload]`
//!
//! Integers are stored big-endian with the sign bit flipped so that
//! lexicographic ordering matches numeric ordering. Strings and bytes are
//! terminated by `0x00 0x00`, with embedded zero bytes escaped as
//! `0x00 0xFF`, which keeps every encoding self-delimiting.

use crate::error::Error;
use slimfetch_proto::Value;

const TAG_BOOL: u8 = 0x01;
const TAG_INT32: u8 = 0x02;
const TAG_INT64: u8 = 0x03;
const TAG_STRING: u8 = 0x04;
const TAG_BYTES: u8 = 0x05;
const TAG_TIMESTAMP: u8 = 0x06;
const TAG_UUID: u8 = 0x07;

/// Encode a key value.
pub fn encode_key(value: &Value) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::with_capacity(17);
    encode_into(&mut buf, value)?;
    Ok(buf)
}

/// Decode a key produced by [`encode_key`].
pub fn decode_key(bytes: &[u8]) -> Result<Value, Error> {
    let (value, read) = decode_prefix(bytes)?;
    if read != bytes.len() {
        return Err(Error::InvalidKey("trailing bytes after key".into()));
    }
    Ok(value)
}

/// Encode a link-table key for a `(source, target)` pair.
pub fn encode_link(source: &Value, target: &Value) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::with_capacity(34);
    encode_into(&mut buf, source)?;
    encode_into(&mut buf, target)?;
    Ok(buf)
}

/// Decode a link-table key back into its `(source, target)` pair.
pub fn decode_link(bytes: &[u8]) -> Result<(Value, Value), Error> {
    let (source, read) = decode_prefix(bytes)?;
    let target = decode_key(&bytes[read..])?;
    Ok((source, target))
}

fn encode_into(buf: &mut Vec<u8>, value: &Value) -> Result<(), Error> {
    match value {
        Value::Bool(b) => {
            buf.push(TAG_BOOL);
            buf.push(u8::from(*b));
        }
        Value::Int32(n) => {
            buf.push(TAG_INT32);
            buf.extend_from_slice(&((*n as u32) ^ (1 << 31)).to_be_bytes());
        }
        Value::Int64(n) => {
            buf.push(TAG_INT64);
            buf.extend_from_slice(&((*n as u64) ^ (1 << 63)).to_be_bytes());
        }
        Value::Timestamp(n) => {
            buf.push(TAG_TIMESTAMP);
            buf.extend_from_slice(&((*n as u64) ^ (1 << 63)).to_be_bytes());
        }
        Value::String(s) => {
            buf.push(TAG_STRING);
            escape_into(buf, s.as_bytes());
        }
        Value::Bytes(b) => {
            buf.push(TAG_BYTES);
            escape_into(buf, b);
        }
        Value::Uuid(u) => {
            buf.push(TAG_UUID);
            buf.extend_from_slice(u);
        }
        Value::Null | Value::Float64(_) => {
            return Err(Error::InvalidKey(format!(
                "{} values cannot be used as keys",
                value.type_name()
            )))
        }
    }
    Ok(())
}

fn escape_into(buf: &mut Vec<u8>, bytes: &[u8]) {
    for &b in bytes {
        buf.push(b);
        if b == 0 {
            buf.push(0xFF);
        }
    }
    buf.extend_from_slice(&[0, 0]);
}

fn unescape(bytes: &[u8]) -> Result<(Vec<u8>, usize), Error> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == 0 {
            match bytes.get(i + 1) {
                Some(0) => return Ok((out, i + 2)),
                Some(0xFF) => {
                    out.push(0);
                    i += 2;
                    continue;
                }
                _ => return Err(Error::InvalidKey("bad escape sequence".into())),
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    Err(Error::InvalidKey("unterminated key component".into()))
}

fn fixed<const N: usize>(bytes: &[u8]) -> Result<[u8; N], Error> {
    bytes
        .get(1..1 + N)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| Error::InvalidKey("truncated key".into()))
}

/// Decode one key component, returning it and the number of bytes read.
fn decode_prefix(bytes: &[u8]) -> Result<(Value, usize), Error> {
    let tag = *bytes
        .first()
        .ok_or_else(|| Error::InvalidKey("empty key".into()))?;

    match tag {
        TAG_BOOL => {
            let [b] = fixed::<1>(bytes)?;
            Ok((Value::Bool(b != 0), 2))
        }
        TAG_INT32 => {
            let raw = u32::from_be_bytes(fixed(bytes)?) ^ (1 << 31);
            Ok((Value::Int32(raw as i32), 5))
        }
        TAG_INT64 => {
            let raw = u64::from_be_bytes(fixed(bytes)?) ^ (1 << 63);
            Ok((Value::Int64(raw as i64), 9))
        }
        TAG_TIMESTAMP => {
            let raw = u64::from_be_bytes(fixed(bytes)?) ^ (1 << 63);
            Ok((Value::Timestamp(raw as i64), 9))
        }
        TAG_UUID => Ok((Value::Uuid(fixed(bytes)?), 17)),
        TAG_STRING => {
            let (raw, read) = unescape(&bytes[1..])?;
            let s = String::from_utf8(raw)
                .map_err(|_| Error::InvalidKey("invalid UTF-8 in key".into()))?;
            Ok((Value::String(s), 1 + read))
        }
        TAG_BYTES => {
            let (raw, read) = unescape(&bytes[1..])?;
            Ok((Value::Bytes(raw), 1 + read))
        }
        other => Err(Error::InvalidKey(format!("unknown key tag {}", other))),
    }
}

/// Get current timestamp in microseconds since Unix epoch.
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_key() {
        for value in [
            Value::Int32(-5),
            Value::Int64(i64::MAX),
            Value::String("a\0b".into()),
            Value::Bytes(vec![0, 0, 1]),
            Value::Uuid([9; 16]),
            Value::Bool(true),
        ] {
            let encoded = encode_key(&value).unwrap();
            assert_eq!(decode_key(&encoded).unwrap(), value);
        }
    }

    #[test]
    fn test_integer_ordering() {
        let keys: Vec<_> = [-100i32, -1, 0, 1, 100]
            .iter()
            .map(|n| encode_key(&Value::Int32(*n)).unwrap())
            .collect();

        // Lexicographic ordering should match numeric ordering
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_string_ordering() {
        let a = encode_key(&Value::String("ab".into())).unwrap();
        let b = encode_key(&Value::String("abc".into())).unwrap();
        let c = encode_key(&Value::String("b".into())).unwrap();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_link_prefix() {
        let source = Value::String("x".into());
        let prefix = encode_key(&source).unwrap();
        let link = encode_link(&source, &Value::Int32(3)).unwrap();
        let other = encode_link(&Value::String("xy".into()), &Value::Int32(3)).unwrap();

        assert!(link.starts_with(&prefix));
        assert!(!other.starts_with(&prefix));
        assert_eq!(decode_link(&link).unwrap(), (source, Value::Int32(3)));
    }

    #[test]
    fn test_unsupported_keys() {
        assert!(matches!(encode_key(&Value::Null), Err(Error::InvalidKey(_))));
        assert!(matches!(
            encode_key(&Value::Float64(1.0)),
            Err(Error::InvalidKey(_))
        ));
    }

    #[test]
    fn test_decode_invalid() {
        assert!(decode_key(&[]).is_err());
        assert!(decode_key(&[TAG_INT32, 0, 0]).is_err());
        assert!(decode_key(&[TAG_STRING, b'a']).is_err());
        assert!(decode_key(&[0x7F]).is_err());
    }
}
