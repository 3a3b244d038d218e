//! Row codec for encoding/decoding table rows to/from bytes.
//!
//! Rows are stored as a list of column name/value pairs. Projections only
//! decode the columns they need; other values are skipped without decoding.

use crate::error::Error;
use slimfetch_proto::Value;

/// Type tag for encoded values.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueTag {
    Null = 0,
    Bool = 1,
    Int32 = 2,
    Int64 = 3,
    Float64 = 5,
    String = 6,
    Bytes = 7,
    Uuid = 8,
    Timestamp = 9,
}

impl TryFrom<u8> for ValueTag {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ValueTag::Null),
            1 => Ok(ValueTag::Bool),
            2 => Ok(ValueTag::Int32),
            3 => Ok(ValueTag::Int64),
            5 => Ok(ValueTag::Float64),
            6 => Ok(ValueTag::String),
            7 => Ok(ValueTag::Bytes),
            8 => Ok(ValueTag::Uuid),
            9 => Ok(ValueTag::Timestamp),
            _ => Err(Error::InvalidData(format!("Unknown value tag: {}", value))),
        }
    }
}

/// Encode a list of column name/value pairs to bytes.
///
/// Format:
/// - Column count (4 bytes, little-endian)
/// - For each column:
///   - Column name length (2 bytes, little-endian)
///   - Column name (UTF-8 bytes)
///   - Value tag (1 byte)
///   - Value data (variable length, depends on type)
pub fn encode_row(columns: &[(String, Value)]) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&(columns.len() as u32).to_le_bytes());

    for (name, value) in columns {
        let name_bytes = name.as_bytes();
        if name_bytes.len() > u16::MAX as usize {
            return Err(Error::InvalidData("Column name too long".into()));
        }
        buf.extend_from_slice(&(name_bytes.len() as u16).to_le_bytes());
        buf.extend_from_slice(name_bytes);
        encode_value(&mut buf, value)?;
    }

    Ok(buf)
}

/// Decode bytes back to column name/value pairs.
pub fn decode_row(data: &[u8]) -> Result<Vec<(String, Value)>, Error> {
    let mut reader = RowReader::new(data)?;
    let mut columns = Vec::with_capacity(reader.remaining);

    while let Some(name) = reader.next_name()? {
        let name = name.to_string();
        let value = reader.read_value()?;
        columns.push((name, value));
    }

    Ok(columns)
}

/// Get a single column value by name.
pub fn get_column(data: &[u8], column: &str) -> Result<Option<Value>, Error> {
    let mut reader = RowReader::new(data)?;

    while let Some(name) = reader.next_name()? {
        if name == column {
            return reader.read_value().map(Some);
        }
        reader.skip_value()?;
    }

    Ok(None)
}

/// Get several columns in a single pass.
///
/// The result is aligned with `columns`; a column absent from the row is
/// returned as `Value::Null`.
pub fn get_columns(data: &[u8], columns: &[&str]) -> Result<Vec<Value>, Error> {
    let mut result = vec![Value::Null; columns.len()];
    let mut found = 0;
    let mut reader = RowReader::new(data)?;

    while let Some(name) = reader.next_name()? {
        match columns.iter().position(|c| *c == name) {
            Some(idx) => {
                result[idx] = reader.read_value()?;
                found += 1;
                if found == columns.len() {
                    break;
                }
            }
            None => reader.skip_value()?,
        }
    }

    Ok(result)
}

/// Sequential reader over an encoded row.
struct RowReader<'a> {
    data: &'a [u8],
    cursor: usize,
    remaining: usize,
}

impl<'a> RowReader<'a> {
    fn new(data: &'a [u8]) -> Result<Self, Error> {
        let count = read_u32(data, 0)
            .ok_or_else(|| Error::InvalidData("Data too short for column count".into()))?;
        Ok(Self {
            data,
            cursor: 4,
            remaining: count as usize,
        })
    }

    fn next_name(&mut self) -> Result<Option<&'a str>, Error> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;

        let len = read_u16(self.data, self.cursor)
            .ok_or_else(|| Error::InvalidData("Data too short for column name length".into()))?
            as usize;
        self.cursor += 2;

        let bytes = self
            .data
            .get(self.cursor..self.cursor + len)
            .ok_or_else(|| Error::InvalidData("Data too short for column name".into()))?;
        let name = std::str::from_utf8(bytes)
            .map_err(|_| Error::InvalidData("Invalid UTF-8 in column name".into()))?;
        self.cursor += len;

        Ok(Some(name))
    }

    fn read_value(&mut self) -> Result<Value, Error> {
        let (value, read) = decode_value(&self.data[self.cursor..])?;
        self.cursor += read;
        Ok(value)
    }

    fn skip_value(&mut self) -> Result<(), Error> {
        self.cursor += skip_value(&self.data[self.cursor..])?;
        Ok(())
    }
}

fn read_u16(data: &[u8], at: usize) -> Option<u16> {
    let bytes = data.get(at..at + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_u32(data: &[u8], at: usize) -> Option<u32> {
    let bytes: [u8; 4] = data.get(at..at + 4)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}

fn read_fixed<const N: usize>(data: &[u8]) -> Result<[u8; N], Error> {
    data.get(1..1 + N)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| Error::InvalidData("Data too short for value".into()))
}

/// Skip a value without decoding it.
///
/// Returns the number of bytes to skip (including the tag byte).
fn skip_value(data: &[u8]) -> Result<usize, Error> {
    let tag = data
        .first()
        .ok_or_else(|| Error::InvalidData("Empty data for value".into()))?;

    let size = match ValueTag::try_from(*tag)? {
        ValueTag::Null => 1,
        ValueTag::Bool => 2,
        ValueTag::Int32 => 5,
        ValueTag::Int64 | ValueTag::Float64 | ValueTag::Timestamp => 9,
        ValueTag::Uuid => 17,
        ValueTag::String | ValueTag::Bytes => {
            let len = read_u32(data, 1)
                .ok_or_else(|| Error::InvalidData("Data too short for string/bytes length".into()))?;
            5 + len as usize
        }
    };

    if size > data.len() {
        return Err(Error::InvalidData("Data too short for value".into()));
    }
    Ok(size)
}

/// Encode a single value to the buffer.
fn encode_value(buf: &mut Vec<u8>, value: &Value) -> Result<(), Error> {
    match value {
        Value::Null => buf.push(ValueTag::Null as u8),
        Value::Bool(b) => {
            buf.push(ValueTag::Bool as u8);
            buf.push(u8::from(*b));
        }
        Value::Int32(n) => {
            buf.push(ValueTag::Int32 as u8);
            buf.extend_from_slice(&n.to_le_bytes());
        }
        Value::Int64(n) => {
            buf.push(ValueTag::Int64 as u8);
            buf.extend_from_slice(&n.to_le_bytes());
        }
        Value::Float64(f) => {
            buf.push(ValueTag::Float64 as u8);
            buf.extend_from_slice(&f.to_le_bytes());
        }
        Value::String(s) => {
            buf.push(ValueTag::String as u8);
            encode_len_prefixed(buf, s.as_bytes())?;
        }
        Value::Bytes(b) => {
            buf.push(ValueTag::Bytes as u8);
            encode_len_prefixed(buf, b)?;
        }
        Value::Uuid(uuid) => {
            buf.push(ValueTag::Uuid as u8);
            buf.extend_from_slice(uuid);
        }
        Value::Timestamp(ts) => {
            buf.push(ValueTag::Timestamp as u8);
            buf.extend_from_slice(&ts.to_le_bytes());
        }
    }
    Ok(())
}

fn encode_len_prefixed(buf: &mut Vec<u8>, bytes: &[u8]) -> Result<(), Error> {
    let len = u32::try_from(bytes.len()).map_err(|_| Error::InvalidData("Value too long".into()))?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

/// Decode a single value, returning it and the number of bytes read.
fn decode_value(data: &[u8]) -> Result<(Value, usize), Error> {
    let size = skip_value(data)?;
    let value = match ValueTag::try_from(data[0])? {
        ValueTag::Null => Value::Null,
        ValueTag::Bool => Value::Bool(data[1] != 0),
        ValueTag::Int32 => Value::Int32(i32::from_le_bytes(read_fixed(data)?)),
        ValueTag::Int64 => Value::Int64(i64::from_le_bytes(read_fixed(data)?)),
        ValueTag::Float64 => Value::Float64(f64::from_le_bytes(read_fixed(data)?)),
        ValueTag::Timestamp => Value::Timestamp(i64::from_le_bytes(read_fixed(data)?)),
        ValueTag::Uuid => Value::Uuid(read_fixed(data)?),
        ValueTag::String => {
            let s = std::str::from_utf8(&data[5..size])
                .map_err(|_| Error::InvalidData("Invalid UTF-8 in string".into()))?;
            Value::String(s.to_string())
        }
        ValueTag::Bytes => Value::Bytes(data[5..size].to_vec()),
    };
    Ok((value, size))
}
