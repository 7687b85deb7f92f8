use bytes::{BufMut, Bytes, BytesMut};

use crate::common::{Result, RowStoreError, TextEncoding};

use super::serial_type::{put_varint, read_varint, varint_len, SerialType};
use super::Value;

/// Encodes and decodes rows in the on-disk record format.
///
/// ## Record Binary Format
///
/// ```text
/// +-------------+-----------------------+---------------------+
/// | Header size | Serial type per field | Field bodies        |
/// | (varint)    | (varint each)         | (in field order)    |
/// +-------------+-----------------------+---------------------+
/// ```
///
/// The header size counts its own varint. Integers are big-endian two's
/// complement in the smallest of 1/2/3/4/6/8 bytes, with 0 and 1 stored as
/// body-less serial types. Reals are 8-byte big-endian IEEE 754. Text is
/// written in the database encoding without a terminator.
///
/// A codec is bound to a column count: encoding rejects wider rows and
/// decoding always yields exactly that many values, with fields missing from
/// the end of a short record read back as NULL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordCodec {
    encoding: TextEncoding,
    column_count: usize,
}

impl RecordCodec {
    pub fn new(encoding: TextEncoding, column_count: usize) -> Self {
        Self {
            encoding,
            column_count,
        }
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    pub fn column_count(&self) -> usize {
        self.column_count
    }

    /// Serializes a row into a record payload.
    pub fn encode(&self, row: &[Value]) -> Result<Bytes> {
        if row.len() > self.column_count {
            return Err(RowStoreError::invalid(format!(
                "{} values supplied for {} columns",
                row.len(),
                self.column_count
            )));
        }
        Ok(encode_record(row, self.encoding))
    }

    /// Deserializes a record payload into exactly `column_count` values.
    pub fn decode(&self, data: &[u8]) -> Result<Vec<Value>> {
        let mut values = decode_record(data, self.encoding)?;
        values.resize(self.column_count, Value::Null);
        Ok(values)
    }
}

/// Serializes any number of values; index keys are built with this directly.
pub fn encode_record(values: &[Value], encoding: TextEncoding) -> Bytes {
    let texts: Vec<Option<Vec<u8>>> = values
        .iter()
        .map(|v| match v {
            Value::Text(s) => Some(encode_text(s, encoding)),
            _ => None,
        })
        .collect();

    let serial_types: Vec<SerialType> = values
        .iter()
        .zip(&texts)
        .map(|(v, text)| match v {
            Value::Null => SerialType::Null,
            Value::Integer(i) => SerialType::for_integer(*i),
            Value::Real(r) if r.is_nan() => SerialType::Null,
            Value::Real(_) => SerialType::Real,
            Value::Text(_) => SerialType::Text(text.as_ref().map_or(0, Vec::len)),
            Value::Blob(b) => SerialType::Blob(b.len()),
        })
        .collect();

    let types_len: usize = serial_types.iter().map(|st| varint_len(st.code())).sum();
    let header_len = header_size(types_len);
    let body_len: usize = serial_types.iter().map(SerialType::body_len).sum();

    let mut buf = BytesMut::with_capacity(header_len + body_len);
    put_varint(&mut buf, header_len as u64);
    for st in &serial_types {
        put_varint(&mut buf, st.code());
    }

    for ((value, st), text) in values.iter().zip(&serial_types).zip(&texts) {
        match (value, st) {
            (Value::Integer(i), SerialType::Integer(n)) => {
                buf.put_slice(&i.to_be_bytes()[8 - n..]);
            }
            (Value::Real(r), SerialType::Real) => buf.put_f64(*r),
            (Value::Text(_), _) => {
                if let Some(bytes) = text {
                    buf.put_slice(bytes);
                }
            }
            (Value::Blob(b), _) => buf.put_slice(b),
            _ => {}
        }
    }

    buf.freeze()
}

/// Header size including the varint that stores it.
fn header_size(types_len: usize) -> usize {
    let mut size = types_len + 1;
    while varint_len(size as u64) + types_len > size {
        size = varint_len(size as u64) + types_len;
    }
    size
}

/// Parses a record into as many values as its header declares.
pub fn decode_record(data: &[u8], encoding: TextEncoding) -> Result<Vec<Value>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }

    let (header_len, mut offset) =
        read_varint(data).ok_or_else(|| RowStoreError::corrupt("truncated record header size"))?;
    let header_len = usize::try_from(header_len)
        .ok()
        .filter(|&len| len >= offset && len <= data.len())
        .ok_or_else(|| {
            RowStoreError::corrupt(format!(
                "header size {} exceeds record of {} bytes",
                header_len,
                data.len()
            ))
        })?;

    let mut serial_types = Vec::new();
    while offset < header_len {
        let (code, consumed) = read_varint(&data[offset..header_len])
            .ok_or_else(|| RowStoreError::corrupt("truncated serial type"))?;
        let st = SerialType::from_code(code)
            .ok_or_else(|| RowStoreError::corrupt(format!("reserved serial type {}", code)))?;
        serial_types.push(st);
        offset += consumed;
    }

    let mut values = Vec::with_capacity(serial_types.len());
    for st in serial_types {
        let end = offset
            .checked_add(st.body_len())
            .filter(|&end| end <= data.len())
            .ok_or_else(|| RowStoreError::corrupt("field body runs past end of record"))?;
        values.push(decode_field(st, &data[offset..end], encoding)?);
        offset = end;
    }

    Ok(values)
}

fn decode_field(st: SerialType, body: &[u8], encoding: TextEncoding) -> Result<Value> {
    let value = match st {
        SerialType::Null => Value::Null,
        SerialType::Zero => Value::Integer(0),
        SerialType::One => Value::Integer(1),
        SerialType::Integer(_) => {
            let fill = if body[0] & 0x80 != 0 { 0xff } else { 0x00 };
            let mut raw = [fill; 8];
            raw[8 - body.len()..].copy_from_slice(body);
            Value::Integer(i64::from_be_bytes(raw))
        }
        SerialType::Real => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(body);
            let r = f64::from_be_bytes(raw);
            if r.is_nan() {
                Value::Null
            } else {
                Value::Real(r)
            }
        }
        SerialType::Text(_) => Value::Text(decode_text(body, encoding)?),
        SerialType::Blob(_) => Value::Blob(body.to_vec()),
    };
    Ok(value)
}

fn encode_text(s: &str, encoding: TextEncoding) -> Vec<u8> {
    match encoding {
        TextEncoding::Utf8 => s.as_bytes().to_vec(),
        TextEncoding::Utf16Le => s.encode_utf16().flat_map(u16::to_le_bytes).collect(),
        TextEncoding::Utf16Be => s.encode_utf16().flat_map(u16::to_be_bytes).collect(),
    }
}

fn decode_text(body: &[u8], encoding: TextEncoding) -> Result<String> {
    let units = |to_u16: fn([u8; 2]) -> u16| -> Result<String> {
        if body.len() % 2 != 0 {
            return Err(RowStoreError::corrupt("odd-length UTF-16 text"));
        }
        let units: Vec<u16> = body
            .chunks_exact(2)
            .map(|pair| to_u16([pair[0], pair[1]]))
            .collect();
        String::from_utf16(&units).map_err(|_| RowStoreError::corrupt("invalid UTF-16 text"))
    };

    match encoding {
        TextEncoding::Utf8 => std::str::from_utf8(body)
            .map(str::to_owned)
            .map_err(|_| RowStoreError::corrupt("invalid UTF-8 text")),
        TextEncoding::Utf16Le => units(u16::from_le_bytes),
        TextEncoding::Utf16Be => units(u16::from_be_bytes),
    }
}
