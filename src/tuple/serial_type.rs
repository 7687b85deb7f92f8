//! Varints and serial types of the record format.
//!
//! | Serial type  | Body bytes | Meaning                   |
//! |--------------|------------|---------------------------|
//! | 0            | 0          | NULL                      |
//! | 1..=4        | 1..=4      | big-endian signed integer |
//! | 5            | 6          | 48-bit signed integer     |
//! | 6            | 8          | 64-bit signed integer     |
//! | 7            | 8          | IEEE 754 double           |
//! | 8, 9         | 0          | integer constant 0 / 1    |
//! | 10, 11       | -          | reserved                  |
//! | N >= 12 even | (N-12)/2   | BLOB                      |
//! | N >= 13 odd  | (N-13)/2   | TEXT                      |

use bytes::BufMut;

/// Maximum encoded length of a varint
pub const MAX_VARINT_LEN: usize = 9;

/// Serial type class, decoded from the varint in a record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialType {
    Null,
    /// Signed integer stored in this many bytes
    Integer(usize),
    Real,
    Zero,
    One,
    Blob(usize),
    Text(usize),
}

impl SerialType {
    /// Decodes a serial type code, returning None for the reserved codes.
    pub fn from_code(code: u64) -> Option<Self> {
        let st = match code {
            0 => SerialType::Null,
            1..=4 => SerialType::Integer(code as usize),
            5 => SerialType::Integer(6),
            6 => SerialType::Integer(8),
            7 => SerialType::Real,
            8 => SerialType::Zero,
            9 => SerialType::One,
            10 | 11 => return None,
            n if n % 2 == 0 => SerialType::Blob(usize::try_from((n - 12) / 2).ok()?),
            n => SerialType::Text(usize::try_from((n - 13) / 2).ok()?),
        };
        Some(st)
    }

    pub fn code(&self) -> u64 {
        match self {
            SerialType::Null => 0,
            SerialType::Integer(6) => 5,
            SerialType::Integer(8) => 6,
            SerialType::Integer(n) => *n as u64,
            SerialType::Real => 7,
            SerialType::Zero => 8,
            SerialType::One => 9,
            SerialType::Blob(n) => *n as u64 * 2 + 12,
            SerialType::Text(n) => *n as u64 * 2 + 13,
        }
    }

    /// Number of body bytes the value occupies.
    pub fn body_len(&self) -> usize {
        match self {
            SerialType::Null | SerialType::Zero | SerialType::One => 0,
            SerialType::Integer(n) | SerialType::Blob(n) | SerialType::Text(n) => *n,
            SerialType::Real => 8,
        }
    }

    /// Smallest serial type able to hold `value`.
    pub fn for_integer(value: i64) -> Self {
        match value {
            0 => return SerialType::Zero,
            1 => return SerialType::One,
            _ => {}
        }
        let magnitude = if value < 0 { !(value as u64) } else { value as u64 };
        let bytes = if magnitude <= 0x7f {
            1
        } else if magnitude <= 0x7fff {
            2
        } else if magnitude <= 0x7f_ffff {
            3
        } else if magnitude <= 0x7fff_ffff {
            4
        } else if magnitude <= 0x7fff_ffff_ffff {
            6
        } else {
            8
        };
        SerialType::Integer(bytes)
    }
}

/// Calculate the number of bytes needed to encode a varint
pub fn varint_len(value: u64) -> usize {
    if value <= 0x7f {
        1
    } else if value <= 0x3fff {
        2
    } else if value <= 0x1f_ffff {
        3
    } else if value <= 0x0fff_ffff {
        4
    } else if value <= 0x07_ffff_ffff {
        5
    } else if value <= 0x03ff_ffff_ffff {
        6
    } else if value <= 0x01_ffff_ffff_ffff {
        7
    } else if value <= 0x00ff_ffff_ffff_ffff {
        8
    } else {
        9
    }
}

/// Appends a varint to `buf`.
///
/// The first eight bytes carry 7 bits each, high bit set while more follow;
/// a ninth byte, when present, carries a full 8 bits.
pub fn put_varint<B: BufMut>(buf: &mut B, value: u64) {
    let len = varint_len(value);
    let mut out = [0u8; MAX_VARINT_LEN];
    if len == MAX_VARINT_LEN {
        out[8] = value as u8;
        let mut v = value >> 8;
        for i in (0..8).rev() {
            out[i] = ((v & 0x7f) as u8) | 0x80;
            v >>= 7;
        }
    } else {
        let mut v = value;
        for i in (0..len).rev() {
            out[i] = (v & 0x7f) as u8;
            if i != len - 1 {
                out[i] |= 0x80;
            }
            v >>= 7;
        }
    }
    buf.put_slice(&out[..len]);
}

/// Reads a varint from the start of `data`, returning (value, bytes consumed).
///
/// Returns None if `data` ends before the varint does.
pub fn read_varint(data: &[u8]) -> Option<(u64, usize)> {
    let mut value: u64 = 0;
    for (i, &b) in data.iter().take(MAX_VARINT_LEN).enumerate() {
        if i == MAX_VARINT_LEN - 1 {
            return Some(((value << 8) | b as u64, MAX_VARINT_LEN));
        }
        value = (value << 7) | (b & 0x7f) as u64;
        if b & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}
