//! Compact integer encodings used by every index file.
//!
//! Numbers are written with a prefix-tagged variable-length code:
//!
//! | first bits | total bytes | value range          |
//! |------------|-------------|----------------------|
//! | `0xxxxxxx` | 1           | `0..=0x7F`           |
//! | `10xxxxxx` | 2           | `..=0x3FFF`          |
//! | `110xxxxx` | 4           | `..=0x1FFF_FFFF`     |
//! | `0xE0`     | 5           | any `u32`            |
//!
//! Unlike a continuation-bit varint the length is known from the first
//! byte, so a decoder never scans ahead.

use std::io::{self, Read, Write};

const MAX_1: u32 = 0x7F;
const MAX_2: u32 = 0x3FFF;
const MAX_4: u32 = 0x1FFF_FFFF;
const TAG_5: u8 = 0xE0;

/// Number of bytes `encode_num` emits for `value`
#[inline]
pub fn num_len(value: u32) -> usize {
    if value <= MAX_1 {
        1
    } else if value <= MAX_2 {
        2
    } else if value <= MAX_4 {
        4
    } else {
        5
    }
}

/// Encode a u32 as a variable-length integer
pub fn encode_num(value: u32, buf: &mut Vec<u8>) {
    match num_len(value) {
        1 => buf.push(value as u8),
        2 => {
            buf.push(0x80 | (value >> 8) as u8);
            buf.push(value as u8);
        }
        4 => {
            buf.push(0xC0 | (value >> 24) as u8);
            buf.push((value >> 16) as u8);
            buf.push((value >> 8) as u8);
            buf.push(value as u8);
        }
        _ => {
            buf.push(TAG_5);
            buf.extend_from_slice(&value.to_be_bytes());
        }
    }
}

/// Decode a variable-length integer from a slice
/// Returns (value, bytes_consumed)
pub fn decode_num(buf: &[u8]) -> Option<(u32, usize)> {
    let first = *buf.first()?;
    match first {
        0x00..=0x7F => Some((first as u32, 1)),
        0x80..=0xBF => {
            let b = buf.get(1)?;
            Some(((((first & 0x3F) as u32) << 8) | *b as u32, 2))
        }
        0xC0..=0xDF => {
            let b = buf.get(1..4)?;
            let value = (((first & 0x1F) as u32) << 24)
                | ((b[0] as u32) << 16)
                | ((b[1] as u32) << 8)
                | b[2] as u32;
            Some((value, 4))
        }
        TAG_5 => {
            let b = buf.get(1..5)?;
            Some((u32::from_be_bytes([b[0], b[1], b[2], b[3]]), 5))
        }
        _ => None,
    }
}

/// Read one variable-length integer from a stream
pub fn read_num<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 5];
    reader.read_exact(&mut buf[..1])?;
    let len = match buf[0] {
        0x00..=0x7F => 1,
        0x80..=0xBF => 2,
        0xC0..=0xDF => 4,
        TAG_5 => 5,
        b => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid number tag 0x{:02x}", b),
            ));
        }
    };
    reader.read_exact(&mut buf[1..len])?;
    decode_num(&buf[..len])
        .map(|(v, _)| v)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "truncated number"))
}

/// Write a u32 in little-endian format
pub fn write_u32_le<W: Write>(writer: &mut W, value: u32) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

/// Read a u32 in little-endian format
pub fn read_u32_le<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Largest value representable in five bytes
pub const MAX_U40: u64 = (1 << 40) - 1;

/// Write the low five bytes of a u64 in little-endian format
pub fn write_u40_le<W: Write>(writer: &mut W, value: u64) -> io::Result<()> {
    if value > MAX_U40 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("offset {} does not fit in 5 bytes", value),
        ));
    }
    writer.write_all(&value.to_le_bytes()[..5])
}

/// Read a five-byte little-endian integer
pub fn read_u40_le<R: Read>(reader: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf[..5])?;
    Ok(u64::from_le_bytes(buf))
}

/// Decode a five-byte little-endian integer from a slice
#[inline]
pub fn u40_from_slice(buf: &[u8]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes[..5].copy_from_slice(&buf[..5]);
    u64::from_le_bytes(bytes)
}
