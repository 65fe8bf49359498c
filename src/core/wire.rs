//! # Wire Primitives
//!
//! Low-level binary encoding primitives shared by the codec and typed packets.
//!
//! The wire format uses variable-length integers (7-bit groups with a
//! continuation bit, two's complement), length-prefixed UTF-8 strings,
//! VarInt-prefixed byte arrays, and `i64`-word bitsets for light masks.
//!
//! ## Security
//! - VarInts are capped at 5 bytes (10 for VarLongs); longer sequences are rejected
//! - String and array lengths are validated before allocation

use crate::error::{ProtocolError, Result};
use bytes::{Buf, BufMut};

/// Maximum number of bytes in an encoded VarInt
pub const VARINT_MAX_BYTES: usize = 5;

/// Maximum number of bytes in an encoded VarLong
pub const VARLONG_MAX_BYTES: usize = 10;

const SEGMENT_BITS: u8 = 0x7F;
const CONTINUE_BIT: u8 = 0x80;

/// Read a VarInt from the buffer, consuming its bytes.
///
/// # Errors
/// Returns `ProtocolError::InvalidFrame` if the buffer runs out mid-value and
/// `ProtocolError::VarIntTooLong` if the encoding exceeds 5 bytes.
pub fn read_varint<B: Buf>(buf: &mut B) -> Result<i32> {
    let mut value: u32 = 0;
    for i in 0..VARINT_MAX_BYTES {
        if !buf.has_remaining() {
            return Err(ProtocolError::InvalidFrame);
        }
        let byte = buf.get_u8();
        value |= u32::from(byte & SEGMENT_BITS) << (7 * i);
        if byte & CONTINUE_BIT == 0 {
            return Ok(value as i32);
        }
    }
    Err(ProtocolError::VarIntTooLong)
}

/// Write a VarInt to the buffer.
pub fn write_varint<B: BufMut>(buf: &mut B, value: i32) {
    let mut value = value as u32;
    loop {
        if value & !u32::from(SEGMENT_BITS) == 0 {
            buf.put_u8(value as u8);
            return;
        }
        buf.put_u8((value as u8 & SEGMENT_BITS) | CONTINUE_BIT);
        value >>= 7;
    }
}

/// Number of bytes `value` occupies when VarInt-encoded
pub fn varint_len(value: i32) -> usize {
    let value = value as u32;
    match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        0x20_0000..=0xFFF_FFFF => 4,
        _ => 5,
    }
}

/// Try to read a VarInt from the front of `slice` without consuming it.
///
/// Returns `Ok(None)` when the slice ends before the value does, so a codec
/// can wait for more bytes. A value using the full 5 bytes with the
/// continuation bit still set is rejected as malformed.
pub fn peek_varint(slice: &[u8]) -> Result<Option<(i32, usize)>> {
    let mut value: u32 = 0;
    for (i, &byte) in slice.iter().enumerate() {
        if i >= VARINT_MAX_BYTES {
            return Err(ProtocolError::VarIntTooLong);
        }
        value |= u32::from(byte & SEGMENT_BITS) << (7 * i);
        if byte & CONTINUE_BIT == 0 {
            return Ok(Some((value as i32, i + 1)));
        }
    }
    if slice.len() >= VARINT_MAX_BYTES {
        return Err(ProtocolError::VarIntTooLong);
    }
    Ok(None)
}

/// Read a VarLong from the buffer, consuming its bytes.
pub fn read_varlong<B: Buf>(buf: &mut B) -> Result<i64> {
    let mut value: u64 = 0;
    for i in 0..VARLONG_MAX_BYTES {
        if !buf.has_remaining() {
            return Err(ProtocolError::InvalidFrame);
        }
        let byte = buf.get_u8();
        value |= u64::from(byte & SEGMENT_BITS) << (7 * i);
        if byte & CONTINUE_BIT == 0 {
            return Ok(value as i64);
        }
    }
    Err(ProtocolError::VarIntTooLong)
}

/// Write a VarLong to the buffer.
pub fn write_varlong<B: BufMut>(buf: &mut B, value: i64) {
    let mut value = value as u64;
    loop {
        if value & !u64::from(SEGMENT_BITS) == 0 {
            buf.put_u8(value as u8);
            return;
        }
        buf.put_u8((value as u8 & SEGMENT_BITS) | CONTINUE_BIT);
        value >>= 7;
    }
}

/// Read a length-prefixed UTF-8 string, rejecting lengths above `max_len` bytes.
pub fn read_string<B: Buf>(buf: &mut B, max_len: usize) -> Result<String> {
    let len = read_varint(buf)?;
    if len < 0 {
        return Err(ProtocolError::InvalidFrame);
    }
    let len = len as usize;
    if len > max_len {
        return Err(ProtocolError::OversizedString(len));
    }
    if buf.remaining() < len {
        return Err(ProtocolError::InvalidFrame);
    }
    let mut bytes = vec![0u8; len];
    buf.copy_to_slice(&mut bytes);
    String::from_utf8(bytes).map_err(|_| ProtocolError::InvalidFrame)
}

/// Write a length-prefixed UTF-8 string.
pub fn write_string<B: BufMut>(buf: &mut B, value: &str) {
    write_varint(buf, value.len() as i32);
    buf.put_slice(value.as_bytes());
}

/// Read a single boolean byte.
pub fn read_bool<B: Buf>(buf: &mut B) -> Result<bool> {
    if !buf.has_remaining() {
        return Err(ProtocolError::InvalidFrame);
    }
    Ok(buf.get_u8() != 0)
}

/// Write a single boolean byte.
pub fn write_bool<B: BufMut>(buf: &mut B, value: bool) {
    buf.put_u8(u8::from(value));
}

/// Read a 128-bit session/player id (big-endian).
pub fn read_uuid<B: Buf>(buf: &mut B) -> Result<u128> {
    if buf.remaining() < 16 {
        return Err(ProtocolError::InvalidFrame);
    }
    Ok(buf.get_u128())
}

/// Write a 128-bit session/player id (big-endian).
pub fn write_uuid<B: BufMut>(buf: &mut B, value: u128) {
    buf.put_u128(value);
}

/// Read a VarInt-prefixed byte array, rejecting lengths above `max_len`.
pub fn read_byte_array<B: Buf>(buf: &mut B, max_len: usize) -> Result<Vec<u8>> {
    let len = read_varint(buf)?;
    if len < 0 {
        return Err(ProtocolError::InvalidFrame);
    }
    let len = len as usize;
    if len > max_len {
        return Err(ProtocolError::OversizedFrame(len));
    }
    if buf.remaining() < len {
        return Err(ProtocolError::InvalidFrame);
    }
    let mut bytes = vec![0u8; len];
    buf.copy_to_slice(&mut bytes);
    Ok(bytes)
}

/// Write a VarInt-prefixed byte array.
pub fn write_byte_array<B: BufMut>(buf: &mut B, value: &[u8]) {
    write_varint(buf, value.len() as i32);
    buf.put_slice(value);
}

/// Read a VarInt-prefixed array of `i64` words (bitset wire form).
pub fn read_long_array<B: Buf>(buf: &mut B, max_words: usize) -> Result<Vec<i64>> {
    let len = read_varint(buf)?;
    if len < 0 {
        return Err(ProtocolError::InvalidFrame);
    }
    let len = len as usize;
    if len > max_words {
        return Err(ProtocolError::OversizedFrame(len * 8));
    }
    if buf.remaining() < len * 8 {
        return Err(ProtocolError::InvalidFrame);
    }
    let mut words = Vec::with_capacity(len);
    for _ in 0..len {
        words.push(buf.get_i64());
    }
    Ok(words)
}

/// Write a VarInt-prefixed array of `i64` words.
pub fn write_long_array<B: BufMut>(buf: &mut B, words: &[i64]) {
    write_varint(buf, words.len() as i32);
    for &word in words {
        buf.put_i64(word);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    fn roundtrip_varint(value: i32) -> i32 {
        let mut buf = BytesMut::new();
        write_varint(&mut buf, value);
        assert_eq!(buf.len(), varint_len(value));
        read_varint(&mut buf).expect("roundtrip")
    }

    #[test]
    fn test_varint_roundtrip_boundaries() {
        for value in [0, 1, 127, 128, 16383, 16384, 2097151, 2097152, i32::MAX] {
            assert_eq!(roundtrip_varint(value), value);
        }
    }

    #[test]
    fn test_varint_negative_uses_five_bytes() {
        let mut buf = BytesMut::new();
        write_varint(&mut buf, -1);
        assert_eq!(buf.len(), 5);
        assert_eq!(read_varint(&mut buf).expect("decode"), -1);
    }

    #[test]
    fn test_varint_overlong_rejected() {
        let mut buf = BytesMut::from(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01][..]);
        assert!(matches!(
            read_varint(&mut buf),
            Err(ProtocolError::VarIntTooLong)
        ));
    }

    #[test]
    fn test_varint_truncated_rejected() {
        let mut buf = BytesMut::from(&[0x80, 0x80][..]);
        assert!(matches!(
            read_varint(&mut buf),
            Err(ProtocolError::InvalidFrame)
        ));
    }

    #[test]
    fn test_peek_varint_incomplete() {
        assert!(peek_varint(&[0x80]).expect("peek").is_none());
        assert_eq!(peek_varint(&[0x05]).expect("peek"), Some((5, 1)));
        assert_eq!(peek_varint(&[0x80, 0x01, 0xAA]).expect("peek"), Some((128, 2)));
    }

    #[test]
    fn test_peek_varint_overlong() {
        assert!(peek_varint(&[0xFF; 5]).is_err());
    }

    #[test]
    fn test_varlong_roundtrip() {
        for value in [0i64, 1, -1, i64::MAX, i64::MIN, 1 << 40] {
            let mut buf = BytesMut::new();
            write_varlong(&mut buf, value);
            assert_eq!(read_varlong(&mut buf).expect("roundtrip"), value);
        }
    }

    #[test]
    fn test_string_roundtrip() {
        let mut buf = BytesMut::new();
        write_string(&mut buf, "packetbag");
        assert_eq!(read_string(&mut buf, 64).expect("roundtrip"), "packetbag");
    }

    #[test]
    fn test_string_over_limit_rejected() {
        let mut buf = BytesMut::new();
        write_string(&mut buf, &"x".repeat(100));
        assert!(matches!(
            read_string(&mut buf, 16),
            Err(ProtocolError::OversizedString(100))
        ));
    }

    #[test]
    fn test_string_invalid_utf8_rejected() {
        let mut buf = BytesMut::new();
        write_varint(&mut buf, 2);
        buf.put_slice(&[0xC0, 0xAF]);
        assert!(read_string(&mut buf, 16).is_err());
    }

    #[test]
    fn test_long_array_roundtrip() {
        let words = vec![0i64, -1, 0x0F0F];
        let mut buf = BytesMut::new();
        write_long_array(&mut buf, &words);
        assert_eq!(read_long_array(&mut buf, 16).expect("roundtrip"), words);
    }

    #[test]
    fn test_byte_array_truncated() {
        let mut buf = BytesMut::new();
        write_varint(&mut buf, 10);
        buf.put_slice(&[1, 2, 3]);
        assert!(read_byte_array(&mut buf, 64).is_err());
    }
}
