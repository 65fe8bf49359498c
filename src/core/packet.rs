//! Raw packet bodies.
//!
//! A [`RawPacket`] is one frame's content after length framing and
//! decompression: the VarInt packet id followed by an opaque payload. Typed
//! decoding happens in `protocol::message`; interceptors that only shuffle
//! bytes can work on the raw form directly.

use crate::core::wire;
use crate::error::Result;
use bytes::{BufMut, Bytes, BytesMut};

/// One decoded frame: packet id plus undecoded payload bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    pub id: i32,
    pub body: Bytes,
}

impl RawPacket {
    pub fn new(id: i32, body: Bytes) -> Self {
        Self { id, body }
    }

    /// Parse the id prefix out of a full frame body
    pub fn from_frame(frame: Bytes) -> Result<Self> {
        let mut buf = frame;
        let id = wire::read_varint(&mut buf)?;
        Ok(Self { id, body: buf })
    }

    /// Re-assemble the frame body (id + payload)
    pub fn to_frame(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(wire::varint_len(self.id) + self.body.len());
        wire::write_varint(&mut buf, self.id);
        buf.put_slice(&self.body);
        buf.freeze()
    }

    /// Total encoded body length in bytes
    pub fn frame_len(&self) -> usize {
        wire::varint_len(self.id) + self.body.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_roundtrip() {
        let packet = RawPacket::new(0x2A, Bytes::from_static(b"payload"));
        let frame = packet.to_frame();
        assert_eq!(frame.len(), packet.frame_len());
        let decoded = RawPacket::from_frame(frame).expect("decode");
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_empty_frame_rejected() {
        assert!(RawPacket::from_frame(Bytes::new()).is_err());
    }

    #[test]
    fn test_empty_payload_allowed() {
        let packet = RawPacket::new(3, Bytes::new());
        let decoded = RawPacket::from_frame(packet.to_frame()).expect("decode");
        assert_eq!(decoded.id, 3);
        assert!(decoded.body.is_empty());
    }
}
