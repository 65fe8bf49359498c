//! Frame codec for the byte stream.
//!
//! Splits the stream into length-prefixed frames and reassembles them on the
//! way out, transparently handling the compressed body format once a session
//! enables compression. The codec is deliberately unaware of packet types;
//! it produces and consumes whole frame bodies as [`Bytes`].

use crate::core::wire;
use crate::error::{ProtocolError, Result};
use crate::utils::compression::{self, CompressionKind};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Default maximum frame body size (2 MiB)
pub const DEFAULT_MAX_FRAME_LEN: usize = 2 * 1024 * 1024;

/// Compression parameters applied once a session switches modes
#[derive(Debug, Clone, Copy)]
pub struct CompressionSettings {
    pub kind: CompressionKind,
    /// Bodies below this size are sent uncompressed inside the compressed format
    pub threshold: usize,
}

/// Length-prefixed frame codec with optional body compression
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_len: usize,
    compression: Option<CompressionSettings>,
}

impl FrameCodec {
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            max_frame_len,
            compression: None,
        }
    }

    /// Switch the stream to the compressed body format. Applies to every
    /// subsequent frame in both directions.
    pub fn enable_compression(&mut self, settings: CompressionSettings) {
        self.compression = Some(settings);
    }

    pub fn compression_enabled(&self) -> bool {
        self.compression.is_some()
    }

    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }

    fn decode_body(&self, mut frame: Bytes) -> Result<Bytes> {
        let Some(settings) = self.compression else {
            return Ok(frame);
        };
        let uncompressed_len = wire::read_varint(&mut frame)?;
        if uncompressed_len == 0 {
            return Ok(frame);
        }
        if uncompressed_len < 0 || uncompressed_len as usize > self.max_frame_len {
            return Err(ProtocolError::OversizedFrame(uncompressed_len as usize));
        }
        let body = compression::decompress(&frame, settings.kind, uncompressed_len as usize)?;
        Ok(Bytes::from(body))
    }

    fn encode_body(&self, body: &[u8]) -> Result<Bytes> {
        let Some(settings) = self.compression else {
            return Ok(Bytes::copy_from_slice(body));
        };
        let mut out = BytesMut::with_capacity(body.len() + wire::VARINT_MAX_BYTES);
        if body.len() >= settings.threshold {
            let compressed = compression::compress(body, settings.kind)?;
            wire::write_varint(&mut out, body.len() as i32);
            out.put_slice(&compressed);
        } else {
            wire::write_varint(&mut out, 0);
            out.put_slice(body);
        }
        Ok(out.freeze())
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LEN)
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        let Some((len, header_len)) = wire::peek_varint(src)? else {
            return Ok(None);
        };
        if len < 0 {
            return Err(ProtocolError::InvalidFrame);
        }
        let len = len as usize;
        if len > self.max_frame_len {
            return Err(ProtocolError::OversizedFrame(len));
        }
        if src.len() < header_len + len {
            // Reserve what the rest of the frame needs and wait for more bytes.
            src.reserve(header_len + len - src.len());
            return Ok(None);
        }
        src.advance(header_len);
        let frame = src.split_to(len).freeze();
        self.decode_body(frame).map(Some)
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, body: Bytes, dst: &mut BytesMut) -> Result<()> {
        if body.len() > self.max_frame_len {
            return Err(ProtocolError::OversizedFrame(body.len()));
        }
        let wire_body = self.encode_body(&body)?;
        dst.reserve(wire::VARINT_MAX_BYTES + wire_body.len());
        wire::write_varint(dst, wire_body.len() as i32);
        dst.put_slice(&wire_body);
        Ok(())
    }
}
