use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};

/// Supported frame body compression algorithms
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionKind {
    Lz4,
    Zstd,
}

/// Zstd level used for frame bodies. Level 1 favors latency over ratio,
/// which suits per-packet compression.
const ZSTD_LEVEL: i32 = 1;

/// Compresses a frame body using the specified algorithm.
///
/// The output carries no size prefix; the wire format transmits the
/// uncompressed length separately, which is what makes strict validation
/// on the receive path possible.
///
/// # Errors
/// Returns `ProtocolError::CompressionFailure` if compression fails
pub fn compress(data: &[u8], kind: CompressionKind) -> Result<Vec<u8>> {
    match kind {
        CompressionKind::Lz4 => Ok(lz4_flex::block::compress(data)),
        CompressionKind::Zstd => {
            let mut out = Vec::new();
            zstd::stream::copy_encode(data, &mut out, ZSTD_LEVEL)
                .map_err(|_| ProtocolError::CompressionFailure)?;
            Ok(out)
        }
    }
}

/// Decompresses a frame body, requiring the output to match `expected_len`
/// exactly.
///
/// The caller validates `expected_len` against the frame limit before this
/// runs, so decompression can never allocate more than one legal frame.
///
/// # Errors
/// Returns `ProtocolError::DecompressionFailure` if:
/// - Decompression fails
/// - Output size differs from the declared uncompressed size
pub fn decompress(data: &[u8], kind: CompressionKind, expected_len: usize) -> Result<Vec<u8>> {
    let out = match kind {
        CompressionKind::Lz4 => lz4_flex::block::decompress(data, expected_len)
            .map_err(|_| ProtocolError::DecompressionFailure)?,
        CompressionKind::Zstd => {
            let mut out = Vec::with_capacity(expected_len);
            let mut reader = zstd::stream::Decoder::new(data)
                .map_err(|_| ProtocolError::DecompressionFailure)?;

            // Read in chunks so a lying frame cannot allocate past the
            // declared size.
            use std::io::Read;
            let mut buffer = [0u8; 8192];
            loop {
                match reader.read(&mut buffer) {
                    Ok(0) => break,
                    Ok(n) => {
                        out.extend_from_slice(&buffer[..n]);
                        if out.len() > expected_len {
                            return Err(ProtocolError::DecompressionFailure);
                        }
                    }
                    Err(_) => return Err(ProtocolError::DecompressionFailure),
                }
            }
            out
        }
    };

    if out.len() != expected_len {
        return Err(ProtocolError::DecompressionFailure);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_lz4_compression_roundtrip() {
        let original = b"Hello, World! This is a test of LZ4 compression.";
        let compressed = compress(original, CompressionKind::Lz4).unwrap();
        let decompressed = decompress(&compressed, CompressionKind::Lz4, original.len()).unwrap();
        assert_eq!(original.as_slice(), decompressed.as_slice());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_zstd_compression_roundtrip() {
        let original = b"Hello, World! This is a test of Zstd compression.";
        let compressed = compress(original, CompressionKind::Zstd).unwrap();
        let decompressed = decompress(&compressed, CompressionKind::Zstd, original.len()).unwrap();
        assert_eq!(original.as_slice(), decompressed.as_slice());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_repetitive_data_shrinks() {
        let repetitive = vec![0xAA; 65536];
        for kind in [CompressionKind::Lz4, CompressionKind::Zstd] {
            let compressed = compress(&repetitive, kind).unwrap();
            assert!(compressed.len() < repetitive.len() / 10);
            let decompressed = decompress(&compressed, kind, repetitive.len()).unwrap();
            assert_eq!(decompressed, repetitive);
        }
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_size_mismatch_rejected() {
        let original = vec![0x42u8; 1000];
        let compressed = compress(&original, CompressionKind::Lz4).unwrap();
        // Claiming the wrong uncompressed size must fail.
        assert!(decompress(&compressed, CompressionKind::Lz4, 999).is_err());
        assert!(decompress(&compressed, CompressionKind::Lz4, 4096).is_err());
    }

    #[test]
    fn test_malformed_compressed_data() {
        let malformed = vec![0xFF, 0xFF, 0xFF, 0x00, 0x12];
        assert!(decompress(&malformed, CompressionKind::Lz4, 64).is_err());
        assert!(decompress(&malformed, CompressionKind::Zstd, 64).is_err());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_truncated_zstd_rejected() {
        let original = vec![0x33u8; 500];
        let compressed = compress(&original, CompressionKind::Zstd).unwrap();
        let truncated = &compressed[..compressed.len() - 1];
        assert!(decompress(truncated, CompressionKind::Zstd, original.len()).is_err());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_empty_body_roundtrip() {
        for kind in [CompressionKind::Lz4, CompressionKind::Zstd] {
            let compressed = compress(&[], kind).unwrap();
            let decompressed = decompress(&compressed, kind, 0).unwrap();
            assert!(decompressed.is_empty());
        }
    }
}
