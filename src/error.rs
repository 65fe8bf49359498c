//! # Error Types
//!
//! Comprehensive error handling for the interception core.
//!
//! This module defines all error variants that can occur while decoding,
//! rewriting, and forwarding packets, from low-level I/O errors to
//! protocol violations that terminate a session.
//!
//! ## Error Categories
//! - **I/O Errors**: Socket and file system failures
//! - **Wire Errors**: Malformed frames, VarInt overflow, oversized packets
//! - **Protocol Errors**: Unknown packet ids, phase violations, timeouts
//! - **Pipeline Errors**: Interceptor failures and closed sessions
//! - **Compression Errors**: Decompression failures, size limit violations
//!
//! All errors implement `std::error::Error` for interoperability.

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
/// Static strings are borrowed, avoiding heap allocations for common error cases.
pub mod constants {
    /// Dispatcher-related error messages
    pub const ERR_DISPATCHER_WRITE_LOCK: &str = "Failed to acquire write lock on dispatcher";
    pub const ERR_DISPATCHER_READ_LOCK: &str = "Failed to acquire read lock on dispatcher";

    /// Session-related error messages
    pub const ERR_SESSION_QUEUE_CLOSED: &str = "Session outbound queue full or closed";
    pub const ERR_SESSION_VIEW_POISONED: &str = "Session view lock poisoned";

    /// Wire validation errors
    pub const ERR_INVALID_FRAME: &str = "Invalid frame structure";
    pub const ERR_VARINT_TOO_LONG: &str = "VarInt exceeds maximum width";
    pub const ERR_OVERSIZED_FRAME: &str = "Frame exceeds maximum size";
    pub const ERR_TRAILING_BYTES: &str = "Trailing bytes after packet body";

    /// Connection errors
    pub const ERR_CONNECTION_CLOSED: &str = "Connection closed";
    pub const ERR_CONNECTION_TIMEOUT: &str = "Connection timed out (no activity)";
    pub const ERR_SESSION_LIMIT: &str = "Session limit reached";

    /// Compression errors
    pub const ERR_COMPRESSION_FAILED: &str = "Compression failed";
    pub const ERR_DECOMPRESSION_FAILED: &str = "Decompression failed";
}

/// ProtocolError is the primary error type for all interception operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid frame structure")]
    InvalidFrame,

    #[error("VarInt exceeds maximum width")]
    VarIntTooLong,

    #[error("Frame too large: {0} bytes")]
    OversizedFrame(usize),

    #[error("String too long: {0} bytes")]
    OversizedString(usize),

    #[error("Trailing bytes after packet body: {0} remaining")]
    TrailingBytes(usize),

    #[error("Unknown packet id {id:#04x} for {direction} in {phase} phase")]
    UnknownPacket {
        phase: &'static str,
        direction: &'static str,
        id: i32,
    },

    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(i32),

    #[error("Unexpected packet for current phase")]
    UnexpectedPacket,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Connection timed out (no activity)")]
    ConnectionTimeout,

    #[error("Session limit reached")]
    SessionLimit,

    #[error("Interceptor error: {0}")]
    InterceptorError(String),

    #[error("Compression failed")]
    CompressionFailure,

    #[error("Decompression failed")]
    DecompressionFailure,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
