//! # Utility Modules
//!
//! Supporting utilities for compression, logging, metrics, and timing.
//!
//! This module provides reusable utilities used throughout the interception
//! core.
//!
//! ## Components
//! - **Compression**: LZ4 and Zstd with strict output-size validation
//! - **Logging**: Structured logging configuration
//! - **Metrics**: Thread-safe observability counters
//! - **Time**: Timestamp utilities for keep-alive bookkeeping
//! - **Timeout**: Shared timeout constants for the connection lifecycle
//!
//! ## Security
//! - Decompression output is bounded by the declared frame size
//! - No panics on malformed input anywhere in this tree

pub mod compression;
pub mod logging;
pub mod metrics;
pub mod time;
pub mod timeout;
