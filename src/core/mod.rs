//! # Core Protocol Components
//!
//! Low-level packet handling, framing, and wire primitives.
//!
//! This module provides the foundation for the interception layer, handling
//! frame extraction, optional payload compression, and raw packet bodies.
//!
//! ## Components
//! - **Wire**: VarInt/VarLong, strings, arrays, bitsets
//! - **Packet**: Raw packet bodies (id + payload)
//! - **Codec**: Tokio codec for framing over byte streams
//!
//! ## Wire Format
//! ```text
//! [VarInt(len)] [VarInt(packet_id)] [Payload(N)]
//! ```
//! With compression enabled, the body becomes
//! `[VarInt(uncompressed_len | 0)] [data]`.
//!
//! ## Security
//! - Maximum frame size enforced before allocation
//! - Decompression output bounded to the frame limit

pub mod codec;
pub mod packet;
pub mod wire;
