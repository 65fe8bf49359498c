//! # Game Data Helpers
//!
//! World-coordinate math and packet payload builders used by the built-in
//! interceptors.
//!
//! ## Components
//! - **Chunk**: chunk/section coordinates and packed encodings
//! - **Block**: block positions, state ids, and the per-session overlay
//! - **Light**: nibble-packed light sections and update payloads
//! - **Shape**: blueprint generators for synthetic block batches

pub mod block;
pub mod chunk;
pub mod light;
pub mod shape;

pub use block::{BlockPos, BlockState};
pub use chunk::{ChunkPos, SectionPos};
pub use light::LightData;
