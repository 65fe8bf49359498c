//! Chunk and section coordinates.
//!
//! Chunks are 16x16 block columns; sections are 16x16x16 cubes stacked inside
//! a chunk. Block-to-chunk math is a 4-bit shift throughout.

use crate::game::block::BlockPos;
use std::collections::{BTreeSet, HashMap};

/// Horizontal chunk coordinates (block coordinates divided by 16)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chunk containing the given block position
    pub fn containing(pos: BlockPos) -> Self {
        Self {
            x: pos.x >> 4,
            z: pos.z >> 4,
        }
    }

    /// Block coordinate of this chunk's west/north corner
    pub fn base_block(&self) -> (i32, i32) {
        (self.x << 4, self.z << 4)
    }
}

impl std::fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.x, self.z)
    }
}

/// A 16x16x16 section position within the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SectionPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl SectionPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Section containing the given block position
    pub fn containing(pos: BlockPos) -> Self {
        Self {
            x: pos.x >> 4,
            y: pos.y >> 4,
            z: pos.z >> 4,
        }
    }

    pub fn chunk(&self) -> ChunkPos {
        ChunkPos::new(self.x, self.z)
    }

    /// Packed wire encoding: x and z in 22 bits each, y in the low 20
    pub fn as_long(&self) -> i64 {
        ((i64::from(self.x) & 0x3F_FFFF) << 42)
            | ((i64::from(self.z) & 0x3F_FFFF) << 20)
            | (i64::from(self.y) & 0xF_FFFF)
    }

    /// Inverse of [`SectionPos::as_long`]
    pub fn from_long(packed: i64) -> Self {
        Self {
            x: (packed >> 42) as i32,
            y: (packed << 44 >> 44) as i32,
            z: (packed << 22 >> 42) as i32,
        }
    }
}

/// Group block positions by chunk, collecting the distinct section Y indices
/// touched in each chunk. Mirrors how multi-block batches and light updates
/// are addressed on the wire.
pub fn chunk_sections<I>(blocks: I) -> HashMap<ChunkPos, BTreeSet<i32>>
where
    I: IntoIterator<Item = BlockPos>,
{
    let mut map: HashMap<ChunkPos, BTreeSet<i32>> = HashMap::new();
    for pos in blocks {
        map.entry(ChunkPos::containing(pos))
            .or_default()
            .insert(pos.y >> 4);
    }
    map
}
