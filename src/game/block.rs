//! Block positions, state ids, and the per-session block overlay.
//!
//! The overlay lets an interceptor present blocks to one client that do not
//! exist server-side: it remembers the authentic state for every overlaid
//! position (indexed by chunk so unloads restore cheaply) and hands back
//! restore batches when the illusion is torn down.

use crate::game::chunk::{ChunkPos, SectionPos};
use std::collections::{HashMap, HashSet};

/// A registry id for a block state. Id 0 is air by convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockState(pub i32);

impl BlockState {
    pub const AIR: BlockState = BlockState(0);

    pub fn id(&self) -> i32 {
        self.0
    }
}

/// An absolute block position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Packed wire encoding: x in 26 bits, z in 26 bits, y in the low 12
    pub fn as_long(&self) -> i64 {
        ((i64::from(self.x) & 0x3FF_FFFF) << 38)
            | ((i64::from(self.z) & 0x3FF_FFFF) << 12)
            | (i64::from(self.y) & 0xFFF)
    }

    /// Inverse of [`BlockPos::as_long`]
    pub fn from_long(packed: i64) -> Self {
        Self {
            x: (packed >> 38) as i32,
            y: (packed << 52 >> 52) as i32,
            z: (packed << 26 >> 38) as i32,
        }
    }

    /// Coordinates relative to the containing section (each 0..16)
    pub fn section_local(&self) -> (u8, u8, u8) {
        (
            (self.x & 0xF) as u8,
            (self.y & 0xF) as u8,
            (self.z & 0xF) as u8,
        )
    }

    pub fn offset(&self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

impl std::fmt::Display for BlockPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Group a batch of block changes by the section they fall in, for
/// section-addressed multi-block-change payloads.
pub fn group_by_section(
    blocks: &HashMap<BlockPos, BlockState>,
) -> HashMap<SectionPos, Vec<(BlockPos, BlockState)>> {
    let mut sections: HashMap<SectionPos, Vec<(BlockPos, BlockState)>> = HashMap::new();
    for (&pos, &state) in blocks {
        sections
            .entry(SectionPos::containing(pos))
            .or_default()
            .push((pos, state));
    }
    sections
}

/// Per-session overlay of fake blocks with original-state snapshots.
///
/// Not thread-safe on its own; the session registry wraps it in a lock.
#[derive(Debug, Default)]
pub struct BlockOverlay {
    /// Authentic state for every overlaid position
    original: HashMap<BlockPos, BlockState>,
    /// Chunk index over `original` so chunk unloads restore in O(blocks-in-chunk)
    by_chunk: HashMap<ChunkPos, HashSet<BlockPos>>,
}

impl BlockOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.original.is_empty()
    }

    pub fn len(&self) -> usize {
        self.original.len()
    }

    pub fn covers_chunk(&self, chunk: ChunkPos) -> bool {
        self.by_chunk.contains_key(&chunk)
    }

    /// Record fake blocks, snapshotting the authentic state for each position.
    /// Positions already overlaid keep their first snapshot.
    pub fn apply<I>(&mut self, blocks: I)
    where
        I: IntoIterator<Item = (BlockPos, BlockState)>,
    {
        for (pos, original_state) in blocks {
            if self.original.contains_key(&pos) {
                continue;
            }
            self.original.insert(pos, original_state);
            self.by_chunk
                .entry(ChunkPos::containing(pos))
                .or_default()
                .insert(pos);
        }
    }

    /// Mark a chunk as processed even when no overlay blocks landed in it,
    /// so re-entering the chunk does not recompute the batch.
    pub fn mark_chunk(&mut self, chunk: ChunkPos) {
        self.by_chunk.entry(chunk).or_default();
    }

    /// Drop overlay state for a chunk, returning the authentic states that
    /// must be re-sent to the client to undo the illusion.
    pub fn restore_chunk(&mut self, chunk: ChunkPos) -> HashMap<BlockPos, BlockState> {
        let mut restored = HashMap::new();
        if let Some(positions) = self.by_chunk.remove(&chunk) {
            for pos in positions {
                if let Some(state) = self.original.remove(&pos) {
                    restored.insert(pos, state);
                }
            }
        }
        restored
    }

    /// Drop the whole overlay, returning every authentic state for restore.
    pub fn restore_all(&mut self) -> HashMap<BlockPos, BlockState> {
        self.by_chunk.clear();
        std::mem::take(&mut self.original)
    }
}

/// Columns in `chunk` whose rounded horizontal distance from `center` equals
/// `radius`, extruded over `y_min..=y_max`. This is the border ring a session
/// sees around its own position.
pub fn border_columns_in_chunk(
    center: BlockPos,
    chunk: ChunkPos,
    radius: i32,
    y_min: i32,
    y_max: i32,
) -> Vec<BlockPos> {
    let mut out = Vec::new();
    if y_min > y_max || radius <= 0 {
        return out;
    }
    let (base_x, base_z) = chunk.base_block();
    for x in base_x..base_x + 16 {
        for z in base_z..base_z + 16 {
            let dx = f64::from(x - center.x);
            let dz = f64::from(z - center.z);
            let dist = dx.hypot(dz);
            if dist.round() as i32 == radius {
                for y in y_min..=y_max {
                    out.push(BlockPos::new(x, y, z));
                }
            }
        }
    }
    out
}
