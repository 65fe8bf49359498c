//! Blueprint generators for geometric shapes.
//!
//! Each generator returns a map of positions to a block state, ready to be
//! injected as fake blocks without touching any authoritative world state.
//! Hollow shapes keep only the outer shell so batches stay small.

use crate::game::block::{BlockPos, BlockState};
use std::collections::HashMap;

/// Shape selector for callers driving generation from input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Platform,
    Cube,
    Sphere,
    Cylinder,
    Dome,
}

impl ShapeKind {
    /// Generate this shape's blueprint at `center`. `size` is the half-extent
    /// for platforms and cubes and the radius for the round shapes; cylinders
    /// stand two radii tall.
    pub fn generate(
        self,
        center: BlockPos,
        size: i32,
        state: BlockState,
    ) -> HashMap<BlockPos, BlockState> {
        match self {
            ShapeKind::Platform => platform(center, size, state),
            ShapeKind::Cube => cube(center, size, state),
            ShapeKind::Sphere => sphere(center, size, state),
            ShapeKind::Cylinder => cylinder(center, size, size * 2, state),
            ShapeKind::Dome => dome(center, size, state),
        }
    }
}

/// Flat square platform of `(2 * size + 1)^2` blocks at the center's Y level
pub fn platform(center: BlockPos, size: i32, state: BlockState) -> HashMap<BlockPos, BlockState> {
    let mut blocks = HashMap::new();
    for x in -size..=size {
        for z in -size..=size {
            blocks.insert(center.offset(x, 0, z), state);
        }
    }
    blocks
}

/// Hollow cube shell with half-edge `size`
pub fn cube(center: BlockPos, size: i32, state: BlockState) -> HashMap<BlockPos, BlockState> {
    let mut blocks = HashMap::new();
    for x in -size..=size {
        for y in -size..=size {
            for z in -size..=size {
                if x.abs() == size || y.abs() == size || z.abs() == size {
                    blocks.insert(center.offset(x, y, z), state);
                }
            }
        }
    }
    blocks
}

/// Hollow sphere shell of the given radius
pub fn sphere(center: BlockPos, radius: i32, state: BlockState) -> HashMap<BlockPos, BlockState> {
    let mut blocks = HashMap::new();
    let outer = radius * radius;
    let inner = (radius - 1) * (radius - 1);
    for x in -radius..=radius {
        for y in -radius..=radius {
            for z in -radius..=radius {
                let dist_sq = x * x + y * y + z * z;
                if dist_sq > inner && dist_sq <= outer {
                    blocks.insert(center.offset(x, y, z), state);
                }
            }
        }
    }
    blocks
}

/// Hollow cylinder of the given radius and height with solid caps
pub fn cylinder(
    center: BlockPos,
    radius: i32,
    height: i32,
    state: BlockState,
) -> HashMap<BlockPos, BlockState> {
    let mut blocks = HashMap::new();
    let outer = radius * radius;
    let inner = (radius - 1) * (radius - 1);
    for y in 0..height {
        for x in -radius..=radius {
            for z in -radius..=radius {
                let dist_sq = x * x + z * z;
                let on_cap = y == 0 || y == height - 1;
                let keep = if on_cap {
                    dist_sq <= outer
                } else {
                    dist_sq > inner && dist_sq <= outer
                };
                if keep {
                    blocks.insert(center.offset(x, y, z), state);
                }
            }
        }
    }
    blocks
}

/// Hollow upper-hemisphere shell of the given radius
pub fn dome(center: BlockPos, radius: i32, state: BlockState) -> HashMap<BlockPos, BlockState> {
    let mut blocks = HashMap::new();
    let outer = radius * radius;
    let inner = (radius - 1) * (radius - 1);
    for x in -radius..=radius {
        for y in 0..=radius {
            for z in -radius..=radius {
                let dist_sq = x * x + y * y + z * z;
                if dist_sq > inner && dist_sq <= outer {
                    blocks.insert(center.offset(x, y, z), state);
                }
            }
        }
    }
    blocks
}
