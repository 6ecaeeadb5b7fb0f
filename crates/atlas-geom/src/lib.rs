//! Chunk/region coordinates and world border math (no world dependency).
#![forbid(unsafe_code)]

mod border;
mod coords;

pub use border::WorldBorder;
pub use coords::{ChunkPos, RegionPos};

/// Blocks along one side of a chunk.
pub const CHUNK_BLOCKS: i32 = 16;
/// Chunks along one side of a region.
pub const REGION_CHUNKS: i32 = 32;
/// Blocks (and tile pixels) along one side of a region.
pub const REGION_BLOCKS: i32 = CHUNK_BLOCKS * REGION_CHUNKS;

pub(crate) const CHUNK_SHIFT: u32 = 4;
pub(crate) const REGION_CHUNK_SHIFT: u32 = 5;
pub(crate) const REGION_SHIFT: u32 = CHUNK_SHIFT + REGION_CHUNK_SHIFT;
