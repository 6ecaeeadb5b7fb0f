use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{CHUNK_BLOCKS, CHUNK_SHIFT, REGION_CHUNK_SHIFT, REGION_CHUNKS, REGION_SHIFT};

/// A 16x16 column group, the host's load/unload unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkPos {
    pub cx: i32,
    pub cz: i32,
}

impl ChunkPos {
    #[inline]
    pub const fn new(cx: i32, cz: i32) -> Self {
        Self { cx, cz }
    }

    #[inline]
    pub const fn from_block(x: i32, z: i32) -> Self {
        Self {
            cx: x >> CHUNK_SHIFT,
            cz: z >> CHUNK_SHIFT,
        }
    }

    #[inline]
    pub fn offset(self, dx: i32, dz: i32) -> Self {
        Self {
            cx: self.cx + dx,
            cz: self.cz + dz,
        }
    }

    #[inline]
    pub const fn region(self) -> RegionPos {
        RegionPos {
            rx: self.cx >> REGION_CHUNK_SHIFT,
            rz: self.cz >> REGION_CHUNK_SHIFT,
        }
    }

    #[inline]
    pub const fn min_block_x(self) -> i32 {
        self.cx << CHUNK_SHIFT
    }

    #[inline]
    pub const fn min_block_z(self) -> i32 {
        self.cz << CHUNK_SHIFT
    }

    /// Pixel offset of this chunk's top-left corner inside its region tile.
    #[inline]
    pub const fn pixel_offset(self) -> (usize, usize) {
        let mask = REGION_CHUNKS - 1;
        (
            ((self.cx & mask) * CHUNK_BLOCKS) as usize,
            ((self.cz & mask) * CHUNK_BLOCKS) as usize,
        )
    }
}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chunk({}, {})", self.cx, self.cz)
    }
}

impl From<(i32, i32)> for ChunkPos {
    fn from(value: (i32, i32)) -> Self {
        Self::new(value.0, value.1)
    }
}

/// A 32x32-chunk tile; the region cache and tile files are keyed by it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionPos {
    pub rx: i32,
    pub rz: i32,
}

impl RegionPos {
    #[inline]
    pub const fn new(rx: i32, rz: i32) -> Self {
        Self { rx, rz }
    }

    #[inline]
    pub const fn from_block(x: i32, z: i32) -> Self {
        Self {
            rx: x >> REGION_SHIFT,
            rz: z >> REGION_SHIFT,
        }
    }

    #[inline]
    pub fn offset(self, dx: i32, dz: i32) -> Self {
        Self {
            rx: self.rx + dx,
            rz: self.rz + dz,
        }
    }

    #[inline]
    pub const fn min_block_x(self) -> i64 {
        (self.rx as i64) << REGION_SHIFT
    }

    #[inline]
    pub const fn min_block_z(self) -> i64 {
        (self.rz as i64) << REGION_SHIFT
    }

    #[inline]
    pub const fn min_chunk(self) -> ChunkPos {
        ChunkPos {
            cx: self.rx << REGION_CHUNK_SHIFT,
            cz: self.rz << REGION_CHUNK_SHIFT,
        }
    }

    /// All chunks of the region in row-major order (z outer, x inner).
    pub fn chunks(self) -> impl Iterator<Item = ChunkPos> {
        let base = self.min_chunk();
        (0..REGION_CHUNKS)
            .flat_map(move |dz| (0..REGION_CHUNKS).map(move |dx| base.offset(dx, dz)))
    }

    #[inline]
    pub fn contains_chunk(self, chunk: ChunkPos) -> bool {
        chunk.region() == self
    }

    /// Tile file stem, `r.<x>.<z>`.
    pub fn file_stem(self) -> String {
        format!("r.{}.{}", self.rx, self.rz)
    }
}

impl fmt::Display for RegionPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "region({}, {})", self.rx, self.rz)
    }
}

impl From<(i32, i32)> for RegionPos {
    fn from(value: (i32, i32)) -> Self {
        Self::new(value.0, value.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_blocks_floor_into_chunks_and_regions() {
        assert_eq!(ChunkPos::from_block(-1, -16), ChunkPos::new(-1, -1));
        assert_eq!(ChunkPos::from_block(-17, 15), ChunkPos::new(-2, 0));
        assert_eq!(RegionPos::from_block(-1, 511), RegionPos::new(-1, 0));
        assert_eq!(ChunkPos::new(-1, -33).region(), RegionPos::new(-1, -2));
    }

    #[test]
    fn pixel_offset_wraps_inside_region() {
        assert_eq!(ChunkPos::new(0, 0).pixel_offset(), (0, 0));
        assert_eq!(ChunkPos::new(31, 1).pixel_offset(), (496, 16));
        assert_eq!(ChunkPos::new(-1, -32).pixel_offset(), (496, 0));
    }

    #[test]
    fn region_chunks_cover_exactly_the_region() {
        let region = RegionPos::new(-2, 3);
        let chunks: Vec<_> = region.chunks().collect();
        assert_eq!(chunks.len(), 1024);
        assert!(chunks.iter().all(|c| region.contains_chunk(*c)));
        assert_eq!(chunks[0], region.min_chunk());
        assert_eq!(chunks[1], region.min_chunk().offset(1, 0));
    }
}
