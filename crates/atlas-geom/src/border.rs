use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{CHUNK_BLOCKS, ChunkPos, REGION_BLOCKS, RegionPos};

/// Axis-aligned world bounds in block coordinates. Both `min_*` and `max_*`
/// are inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldBorder {
    pub center_x: i32,
    pub center_z: i32,
    pub min_x: i32,
    pub min_z: i32,
    pub max_x: i32,
    pub max_z: i32,
}

impl WorldBorder {
    pub const fn new(
        center_x: i32,
        center_z: i32,
        min_x: i32,
        min_z: i32,
        max_x: i32,
        max_z: i32,
    ) -> Self {
        Self {
            center_x,
            center_z,
            min_x,
            min_z,
            max_x,
            max_z,
        }
    }

    /// Border of a square of `size` blocks around a (possibly fractional)
    /// center, the way host worlds describe theirs.
    pub fn from_center_size(center_x: f64, center_z: f64, size: f64) -> Self {
        let half = size * 0.5;
        let clamp = |v: f64| v.floor().clamp(i32::MIN as f64, i32::MAX as f64) as i32;
        Self {
            center_x: clamp(center_x),
            center_z: clamp(center_z),
            min_x: clamp(center_x - half),
            min_z: clamp(center_z - half),
            max_x: clamp(center_x + half),
            max_z: clamp(center_z + half),
        }
    }

    /// Square of exactly `size` blocks whose min corner is `center - size / 2`.
    pub fn square(center_x: i32, center_z: i32, size: i32) -> Self {
        let min_x = center_x - size / 2;
        let min_z = center_z - size / 2;
        Self {
            center_x,
            center_z,
            min_x,
            min_z,
            max_x: min_x + size - 1,
            max_z: min_z + size - 1,
        }
    }

    pub const fn unbounded() -> Self {
        Self {
            center_x: 0,
            center_z: 0,
            min_x: i32::MIN,
            min_z: i32::MIN,
            max_x: i32::MAX,
            max_z: i32::MAX,
        }
    }

    #[inline]
    pub fn contains_block(&self, x: i32, z: i32) -> bool {
        x >= self.min_x && x <= self.max_x && z >= self.min_z && z <= self.max_z
    }

    #[inline]
    pub fn contains_chunk(&self, chunk: ChunkPos) -> bool {
        self.intersects(
            i64::from(chunk.min_block_x()),
            i64::from(chunk.min_block_z()),
            i64::from(CHUNK_BLOCKS),
        )
    }

    /// True if any block of the region lies inside the border.
    #[inline]
    pub fn contains_region(&self, region: RegionPos) -> bool {
        self.intersects(
            region.min_block_x(),
            region.min_block_z(),
            i64::from(REGION_BLOCKS),
        )
    }

    pub fn center_region(&self) -> RegionPos {
        RegionPos::from_block(self.center_x, self.center_z)
    }

    pub fn center_chunk(&self) -> ChunkPos {
        ChunkPos::from_block(self.center_x, self.center_z)
    }

    pub fn is_malformed(&self) -> bool {
        self.min_x > self.max_x
            || self.min_z > self.max_z
            || !self.contains_block(self.center_x, self.center_z)
    }

    fn intersects(&self, ax: i64, az: i64, size: i64) -> bool {
        let bx = ax + size - 1;
        let bz = az + size - 1;
        ax <= i64::from(self.max_x)
            && bx >= i64::from(self.min_x)
            && az <= i64::from(self.max_z)
            && bz >= i64::from(self.min_z)
    }
}

impl Default for WorldBorder {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl fmt::Display for WorldBorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({} {})-({} {})",
            self.center_x, self.center_z, self.min_x, self.min_z, self.max_x, self.max_z
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_border_is_inclusive() {
        let border = WorldBorder::square(0, 0, 1024);
        assert_eq!((border.min_x, border.max_x), (-512, 511));
        assert!(border.contains_block(-512, 511));
        assert!(!border.contains_block(512, 0));
        assert!(border.contains_region(RegionPos::new(-1, -1)));
        assert!(border.contains_region(RegionPos::new(0, 0)));
        assert!(!border.contains_region(RegionPos::new(1, 0)));
        assert!(!border.contains_chunk(ChunkPos::new(32, 0)));
        assert!(border.contains_chunk(ChunkPos::new(31, -32)));
    }

    #[test]
    fn host_border_uses_z_for_z_bounds() {
        let border = WorldBorder::from_center_size(1000.5, -200.5, 100.0);
        assert_eq!((border.min_x, border.max_x), (950, 1050));
        assert_eq!((border.min_z, border.max_z), (-251, -151));
        assert!(!border.is_malformed());
    }

    #[test]
    fn malformed_when_center_escapes() {
        let border = WorldBorder::new(5000, 0, -10, -10, 10, 10);
        assert!(border.is_malformed());
        assert!(WorldBorder::new(0, 0, 10, 0, -10, 0).is_malformed());
    }

    #[test]
    fn unbounded_never_overflows() {
        let border = WorldBorder::unbounded();
        assert!(border.contains_region(RegionPos::new(i32::MAX >> 9, i32::MIN >> 9)));
        assert!(border.contains_chunk(ChunkPos::new(i32::MAX >> 4, 0)));
        assert_eq!(border.to_string(), format!("0 0 ({} {})-({} {})", i32::MIN, i32::MIN, i32::MAX, i32::MAX));
    }
}
