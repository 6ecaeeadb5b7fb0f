use atlas_blocks::MaterialId;

use crate::host::{BlockSample, FULL_SKY};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Span {
    bottom: i32,
    top: i32,
    material: MaterialId,
    waterlogged: bool,
}

/// One (x, z) block column stored as vertical runs. Anything not covered by
/// a run is plain air. Blocks above the topmost non-air block see the sky.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Column {
    // ascending by `bottom`, disjoint
    spans: Vec<Span>,
}

impl Column {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fills `bottom..=top` with `material`, replacing what was there.
    pub fn fill(&mut self, bottom: i32, top: i32, material: MaterialId) -> &mut Self {
        self.fill_with(bottom, top, material, false)
    }

    /// Like [`Column::fill`] but the blocks also hold water.
    pub fn fill_waterlogged(&mut self, bottom: i32, top: i32, material: MaterialId) -> &mut Self {
        self.fill_with(bottom, top, material, true)
    }

    pub fn set(&mut self, y: i32, material: MaterialId) -> &mut Self {
        self.fill_with(y, y, material, false)
    }

    fn fill_with(&mut self, bottom: i32, top: i32, material: MaterialId, waterlogged: bool) -> &mut Self {
        if bottom > top {
            return self;
        }
        let mut out = Vec::with_capacity(self.spans.len() + 2);
        for s in self.spans.drain(..) {
            if s.top < bottom || s.bottom > top {
                out.push(s);
                continue;
            }
            if s.bottom < bottom {
                out.push(Span { top: bottom - 1, ..s });
            }
            if s.top > top {
                out.push(Span { bottom: top + 1, ..s });
            }
        }
        if material != MaterialId::AIR {
            out.push(Span {
                bottom,
                top,
                material,
                waterlogged,
            });
        }
        out.sort_by_key(|s| s.bottom);
        self.spans = out;
        self
    }

    /// Material and waterlog flag at `y`.
    pub fn block(&self, y: i32) -> (MaterialId, bool) {
        self.spans
            .iter()
            .find(|s| s.bottom <= y && y <= s.top)
            .map(|s| (s.material, s.waterlogged))
            .unwrap_or((MaterialId::AIR, false))
    }

    /// Highest non-air block, if any.
    pub fn top(&self) -> Option<i32> {
        self.spans
            .iter()
            .rev()
            .find(|s| !s.material.is_air())
            .map(|s| s.top)
    }

    pub fn sample(&self, y: i32) -> BlockSample {
        let (material, waterlogged) = self.block(y);
        let sky_light = match self.top() {
            Some(top) if y <= top => 0,
            _ => FULL_SKY,
        };
        BlockSample {
            material,
            sky_light,
            waterlogged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STONE: MaterialId = MaterialId(10);
    const DIRT: MaterialId = MaterialId(11);

    #[test]
    fn fill_splits_existing_runs() {
        let mut col = Column::new();
        col.fill(0, 10, STONE).fill(4, 6, DIRT).set(5, MaterialId::AIR);
        assert_eq!(col.block(3).0, STONE);
        assert_eq!(col.block(4).0, DIRT);
        assert_eq!(col.block(5).0, MaterialId::AIR);
        assert_eq!(col.block(6).0, DIRT);
        assert_eq!(col.block(7).0, STONE);
        assert_eq!(col.block(11).0, MaterialId::AIR);
        assert_eq!(col.top(), Some(10));
    }

    #[test]
    fn sky_light_only_above_top() {
        let mut col = Column::new();
        col.fill(0, 20, STONE).fill(5, 8, MaterialId::CAVE_AIR);
        assert_eq!(col.sample(21).sky_light, FULL_SKY);
        assert_eq!(col.sample(20).sky_light, 0);
        assert_eq!(col.sample(6).sky_light, 0);
        assert!(col.sample(6).is_air());
    }

    #[test]
    fn waterlogged_blocks_count_as_water() {
        let mut col = Column::new();
        col.fill(0, 3, STONE).fill_waterlogged(4, 4, DIRT);
        assert!(col.sample(4).is_water());
        assert!(!col.sample(3).is_water());
    }
}
