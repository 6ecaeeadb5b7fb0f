use serde::{Deserialize, Serialize};

pub const DAY_TICKS: i64 = 24_000;

/// Horizontal step toward the block the sun light comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LightDirection {
    pub dx: i32,
    pub dz: i32,
}

impl Default for LightDirection {
    fn default() -> Self {
        Self { dx: 0, dz: 1 }
    }
}

impl LightDirection {
    pub const fn new(dx: i32, dz: i32) -> Self {
        Self { dx, dz }
    }

    /// Picks one of eight compass steps from the day clock.
    pub fn from_day_time(ticks: i64) -> Self {
        let (dx, dz) = match ticks.rem_euclid(DAY_TICKS) {
            t if t < 1500 => (1, 0),
            t if t < 4500 => (1, -1),
            t if t < 7500 => (0, -1),
            t if t < 10500 => (-1, -1),
            t if t < 13500 => (-1, 0),
            t if t < 16500 => (-1, 1),
            t if t < 19500 => (0, 1),
            t if t < 22500 => (1, 1),
            _ => (1, 0),
        };
        Self { dx, dz }
    }

    /// Chunk offsets whose blocks the shading lookahead of a chunk can reach.
    pub fn halo_offsets(self) -> Vec<(i32, i32)> {
        let mut out = Vec::with_capacity(3);
        for off in [(self.dx, 0), (0, self.dz), (self.dx, self.dz)] {
            if off != (0, 0) && !out.contains(&off) {
                out.push(off);
            }
        }
        out
    }
}
