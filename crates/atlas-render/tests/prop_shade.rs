use std::sync::Arc;

use atlas_blocks::{ColorTable, MaterialCatalog, MaterialId, Shade};
use atlas_geom::{ChunkPos, WorldBorder};
use atlas_render::{LightDirection, RenderVariant, TerrainSampler, liquid_shade, relief_shade};
use atlas_world::{Column, MemoryWorld};
use proptest::prelude::*;

fn layer() -> impl Strategy<Value = (u16, i32)> {
    // material id (reserved + standard range) and thickness
    (0u16..30, 1i32..12)
}

proptest! {
    // Deeper liquid is never brighter, for either dither parity
    #[test]
    fn liquid_shade_darkens_with_depth(d in 0i32..40, px in 0i32..512, pz in 0i32..512) {
        let a = liquid_shade(d, px, pz);
        let b = liquid_shade(d + 1, px, pz);
        prop_assert!(b.brightness_rank() <= a.brightness_rank());
        prop_assert_eq!(a, liquid_shade(d, px, pz));
        prop_assert_eq!(a, liquid_shade(d, px + 2, pz + 2));
    }

    #[test]
    fn relief_shade_is_antisymmetric(h in -64i32..320, n in -64i32..320) {
        let here = relief_shade(h, Some(n));
        let there = relief_shade(n, Some(h));
        match h.cmp(&n) {
            std::cmp::Ordering::Equal => {
                prop_assert_eq!(here, Shade::Light);
                prop_assert_eq!(there, Shade::Light);
            }
            _ => prop_assert_ne!(here, there),
        }
    }

    // Sampling without mutation in between gives the same color
    #[test]
    fn sampling_is_idempotent(
        layers in prop::collection::vec(layer(), 1..10),
        variant in prop::sample::select(RenderVariant::ALL.to_vec()),
        day in 0i64..24_000,
        x in 0i32..16,
        z in 0i32..16,
    ) {
        let catalog = MaterialCatalog::standard();
        let colors = ColorTable::builtin(&catalog).expect("colors");
        let world = Arc::new(MemoryWorld::new(0, 255));
        let mut col = Column::new();
        let mut y = 0;
        for (mat, thickness) in layers {
            col.fill(y, y + thickness - 1, MaterialId(mat));
            y += thickness;
        }
        world.set_default_column(col);
        for dz in -1..=1 {
            for dx in -1..=1 {
                world.make_resident(ChunkPos::new(dx, dz));
            }
        }
        let border = WorldBorder::new(0, 0, -100, -100, 100, 100);
        let sampler = TerrainSampler::new(&colors, &border, LightDirection::from_day_time(day));
        let first = sampler.sample(&*world, variant, x, z, x, z);
        let second = sampler.sample(&*world, variant, x, z, x, z);
        prop_assert_eq!(first, second);
    }
}
