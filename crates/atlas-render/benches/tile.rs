use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use criterion::{Criterion, criterion_group, criterion_main};

use atlas_blocks::{ColorTable, MaterialCatalog, MaterialId};
use atlas_geom::{ChunkPos, RegionPos, WorldBorder};
use atlas_render::{LightDirection, REGION_SIZE, RenderVariant, TileRenderer};
use atlas_world::{Column, MemoryWorld};

fn stepped_world(catalog: &MaterialCatalog) -> Arc<MemoryWorld> {
    let world = Arc::new(MemoryWorld::new(-64, 319));
    let stone = catalog.id("stone");
    let grass = catalog.id("grass_block");
    for z in 0..=REGION_SIZE as i32 {
        for x in 0..=REGION_SIZE as i32 {
            let h = 60 + ((x / 8 + z / 8) % 12);
            let mut col = Column::new();
            col.fill(-64, h - 1, stone).set(h, grass);
            if (x + z) % 7 == 0 {
                col.fill(h + 1, h + 4, MaterialId::WATER);
            }
            world.set_column(x, z, col);
        }
    }
    for chunk in RegionPos::new(0, 0).chunks() {
        world.make_resident(chunk);
    }
    for i in 0..=32 {
        world.make_resident(ChunkPos::new(i, 32));
        world.make_resident(ChunkPos::new(32, i));
    }
    world
}

fn bench_chunk_tiles(c: &mut Criterion) {
    let mut group = c.benchmark_group("tile_render");
    group.measurement_time(Duration::from_secs(5));
    group.sample_size(10);
    let catalog = MaterialCatalog::standard();
    let colors = Arc::new(ColorTable::builtin(&catalog).unwrap());
    let world = stepped_world(&catalog);
    let border = WorldBorder::unbounded();
    for variant in [RenderVariant::Surface, RenderVariant::Cave] {
        group.bench_function(format!("chunk_16x16_{variant}"), |b| {
            b.iter(|| {
                let mut r = TileRenderer::for_chunk(
                    world.clone(),
                    colors.clone(),
                    border,
                    LightDirection::new(1, 1),
                    variant,
                    ChunkPos::new(5, 7),
                );
                black_box(r.run(usize::MAX));
                black_box(r.into_buffer());
            })
        });
    }
    group.bench_function("region_512x512_surface", |b| {
        b.iter(|| {
            let mut r = TileRenderer::new(
                world.clone(),
                colors.clone(),
                border,
                LightDirection::new(0, 1),
                RenderVariant::Surface,
                0,
                0,
                REGION_SIZE,
                REGION_SIZE,
            );
            black_box(r.run(usize::MAX));
        })
    });
    group.finish();
}

criterion_group!(benches, bench_chunk_tiles);
criterion_main!(benches);
