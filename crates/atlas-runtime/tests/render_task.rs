mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use atlas_blocks::Color;
use atlas_geom::{ChunkPos, RegionPos, WorldBorder};
use atlas_io::MemoryTileStore;
use atlas_render::RenderVariant;
use atlas_runtime::{ChunkLeaseManager, IoPool, RegionCache, RegionCaches, RegionState, RenderTask};
use atlas_world::MemoryWorld;

use common::{colors, flat_world, lit_grass, settings};

const VARIANTS: [RenderVariant; 2] = [RenderVariant::Surface, RenderVariant::Cave];

fn caches(store: &Arc<MemoryTileStore>) -> RegionCaches {
    VARIANTS
        .iter()
        .map(|&v| (v, RegionCache::new(v, store.clone(), IoPool::Inline, 1200)))
        .collect()
}

fn tick(
    task: &mut RenderTask<MemoryWorld>,
    leases: &mut ChunkLeaseManager<MemoryWorld>,
    caches: &mut RegionCaches,
    border: &WorldBorder,
) -> bool {
    leases.poll();
    for cache in caches.values_mut() {
        cache.tick(Some(border));
    }
    task.tick(leases, caches, &settings(), Instant::now() + Duration::from_millis(200))
}

#[test]
fn batch_waits_for_residency_then_completes() {
    let border = WorldBorder::square(0, 0, 64);
    let world = flat_world(border);
    let store = Arc::new(MemoryTileStore::new());
    let mut caches = caches(&store);
    let mut leases = ChunkLeaseManager::new(Arc::clone(&world));
    let region = RegionPos::new(0, 0);

    let mut task = RenderTask::for_region(&mut leases, colors(), border, &VARIANTS, region);
    assert_eq!(task.chunks_to_render().len(), 4);
    // Day 6000 lights from the north, so the batch also needs the chunks
    // north of it.
    assert_eq!(task.pending_chunks(&leases).len(), 6);
    assert!(leases.count(ChunkPos::new(0, -1)) > 0);

    for _ in 0..5 {
        assert!(!tick(&mut task, &mut leases, &mut caches, &border));
    }
    assert_eq!(task.pending_chunks(&leases).len(), 6);
    assert_eq!(task.remaining(), 8);
    assert_eq!(store.saves(), 0);
    let surface = &caches[&RenderVariant::Surface];
    assert_eq!(surface.state(region), Some(RegionState::Loaded));
    assert!(surface.image(region).is_some_and(|img| img.is_blank()));
    let message = task.debug_message().expect("diagnostic after waiting");
    assert!(message.contains("chunk("), "{message}");

    assert_eq!(world.finish_loads(), 6);
    let mut done = false;
    for _ in 0..10 {
        if tick(&mut task, &mut leases, &mut caches, &border) {
            done = true;
            break;
        }
    }
    assert!(done);
    assert!(task.is_done());
    assert_eq!(world.pinned_count(), 0);
    assert!(leases.held_chunks().is_empty());

    for _ in 0..10 {
        for cache in caches.values_mut() {
            cache.tick(Some(&border));
        }
    }
    assert_eq!(store.saves(), 2);
    let tile = store.get(RenderVariant::Surface, region).expect("surface tile saved");
    assert_eq!(tile.get(0, 0), lit_grass());
    assert_eq!(tile.get(31, 31), lit_grass());
    assert_eq!(tile.get(32, 0), Color::TRANSPARENT);
    assert_eq!(tile.count(lit_grass()), 32 * 32);

    let cave = store.get(RenderVariant::Cave, region).expect("cave tile saved");
    assert_eq!(cave.get(5, 5), Color::NO_DATA);
}

#[test]
fn chunk_batches_paste_at_their_offset() {
    let border = WorldBorder::unbounded();
    let world = flat_world(border);
    world.set_auto_load(true);
    let store = Arc::new(MemoryTileStore::new());
    let mut caches = caches(&store);
    let mut leases = ChunkLeaseManager::new(Arc::clone(&world));

    let chunk = ChunkPos::new(-31, 2);
    let mut task = RenderTask::for_chunks(&mut leases, colors(), border, &[RenderVariant::Surface], vec![chunk, chunk]);
    assert_eq!(task.chunks_to_render(), &[chunk]);
    let mut ticks = 0;
    while !tick(&mut task, &mut leases, &mut caches, &border) {
        ticks += 1;
        assert!(ticks < 10, "task never finished");
    }
    for _ in 0..4 {
        caches.get_mut(&RenderVariant::Surface).unwrap().tick(Some(&border));
    }
    let tile = store.get(RenderVariant::Surface, RegionPos::new(-1, 0)).expect("saved");
    let (px, pz) = chunk.pixel_offset();
    assert_eq!((px, pz), (16, 32));
    assert_eq!(tile.get(px, pz), lit_grass());
    assert_eq!(tile.get(px + 15, pz + 15), lit_grass());
    assert_eq!(tile.get(px + 16, pz), Color::TRANSPARENT);
    assert_eq!(tile.count(lit_grass()), 256);
}

#[test]
fn cancelled_task_releases_its_chunks() {
    let border = WorldBorder::square(0, 0, 64);
    let world = flat_world(border);
    world.set_auto_load(true);
    let store = Arc::new(MemoryTileStore::new());
    let mut caches = caches(&store);
    let mut leases = ChunkLeaseManager::new(Arc::clone(&world));
    let mut task = RenderTask::for_region(&mut leases, colors(), border, &VARIANTS, RegionPos::new(-1, -1));
    leases.poll();
    assert!(world.pinned_count() > 0);
    task.cancel(&mut leases);
    assert!(task.is_done());
    assert_eq!(world.pinned_count(), 0);
    assert!(tick(&mut task, &mut leases, &mut caches, &border));
    assert_eq!(store.saves(), 0);
}
