use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use atlas_blocks::{BaseColor, Color, Shade};
use atlas_geom::{RegionPos, WorldBorder};
use atlas_io::{MemoryTileStore, StoreError, TileStore};
use atlas_render::{PixelBuffer, RenderVariant};
use atlas_runtime::{IoPool, RegionCache, RegionState};

const SURFACE: RenderVariant = RenderVariant::Surface;

fn border() -> WorldBorder {
    WorldBorder::square(0, 0, 2048)
}

fn cache(store: &Arc<MemoryTileStore>, idle: u32) -> RegionCache {
    RegionCache::new(SURFACE, store.clone(), IoPool::Inline, idle)
}

fn loaded(cache: &mut RegionCache, region: RegionPos) {
    cache.touch(region);
    cache.tick(Some(&border()));
    cache.tick(Some(&border()));
    assert_eq!(cache.state(region), Some(RegionState::Loaded));
}

struct FailingStore;

impl TileStore for FailingStore {
    fn load(&self, _: RenderVariant, _: RegionPos) -> Result<Option<PixelBuffer>, StoreError> {
        Err(StoreError::Io {
            path: PathBuf::from("broken.png"),
            source: io::Error::other("disk on fire"),
        })
    }

    fn save(&self, _: RenderVariant, _: RegionPos, _: &PixelBuffer) -> Result<(), StoreError> {
        Err(StoreError::Io {
            path: PathBuf::from("broken.png"),
            source: io::Error::other("disk on fire"),
        })
    }
}

#[test]
fn init_waits_for_a_border_then_loads_blank() {
    let store = Arc::new(MemoryTileStore::new());
    let mut cache = cache(&store, 1200);
    let region = RegionPos::new(0, 0);
    cache.touch(region);
    assert_eq!(cache.state(region), Some(RegionState::Init));
    cache.tick(None);
    assert_eq!(cache.state(region), Some(RegionState::Init));

    cache.tick(Some(&border()));
    assert_eq!(cache.state(region), Some(RegionState::Loading));
    assert!(cache.image_mut(region).is_none());
    cache.tick(Some(&border()));
    assert_eq!(cache.state(region), Some(RegionState::Loaded));
    assert!(cache.image(region).is_some_and(PixelBuffer::is_blank));
    assert!(cache.is_idle());
}

#[test]
fn regions_outside_the_border_never_load() {
    let store = Arc::new(MemoryTileStore::new());
    let mut cache = cache(&store, 1200);
    let far = RegionPos::new(40, 0);
    cache.touch(far);
    cache.tick(Some(&border()));
    assert_eq!(cache.state(far), Some(RegionState::OutOfBounds));
    assert!(cache.image(far).is_none());
    cache.tick(Some(&border()));
    assert_eq!(cache.state(far), Some(RegionState::OutOfBounds));
    assert_eq!(cache.stats().loads, 0);
}

#[test]
fn existing_tiles_are_loaded_from_the_store() {
    let store = Arc::new(MemoryTileStore::new());
    let region = RegionPos::new(-1, 1);
    let mut tile = PixelBuffer::region();
    let sand = Color::new(BaseColor::SAND, Shade::Bright);
    tile.set(3, 4, sand);
    store.insert(SURFACE, region, tile);

    let mut cache = cache(&store, 1200);
    loaded(&mut cache, region);
    assert_eq!(cache.image(region).map(|img| img.get(3, 4)), Some(sand));
}

#[test]
fn save_goes_through_saving_back_to_loaded() {
    let store = Arc::new(MemoryTileStore::new());
    let mut cache = cache(&store, 1200);
    let region = RegionPos::new(1, 0);
    loaded(&mut cache, region);
    let snow = Color::new(BaseColor::SNOW, Shade::Normal);
    cache.image_mut(region).expect("loaded").set(10, 10, snow);

    cache.schedule_save(region);
    assert_eq!(cache.state(region), Some(RegionState::Saving));
    assert!(cache.image_mut(region).is_none());
    cache.tick(Some(&border()));
    cache.tick(Some(&border()));
    assert_eq!(cache.state(region), Some(RegionState::Loaded));
    assert_eq!(store.saves(), 1);
    assert_eq!(store.get(SURFACE, region).map(|img| img.get(10, 10)), Some(snow));
}

#[test]
#[should_panic(expected = "schedule_save")]
fn save_outside_loaded_panics() {
    let store = Arc::new(MemoryTileStore::new());
    let mut cache = cache(&store, 1200);
    let region = RegionPos::new(0, 0);
    cache.touch(region);
    cache.schedule_save(region);
}

#[test]
#[should_panic(expected = "schedule_load")]
fn load_outside_init_panics() {
    let store = Arc::new(MemoryTileStore::new());
    let mut cache = cache(&store, 1200);
    let region = RegionPos::new(0, 0);
    loaded(&mut cache, region);
    cache.schedule_load(region);
}

#[test]
fn jobs_run_one_at_a_time_in_order() {
    let store = Arc::new(MemoryTileStore::new());
    let mut cache = cache(&store, 1200);
    let regions = [RegionPos::new(0, 0), RegionPos::new(0, 1), RegionPos::new(1, 0)];
    for r in regions {
        cache.touch(r);
    }
    cache.tick(Some(&border()));
    let stats = cache.stats();
    assert_eq!(stats.loading, 3);
    assert_eq!(stats.queued_jobs, 2);

    cache.tick(Some(&border()));
    assert_eq!(cache.stats().loaded, 1);
    assert_eq!(cache.state(RegionPos::new(0, 0)), Some(RegionState::Loaded));
    cache.tick(Some(&border()));
    assert_eq!(cache.stats().loaded, 2);
    cache.tick(Some(&border()));
    assert_eq!(cache.stats().loaded, 3);
    assert!(cache.is_idle());
}

#[test]
fn idle_regions_are_evicted_and_come_back_fresh() {
    let store = Arc::new(MemoryTileStore::new());
    let mut cache = cache(&store, 2);
    let region = RegionPos::new(0, 0);
    loaded(&mut cache, region);
    cache.tick(Some(&border()));
    assert_eq!(cache.state(region), Some(RegionState::Loaded));
    cache.tick(Some(&border()));
    assert_eq!(cache.state(region), None);
    assert_eq!(cache.stats().evictions, 1);

    cache.touch(region);
    assert_eq!(cache.state(region), Some(RegionState::Init));
}

#[test]
fn touching_keeps_a_region_alive() {
    let store = Arc::new(MemoryTileStore::new());
    let mut cache = cache(&store, 2);
    let region = RegionPos::new(0, 0);
    loaded(&mut cache, region);
    for _ in 0..10 {
        cache.touch(region);
        cache.tick(Some(&border()));
    }
    assert_eq!(cache.state(region), Some(RegionState::Loaded));
}

#[test]
fn failures_leave_a_usable_blank_tile() {
    let mut cache = RegionCache::new(SURFACE, Arc::new(FailingStore), IoPool::Inline, 1200);
    let region = RegionPos::new(0, 0);
    loaded(&mut cache, region);
    assert!(cache.image(region).is_some_and(PixelBuffer::is_blank));
    assert_eq!(cache.stats().load_failures, 1);

    cache.schedule_save(region);
    cache.tick(Some(&border()));
    cache.tick(Some(&border()));
    assert_eq!(cache.state(region), Some(RegionState::Loaded));
    assert_eq!(cache.stats().save_failures, 1);
}

#[test]
fn save_requested_while_saving_runs_again() {
    let store = Arc::new(MemoryTileStore::new());
    let mut cache = cache(&store, 1200);
    let region = RegionPos::new(0, 0);
    loaded(&mut cache, region);
    assert!(cache.request_save(region));
    assert!(cache.request_save(region));
    for _ in 0..6 {
        cache.tick(Some(&border()));
    }
    assert_eq!(store.saves(), 2);
    assert_eq!(cache.state(region), Some(RegionState::Loaded));
    assert!(!cache.request_save(RegionPos::new(9, 9)));
}

#[test]
fn clear_forgets_everything() {
    let store = Arc::new(MemoryTileStore::new());
    let mut cache = cache(&store, 1200);
    loaded(&mut cache, RegionPos::new(0, 0));
    cache.touch(RegionPos::new(0, 1));
    cache.tick(Some(&border()));
    cache.clear();
    assert!(cache.is_empty());
    assert!(cache.is_idle());
    cache.tick(Some(&border()));
    assert!(cache.is_empty());
}

#[test]
fn pooled_io_completes_off_thread() {
    let store = Arc::new(MemoryTileStore::new());
    let io = IoPool::with_threads(2).expect("io pool");
    let mut cache = RegionCache::new(SURFACE, store.clone(), io, 1200);
    let region = RegionPos::new(0, 0);
    cache.touch(region);
    for _ in 0..500 {
        cache.tick(Some(&border()));
        if cache.state(region) == Some(RegionState::Loaded) {
            break;
        }
        thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(cache.state(region), Some(RegionState::Loaded));

    cache.schedule_save(region);
    for _ in 0..500 {
        cache.tick(Some(&border()));
        if cache.is_idle() {
            break;
        }
        thread::sleep(Duration::from_millis(2));
    }
    assert!(cache.is_idle());
    assert_eq!(store.saves(), 1);
}

#[test]
fn idle_tiles_with_new_pixels_are_saved_before_eviction() {
    let store = Arc::new(MemoryTileStore::new());
    let mut cache = cache(&store, 2);
    let region = RegionPos::new(0, 0);
    loaded(&mut cache, region);
    let grass = Color::new(BaseColor::GRASS, Shade::Light);
    cache.image_mut(region).expect("loaded").set(7, 9, grass);
    assert!(cache.is_dirty(region));

    for _ in 0..3 {
        cache.tick(Some(&border()));
    }
    assert_eq!(cache.state(region), Some(RegionState::Saving));
    assert!(!cache.is_dirty(region));
    assert_eq!(cache.stats().flushes, 1);
    assert_eq!(cache.stats().evictions, 0);

    for _ in 0..10 {
        cache.tick(Some(&border()));
    }
    assert_eq!(cache.state(region), None);
    assert_eq!(cache.stats().evictions, 1);
    assert_eq!(store.saves(), 1);
    assert_eq!(store.get(SURFACE, region).map(|img| img.get(7, 9)), Some(grass));
}

#[test]
fn zero_idle_threshold_still_keeps_touched_tiles() {
    let store = Arc::new(MemoryTileStore::new());
    let mut cache = cache(&store, 0);
    let region = RegionPos::new(0, 0);
    loaded(&mut cache, region);
    for _ in 0..5 {
        cache.touch(region);
        cache.tick(Some(&border()));
    }
    assert_eq!(cache.state(region), Some(RegionState::Loaded));
    cache.tick(Some(&border()));
    cache.tick(Some(&border()));
    assert_eq!(cache.state(region), None);
}
