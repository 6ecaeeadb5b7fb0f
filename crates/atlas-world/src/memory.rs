use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

use atlas_geom::{CHUNK_BLOCKS, ChunkPos, WorldBorder};

use crate::column::Column;
use crate::host::{BlockSample, BlockSource, ChunkHost, ChunkLoadRequest, Environment};

#[derive(Default)]
struct Residency {
    resident: HashSet<ChunkPos>,
    pinned: HashSet<ChunkPos>,
    pending: Vec<(ChunkPos, ChunkLoadRequest)>,
    load_requests: usize,
}

/// A world held entirely in memory with explicit control over which chunks
/// are resident and when asynchronous loads complete.
pub struct MemoryWorld {
    min_y: i32,
    max_y: i32,
    environment: Environment,
    columns: RwLock<HashMap<(i32, i32), Column>>,
    default_column: RwLock<Column>,
    residency: Mutex<Residency>,
    border: RwLock<Option<WorldBorder>>,
    day_time: AtomicI64,
    auto_load: AtomicBool,
    tick_rate: RwLock<Option<f64>>,
}

impl MemoryWorld {
    pub fn new(min_y: i32, max_y: i32) -> Self {
        Self {
            min_y,
            max_y,
            environment: Environment::Normal,
            columns: RwLock::new(HashMap::new()),
            default_column: RwLock::new(Column::new()),
            residency: Mutex::new(Residency::default()),
            border: RwLock::new(None),
            day_time: AtomicI64::new(6000),
            auto_load: AtomicBool::new(false),
            tick_rate: RwLock::new(None),
        }
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Column returned for any position without an explicit one.
    pub fn set_default_column(&self, column: Column) {
        *self.default_column.write().unwrap_or_else(PoisonError::into_inner) = column;
    }

    pub fn set_column(&self, x: i32, z: i32, column: Column) {
        self.columns.write().unwrap_or_else(PoisonError::into_inner).insert((x, z), column);
    }

    pub fn fill_chunk(&self, chunk: ChunkPos, column: &Column) {
        let mut columns = self.columns.write().unwrap_or_else(PoisonError::into_inner);
        for dz in 0..CHUNK_BLOCKS {
            for dx in 0..CHUNK_BLOCKS {
                columns.insert(
                    (chunk.min_block_x() + dx, chunk.min_block_z() + dz),
                    column.clone(),
                );
            }
        }
    }

    pub fn set_world_border(&self, border: Option<WorldBorder>) {
        *self.border.write().unwrap_or_else(PoisonError::into_inner) = border;
    }

    pub fn set_day_time(&self, ticks: i64) {
        self.day_time.store(ticks, Ordering::Relaxed);
    }

    /// When set, asynchronous loads complete inside the request call.
    pub fn set_auto_load(&self, on: bool) {
        self.auto_load.store(on, Ordering::Relaxed);
    }

    /// Host load reported to full renders; `None` reports nothing.
    pub fn set_tick_rate(&self, rate: Option<f64>) {
        *self.tick_rate.write().unwrap_or_else(PoisonError::into_inner) = rate;
    }

    /// Residency survives a panicking test thread that held the lock.
    fn residency(&self) -> MutexGuard<'_, Residency> {
        self.residency.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn make_resident(&self, chunk: ChunkPos) {
        self.residency().resident.insert(chunk);
    }

    /// Unloads a chunk unless it is pinned. Returns whether it was unloaded.
    pub fn unload(&self, chunk: ChunkPos) -> bool {
        let mut r = self.residency();
        if r.pinned.contains(&chunk) {
            return false;
        }
        r.resident.remove(&chunk)
    }

    /// Completes every queued load and returns how many there were.
    pub fn finish_loads(&self) -> usize {
        let pending = {
            let mut r = self.residency();
            let pending = std::mem::take(&mut r.pending);
            for (chunk, _) in &pending {
                r.resident.insert(*chunk);
            }
            pending
        };
        let n = pending.len();
        for (chunk, request) in pending {
            request.complete(chunk);
        }
        n
    }

    pub fn is_pinned(&self, chunk: ChunkPos) -> bool {
        self.residency().pinned.contains(&chunk)
    }

    pub fn pinned_count(&self) -> usize {
        self.residency().pinned.len()
    }

    /// Number of asynchronous loads requested so far.
    pub fn load_requests(&self) -> usize {
        self.residency().load_requests
    }

    pub fn pending_loads(&self) -> usize {
        self.residency().pending.len()
    }
}

impl BlockSource for MemoryWorld {
    fn min_y(&self) -> i32 {
        self.min_y
    }

    fn max_y(&self) -> i32 {
        self.max_y
    }

    fn is_chunk_resident(&self, chunk: ChunkPos) -> bool {
        self.residency().resident.contains(&chunk)
    }

    fn block_at(&self, x: i32, y: i32, z: i32) -> BlockSample {
        if y < self.min_y || y > self.max_y {
            return BlockSample::AIR;
        }
        let columns = self.columns.read().unwrap_or_else(PoisonError::into_inner);
        match columns.get(&(x, z)) {
            Some(col) => col.sample(y),
            None => self.default_column.read().unwrap_or_else(PoisonError::into_inner).sample(y),
        }
    }

    fn day_time(&self) -> i64 {
        self.day_time.load(Ordering::Relaxed)
    }
}

impl ChunkHost for MemoryWorld {
    fn load_chunk_async(&self, chunk: ChunkPos, request: ChunkLoadRequest) {
        let auto = self.auto_load.load(Ordering::Relaxed);
        {
            let mut r = self.residency();
            r.load_requests += 1;
            if !auto {
                r.pending.push((chunk, request));
                return;
            }
            r.resident.insert(chunk);
        }
        request.complete(chunk);
    }

    fn pin_chunk(&self, chunk: ChunkPos) {
        let mut r = self.residency();
        r.resident.insert(chunk);
        r.pinned.insert(chunk);
    }

    fn unpin_chunk(&self, chunk: ChunkPos) {
        self.residency().pinned.remove(&chunk);
    }

    fn world_border(&self) -> Option<WorldBorder> {
        *self.border.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn environment(&self) -> Environment {
        self.environment
    }

    fn tick_rate(&self) -> Option<f64> {
        *self.tick_rate.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn survives_a_poisoned_lock() {
        let world = std::sync::Arc::new(MemoryWorld::new(0, 15));
        let held = std::sync::Arc::clone(&world);
        let joined = std::thread::spawn(move || {
            let _guard = held.residency.lock().unwrap();
            panic!("test thread dies holding the lock");
        })
        .join();
        assert!(joined.is_err());
        assert!(world.residency.is_poisoned());

        let chunk = ChunkPos::new(1, 1);
        world.make_resident(chunk);
        assert!(world.is_chunk_resident(chunk));
        world.pin_chunk(chunk);
        assert_eq!(world.pinned_count(), 1);
    }
}
