use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use atlas_geom::{RegionPos, WorldBorder};
use atlas_io::{StoreError, TileStore};
use atlas_render::{PixelBuffer, RenderVariant};
use crossbeam_channel::{Receiver, Sender, unbounded};
use hashbrown::HashMap;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use serde::Serialize;

/// One region cache per rendered variant.
pub type RegionCaches = HashMap<RenderVariant, RegionCache>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum RegionState {
    Init,
    Loading,
    Loaded,
    Saving,
    OutOfBounds,
}

/// Where tile reads and writes run.
#[derive(Clone)]
pub enum IoPool {
    /// On the calling thread, inside `tick`.
    Inline,
    Pool(Arc<ThreadPool>),
}

impl IoPool {
    /// `threads == 0` runs jobs inline.
    pub fn with_threads(threads: usize) -> Result<Self, ThreadPoolBuildError> {
        if threads == 0 {
            return Ok(IoPool::Inline);
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("atlas-io-{i}"))
            .build()?;
        Ok(IoPool::Pool(Arc::new(pool)))
    }

    fn spawn(&self, job: impl FnOnce() + Send + 'static) {
        match self {
            IoPool::Inline => job(),
            IoPool::Pool(pool) => pool.spawn(job),
        }
    }
}

impl fmt::Debug for IoPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoPool::Inline => f.write_str("IoPool::Inline"),
            IoPool::Pool(pool) => write!(f, "IoPool::Pool({} threads)", pool.current_num_threads()),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RegionCacheStats {
    pub init: usize,
    pub loading: usize,
    pub loaded: usize,
    pub saving: usize,
    pub out_of_bounds: usize,
    pub queued_jobs: usize,
    pub loads: u64,
    pub saves: u64,
    pub load_failures: u64,
    pub save_failures: u64,
    pub evictions: u64,
    /// Idle tiles written back instead of dropped.
    pub flushes: u64,
}

struct Entry {
    state: RegionState,
    image: Option<PixelBuffer>,
    idle_ticks: u32,
    resave: bool,
    /// Pixels changed since the last save was taken.
    dirty: bool,
}

impl Entry {
    fn new() -> Self {
        Self {
            state: RegionState::Init,
            image: None,
            idle_ticks: 0,
            resave: false,
            dirty: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum JobKind {
    Load,
    Save,
}

enum JobResult {
    Loaded(Result<Option<PixelBuffer>, StoreError>),
    Saved(Result<(), StoreError>),
}

struct JobDone {
    region: RegionPos,
    generation: u64,
    result: JobResult,
}

/// In-memory tiles of one variant backed by a [`TileStore`]. At most one
/// load or save job runs at a time; the rest wait in FIFO order. An idle tile
/// with unsaved pixels is saved before it can be dropped.
pub struct RegionCache {
    variant: RenderVariant,
    store: Arc<dyn TileStore>,
    io: IoPool,
    idle_threshold: u32,
    entries: HashMap<RegionPos, Entry>,
    queue: VecDeque<(RegionPos, JobKind)>,
    in_flight: Option<u64>,
    generation: u64,
    tx: Sender<JobDone>,
    rx: Receiver<JobDone>,
    stats: RegionCacheStats,
}

impl RegionCache {
    /// `idle_threshold` is at least one inspection, so a tile touched every
    /// tick is never dropped.
    pub fn new(variant: RenderVariant, store: Arc<dyn TileStore>, io: IoPool, idle_threshold: u32) -> Self {
        let (tx, rx) = unbounded();
        Self {
            variant,
            store,
            io,
            idle_threshold: idle_threshold.max(1),
            entries: HashMap::new(),
            queue: VecDeque::new(),
            in_flight: None,
            generation: 0,
            tx,
            rx,
            stats: RegionCacheStats::default(),
        }
    }

    pub fn variant(&self) -> RenderVariant {
        self.variant
    }

    /// Marks `region` as in use, creating its entry if needed.
    pub fn touch(&mut self, region: RegionPos) {
        let entry = self.entries.entry(region).or_insert_with(Entry::new);
        entry.idle_ticks = 0;
    }

    /// `None` when the region has no entry.
    pub fn state(&self, region: RegionPos) -> Option<RegionState> {
        self.entries.get(&region).map(|e| e.state)
    }

    pub fn image(&self, region: RegionPos) -> Option<&PixelBuffer> {
        self.entries.get(&region).and_then(|e| e.image.as_ref())
    }

    /// The tile, only while it is `Loaded`. Marks it unsaved.
    pub fn image_mut(&mut self, region: RegionPos) -> Option<&mut PixelBuffer> {
        let entry = self.entries.get_mut(&region)?;
        if entry.state != RegionState::Loaded {
            return None;
        }
        entry.idle_ticks = 0;
        entry.dirty = true;
        entry.image.as_mut()
    }

    /// Whether the tile has pixels no save has picked up yet.
    pub fn is_dirty(&self, region: RegionPos) -> bool {
        self.entries.get(&region).is_some_and(|e| e.dirty)
    }

    /// Panics unless the region is in `Init`.
    pub fn schedule_load(&mut self, region: RegionPos) {
        let state = self.state(region);
        assert!(
            state == Some(RegionState::Init),
            "schedule_load of {} {region} in state {state:?}",
            self.variant
        );
        if let Some(entry) = self.entries.get_mut(&region) {
            entry.state = RegionState::Loading;
        }
        self.queue.push_back((region, JobKind::Load));
    }

    /// Panics unless the region is `Loaded`.
    pub fn schedule_save(&mut self, region: RegionPos) {
        let state = self.state(region);
        assert!(
            state == Some(RegionState::Loaded),
            "schedule_save of {} {region} in state {state:?}",
            self.variant
        );
        if let Some(entry) = self.entries.get_mut(&region) {
            entry.state = RegionState::Saving;
            entry.resave = false;
            entry.dirty = false;
        }
        self.queue.push_back((region, JobKind::Save));
    }

    /// Saves now if `Loaded`, or once the running save finishes if `Saving`.
    /// Returns false when the region has nothing to save.
    pub fn request_save(&mut self, region: RegionPos) -> bool {
        match self.state(region) {
            Some(RegionState::Loaded) => {
                self.schedule_save(region);
                true
            }
            Some(RegionState::Saving) => {
                if let Some(entry) = self.entries.get_mut(&region) {
                    entry.resave = true;
                }
                true
            }
            _ => false,
        }
    }

    /// One inspection pass: applies finished jobs, starts loads for new
    /// regions, saves or evicts idle ones and dispatches the next queued job.
    /// Without a border new regions stay in `Init`.
    pub fn tick(&mut self, border: Option<&WorldBorder>) {
        self.poll();
        let mut to_load = Vec::new();
        let mut flush = Vec::new();
        let mut evict = Vec::new();
        for (region, entry) in self.entries.iter_mut() {
            match entry.state {
                RegionState::Init => match border {
                    Some(b) if !b.contains_region(*region) => entry.state = RegionState::OutOfBounds,
                    Some(_) => to_load.push(*region),
                    None => {}
                },
                RegionState::Loaded | RegionState::OutOfBounds => {
                    entry.idle_ticks += 1;
                    if entry.idle_ticks <= self.idle_threshold {
                        continue;
                    }
                    if entry.dirty && entry.state == RegionState::Loaded {
                        flush.push(*region);
                    } else {
                        evict.push(*region);
                    }
                }
                RegionState::Loading | RegionState::Saving => {}
            }
        }
        to_load.sort();
        for region in to_load {
            self.schedule_load(region);
        }
        flush.sort();
        for region in flush {
            log::debug!(target: "regions", "saving idle {} {} before eviction", self.variant, region);
            self.schedule_save(region);
            self.stats.flushes += 1;
        }
        for region in evict {
            self.entries.remove(&region);
            self.stats.evictions += 1;
            log::trace!(target: "regions", "evicted {} {}", self.variant, region);
        }
        self.dispatch();
    }

    /// Applies finished jobs without inspecting entries. Returns how many.
    pub fn poll(&mut self) -> usize {
        let done: Vec<JobDone> = self.rx.try_iter().collect();
        let mut applied = 0;
        for job in done {
            if self.in_flight != Some(job.generation) {
                log::debug!(target: "regions", "dropping stale job for {} {}", self.variant, job.region);
                continue;
            }
            self.in_flight = None;
            applied += 1;
            self.apply(job.region, job.result);
        }
        self.dispatch();
        applied
    }

    fn apply(&mut self, region: RegionPos, result: JobResult) {
        let variant = self.variant;
        let Some(entry) = self.entries.get_mut(&region) else {
            return;
        };
        entry.idle_ticks = 0;
        entry.state = RegionState::Loaded;
        match result {
            JobResult::Loaded(Ok(image)) => {
                self.stats.loads += 1;
                entry.image = Some(image.unwrap_or_else(PixelBuffer::region));
            }
            JobResult::Loaded(Err(err)) => {
                self.stats.load_failures += 1;
                log::error!(target: "regions", "failed to load {variant} {region}: {err}");
                entry.image = Some(PixelBuffer::region());
            }
            JobResult::Saved(Ok(())) => self.stats.saves += 1,
            JobResult::Saved(Err(err)) => {
                self.stats.save_failures += 1;
                entry.dirty = true;
                log::error!(target: "regions", "failed to save {variant} {region}: {err}");
            }
        }
        if entry.resave {
            self.schedule_save(region);
        }
    }

    fn dispatch(&mut self) {
        while self.in_flight.is_none() {
            let Some((region, kind)) = self.queue.pop_front() else {
                return;
            };
            let expected = match kind {
                JobKind::Load => RegionState::Loading,
                JobKind::Save => RegionState::Saving,
            };
            let Some(entry) = self.entries.get(&region) else {
                continue;
            };
            if entry.state != expected {
                continue;
            }
            self.generation += 1;
            let generation = self.generation;
            self.in_flight = Some(generation);
            let store = Arc::clone(&self.store);
            let tx = self.tx.clone();
            let variant = self.variant;
            match kind {
                JobKind::Load => self.io.spawn(move || {
                    let result = JobResult::Loaded(store.load(variant, region));
                    let _ = tx.send(JobDone { region, generation, result });
                }),
                JobKind::Save => {
                    let image = entry.image.clone().unwrap_or_else(PixelBuffer::region);
                    self.io.spawn(move || {
                        let result = JobResult::Saved(store.save(variant, region, &image));
                        let _ = tx.send(JobDone { region, generation, result });
                    })
                }
            }
        }
    }

    /// No job queued or running.
    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none()
            && self.queue.is_empty()
            && !self
                .entries
                .values()
                .any(|e| matches!(e.state, RegionState::Loading | RegionState::Saving))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> RegionCacheStats {
        let mut stats = self.stats;
        for entry in self.entries.values() {
            match entry.state {
                RegionState::Init => stats.init += 1,
                RegionState::Loading => stats.loading += 1,
                RegionState::Loaded => stats.loaded += 1,
                RegionState::Saving => stats.saving += 1,
                RegionState::OutOfBounds => stats.out_of_bounds += 1,
            }
        }
        stats.queued_jobs = self.queue.len();
        stats
    }

    /// Drops every entry and queued job. A job still running is ignored when
    /// it reports back.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.queue.clear();
        self.in_flight = None;
    }
}
