use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use atlas_blocks::ColorTable;
use atlas_geom::{ChunkPos, WorldBorder};
use atlas_io::{FullRenderProgress, TileStore, WorldTag, load_tag, save_tag};
use atlas_render::RenderVariant;
use atlas_world::{ChunkHost, Environment};
use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::error::MapError;
use crate::full_render::{FullRenderScheduler, FullRenderStatus, FullRenderStep, unix_millis};
use crate::lease::ChunkLeaseManager;
use crate::region_cache::{IoPool, RegionCache, RegionCacheStats, RegionCaches};
use crate::task::RenderTask;

/// Knobs of the tick loop.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Wall-clock budget of one tick. Full renders start at it and shrink
    /// below it while the host lags.
    pub tick_budget_ms: u64,
    /// Inspections a loaded tile may sit unused before it is dropped.
    pub region_idle_ticks: u32,
    /// Pixels drawn between deadline checks.
    pub steps_per_run: usize,
    /// Tile reader/writer threads; 0 does the work inside `tick`.
    pub io_threads: usize,
    /// Ticks a task may wait on chunks before it reports them.
    pub missing_chunk_warn_ticks: u32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            tick_budget_ms: 25,
            region_idle_ticks: 20 * 60,
            steps_per_run: 64,
            io_threads: 2,
            missing_chunk_warn_ticks: 200,
        }
    }
}

impl RenderSettings {
    pub fn tick_budget(&self) -> Duration {
        Duration::from_millis(self.tick_budget_ms)
    }
}

/// Snapshot of a map for status queries.
#[derive(Clone, Debug, Serialize)]
pub struct MapStatus {
    pub world: String,
    pub enabled: bool,
    pub environment: Environment,
    pub border: Option<WorldBorder>,
    pub regions: Vec<(RenderVariant, RegionCacheStats)>,
    pub held_chunks: usize,
    pub pending_loads: usize,
    pub queued_chunks: usize,
    pub full_render: Option<FullRenderStatus>,
}

impl fmt::Display for MapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.enabled { "enabled" } else { "disabled" };
        writeln!(f, "world {} ({state}, {:?})", self.world, self.environment)?;
        match &self.border {
            Some(b) => writeln!(f, "  border {b}")?,
            None => writeln!(f, "  border unknown")?,
        }
        for (variant, s) in &self.regions {
            writeln!(
                f,
                "  {variant}: {} loaded, {} loading, {} saving, {} out of bounds, {} saves, {} failures",
                s.loaded,
                s.loading,
                s.saving,
                s.out_of_bounds,
                s.saves,
                s.load_failures + s.save_failures
            )?;
        }
        writeln!(
            f,
            "  chunks: {} held, {} loading, {} queued for render",
            self.held_chunks, self.pending_loads, self.queued_chunks
        )?;
        if let Some(fr) = &self.full_render {
            write!(
                f,
                "  full render {}: ring {}, {} done, {} queued, {} ms/tick",
                fr.state, fr.ring, fr.regions_done, fr.queued_regions, fr.max_millis_per_tick
            )?;
            if let Some(region) = fr.current_region {
                write!(f, ", at {region} ({} chunks pending)", fr.chunks_pending)?;
            }
            writeln!(f)?;
            if let Some(msg) = &fr.message {
                writeln!(f, "  {msg}")?;
            }
        }
        Ok(())
    }
}

/// Everything one world's map needs: leases, tile caches, the chunk
/// re-render queue and an optional full render. Driven by [`tick`](Self::tick)
/// from a single thread.
pub struct MapContext<H: ChunkHost> {
    name: String,
    host: Arc<H>,
    colors: Arc<ColorTable>,
    store: Arc<dyn TileStore>,
    tag_dir: PathBuf,
    settings: RenderSettings,
    io: IoPool,
    tag: WorldTag,
    enabled: bool,
    leases: ChunkLeaseManager<H>,
    caches: RegionCaches,
    chunk_queue: Vec<ChunkPos>,
    queued: HashSet<ChunkPos>,
    chunk_task: Option<RenderTask<H>>,
    full_render: Option<FullRenderScheduler<H>>,
}

impl<H: ChunkHost> MapContext<H> {
    pub fn new(
        name: impl Into<String>,
        host: Arc<H>,
        colors: Arc<ColorTable>,
        store: Arc<dyn TileStore>,
        tag_dir: impl Into<PathBuf>,
        settings: RenderSettings,
    ) -> Result<Self, MapError> {
        let io = IoPool::with_threads(settings.io_threads)?;
        Ok(Self {
            name: name.into(),
            leases: ChunkLeaseManager::new(Arc::clone(&host)),
            host,
            colors,
            store,
            tag_dir: tag_dir.into(),
            settings,
            io,
            tag: WorldTag::default(),
            enabled: false,
            caches: RegionCaches::new(),
            chunk_queue: Vec::new(),
            queued: HashSet::new(),
            chunk_task: None,
            full_render: None,
        })
    }

    /// Reads the world tag, refreshes it from the host and resumes a
    /// checkpointed full render.
    pub fn enable(&mut self) -> Result<(), MapError> {
        if self.enabled {
            return Ok(());
        }
        let mut tag = load_tag(&self.tag_dir)?.unwrap_or_default();
        let environment = self.host.environment();
        let variants = RenderVariant::for_environment(environment);
        let world_border = self.host.world_border();
        let mut changed = tag.environment != environment || tag.variants != variants;
        if world_border.is_some() && world_border != tag.world_border {
            tag.world_border = world_border;
            changed = true;
        }
        tag.environment = environment;
        tag.variants = variants.clone();

        self.caches = variants
            .iter()
            .map(|&v| {
                let cache = RegionCache::new(
                    v,
                    Arc::clone(&self.store),
                    self.io.clone(),
                    self.settings.region_idle_ticks,
                );
                (v, cache)
            })
            .collect();
        if let Some(progress) = tag.full_render.clone() {
            self.full_render = Some(FullRenderScheduler::resume(
                &mut self.leases,
                Arc::clone(&self.colors),
                &variants,
                progress,
            ));
        }
        self.tag = tag;
        self.enabled = true;
        if changed {
            save_tag(&self.tag_dir, &self.tag)?;
        }
        log::info!("map of {} enabled ({:?}, variants {:?})", self.name, environment, variants);
        Ok(())
    }

    /// Checkpoints the full render, releases every chunk and drops the
    /// in-memory tiles.
    pub fn disable(&mut self) -> Result<(), MapError> {
        if !self.enabled {
            return Ok(());
        }
        if let Some(mut task) = self.chunk_task.take() {
            task.cancel(&mut self.leases);
        }
        if let Some(scheduler) = self.full_render.take() {
            self.tag.full_render = Some(scheduler.suspend(&mut self.leases));
        }
        self.leases.clear();
        for cache in self.caches.values_mut() {
            cache.clear();
        }
        self.caches.clear();
        self.enabled = false;
        save_tag(&self.tag_dir, &self.tag)?;
        log::info!("map of {} disabled", self.name);
        Ok(())
    }

    /// One scheduling step bounded by the tick budget from `now`.
    pub fn tick(&mut self, now: Instant) {
        if !self.enabled {
            return;
        }
        self.tick_io();
        let deadline = now + self.settings.tick_budget();

        let full_active = self.full_render.as_ref().is_some_and(|s| !s.is_paused());
        if let Some(scheduler) = self.full_render.as_mut() {
            let step = scheduler.tick(&mut self.leases, &mut self.caches, &self.settings, now);
            if step == FullRenderStep::Finished {
                self.full_render = None;
                self.tag.full_render = None;
                self.save_tag_logged();
            } else if scheduler.take_dirty() {
                let progress = scheduler.progress().clone();
                self.tag.full_render = Some(progress);
                self.save_tag_logged();
            }
        }
        if !full_active {
            self.tick_chunk_queue(deadline);
        }
    }

    /// Applies finished chunk loads and tile jobs without rendering anything.
    pub fn tick_io(&mut self) {
        if !self.enabled {
            return;
        }
        self.leases.poll();
        let border = self.tag.effective_border();
        for cache in self.caches.values_mut() {
            cache.tick(border.as_ref());
        }
    }

    fn tick_chunk_queue(&mut self, deadline: Instant) {
        if self.chunk_task.is_none() {
            let Some(first) = self.chunk_queue.first().copied() else {
                return;
            };
            let Some(border) = self.tag.effective_border() else {
                return;
            };
            let region = first.region();
            let batch: Vec<ChunkPos> = self
                .chunk_queue
                .iter()
                .copied()
                .filter(|c| c.region() == region)
                .collect();
            log::debug!(target: "regions", "re-rendering {} chunk(s) of {region}", batch.len());
            self.chunk_task = Some(RenderTask::for_chunks(
                &mut self.leases,
                Arc::clone(&self.colors),
                border,
                &self.tag.variants,
                batch,
            ));
        }
        if let Some(task) = self.chunk_task.as_mut() {
            if task.tick(&mut self.leases, &mut self.caches, &self.settings, deadline) {
                let done: HashSet<ChunkPos> = task.chunks_to_render().iter().copied().collect();
                self.chunk_queue.retain(|c| !done.contains(c));
                self.queued.retain(|c| !done.contains(c));
                self.chunk_task = None;
            }
        }
    }

    fn save_tag_logged(&self) {
        if let Err(err) = save_tag(&self.tag_dir, &self.tag) {
            log::error!("failed to save tag of {}: {err}", self.name);
        }
    }

    /// Queues a chunk for re-rendering. Rejected outside the border, while
    /// the border is unknown, or when already queued.
    pub fn request_chunk_render(&mut self, chunk: ChunkPos) -> bool {
        if !self.enabled {
            return false;
        }
        let Some(border) = self.tag.effective_border() else {
            return false;
        };
        if !border.contains_chunk(chunk) || !self.queued.insert(chunk) {
            return false;
        }
        self.chunk_queue.push(chunk);
        true
    }

    pub fn schedule_full_render(&mut self) -> Result<(), MapError> {
        if !self.enabled {
            return Err(MapError::Disabled(self.name.clone()));
        }
        if self.full_render.is_some() {
            return Err(MapError::FullRenderRunning(self.name.clone()));
        }
        let border = self
            .tag
            .effective_border()
            .ok_or_else(|| MapError::NoWorldBorder(self.name.clone()))?;
        if let Some(mut task) = self.chunk_task.take() {
            task.cancel(&mut self.leases);
        }
        let mut scheduler = FullRenderScheduler::new(
            Arc::clone(&self.colors),
            &self.tag.variants,
            border,
            unix_millis(),
            self.settings.tick_budget_ms,
        );
        scheduler.take_dirty();
        self.tag.full_render = Some(scheduler.progress().clone());
        self.full_render = Some(scheduler);
        save_tag(&self.tag_dir, &self.tag)?;
        Ok(())
    }

    pub fn cancel_full_render(&mut self) -> Result<(), MapError> {
        let Some(mut scheduler) = self.full_render.take() else {
            return Err(MapError::NoFullRender(self.name.clone()));
        };
        scheduler.cancel(&mut self.leases);
        self.tag.full_render = None;
        save_tag(&self.tag_dir, &self.tag)?;
        Ok(())
    }

    pub fn pause_full_render(&mut self) -> Result<(), MapError> {
        self.set_full_render_paused(true)
    }

    pub fn resume_full_render(&mut self) -> Result<(), MapError> {
        self.set_full_render_paused(false)
    }

    fn set_full_render_paused(&mut self, paused: bool) -> Result<(), MapError> {
        let Some(scheduler) = self.full_render.as_mut() else {
            return Err(MapError::NoFullRender(self.name.clone()));
        };
        scheduler.set_paused(paused);
        scheduler.take_dirty();
        self.tag.full_render = Some(scheduler.progress().clone());
        save_tag(&self.tag_dir, &self.tag)?;
        log::info!(target: "fullrender", "full render of {} {}", self.name, if paused { "paused" } else { "resumed" });
        Ok(())
    }

    /// Operator border that takes precedence over the host's.
    pub fn set_custom_border(&mut self, border: Option<WorldBorder>) -> Result<(), MapError> {
        self.tag.custom_border = border;
        save_tag(&self.tag_dir, &self.tag)?;
        Ok(())
    }

    pub fn status(&self) -> MapStatus {
        let mut regions: Vec<(RenderVariant, RegionCacheStats)> =
            self.caches.iter().map(|(v, c)| (*v, c.stats())).collect();
        regions.sort_by_key(|(v, _)| *v);
        let full_render = match &self.full_render {
            Some(scheduler) => Some(scheduler.status(&self.leases)),
            None => self.tag.full_render.as_ref().map(FullRenderStatus::from_progress),
        };
        MapStatus {
            world: self.name.clone(),
            enabled: self.enabled,
            environment: self.tag.environment,
            border: self.tag.effective_border(),
            regions,
            held_chunks: self.leases.held_count(),
            pending_loads: self.leases.pending_loads(),
            queued_chunks: self.chunk_queue.len(),
            full_render,
        }
    }

    /// No tile load or save is queued or running.
    pub fn is_io_idle(&self) -> bool {
        self.caches.values().all(RegionCache::is_idle)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_full_render_active(&self) -> bool {
        self.full_render.is_some()
    }

    pub fn full_render_progress(&self) -> Option<&FullRenderProgress> {
        self.full_render.as_ref().map(|s| s.progress())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> &WorldTag {
        &self.tag
    }

    pub fn tag_dir(&self) -> &Path {
        &self.tag_dir
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn leases(&self) -> &ChunkLeaseManager<H> {
        &self.leases
    }

    pub fn region_cache(&self, variant: RenderVariant) -> Option<&RegionCache> {
        self.caches.get(&variant)
    }

    pub fn queued_chunks(&self) -> usize {
        self.chunk_queue.len()
    }
}
