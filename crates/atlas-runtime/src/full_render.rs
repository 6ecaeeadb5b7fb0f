use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use atlas_blocks::ColorTable;
use atlas_geom::{ChunkPos, RegionPos, WorldBorder};
use atlas_io::FullRenderProgress;
use atlas_render::RenderVariant;
use atlas_world::ChunkHost;
use serde::Serialize;

use crate::context::RenderSettings;
use crate::lease::ChunkLeaseManager;
use crate::region_cache::RegionCaches;
use crate::task::RenderTask;

/// Perimeter of the `(2k+1)`-wide square of regions around `center`, walked
/// north edge west to east, east edge north to south, south edge east to
/// west, then west edge south to north. Ring 0 is the center alone.
pub fn ring_regions(center: RegionPos, k: i32) -> Vec<RegionPos> {
    if k <= 0 {
        return vec![center];
    }
    let (cx, cz) = (center.rx, center.rz);
    let mut out = Vec::with_capacity(8 * k as usize);
    for x in cx - k..cx + k {
        out.push(RegionPos::new(x, cz - k));
    }
    for z in cz - k..cz + k {
        out.push(RegionPos::new(cx + k, z));
    }
    for x in (cx - k + 1..=cx + k).rev() {
        out.push(RegionPos::new(x, cz + k));
    }
    for z in (cz - k + 1..=cz + k).rev() {
        out.push(RegionPos::new(cx - k, z));
    }
    out
}

/// Chunks of `region` that reach into the border, row by row.
pub fn region_batch(region: RegionPos, border: &WorldBorder) -> Vec<ChunkPos> {
    region.chunks().filter(|c| border.contains_chunk(*c)).collect()
}

/// Host tick rate a full render tries to stay above.
pub const TICK_RATE_THRESHOLD: f64 = 19.9;
pub const MIN_MILLIS_PER_TICK: u64 = 1;
/// Pause after the host lags before rendering again.
const LAG_BACKOFF: Duration = Duration::from_secs(10);
/// Quiet period after a budget cut before the budget may grow again.
const RAISE_AFTER_LAG: Duration = Duration::from_secs(600);
const RAISE_INTERVAL: Duration = Duration::from_secs(60);

pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FullRenderStep {
    Paused,
    /// Sitting out while the host lags.
    Throttled,
    Working,
    Finished,
}

/// Aggregate counters of a full render for status queries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FullRenderStatus {
    pub state: &'static str,
    pub ring: i32,
    pub queued_regions: usize,
    pub regions_done: u64,
    pub current_region: Option<RegionPos>,
    pub chunks_pending: usize,
    pub max_millis_per_tick: u64,
    pub message: Option<String>,
}

impl FullRenderStatus {
    /// Status of a checkpoint that is not being driven.
    pub fn from_progress(progress: &FullRenderProgress) -> Self {
        Self {
            state: if progress.paused { "paused" } else { "stopped" },
            ring: progress.ring,
            queued_regions: progress.region_queue.len(),
            regions_done: progress.regions_done,
            current_region: progress.current_region,
            chunks_pending: progress.current_chunks.len(),
            max_millis_per_tick: progress.max_millis_per_tick,
            message: None,
        }
    }
}

/// Walks every region inside a border in expanding rings around its center,
/// one region-sized [`RenderTask`] at a time.
///
/// The per-tick budget adapts to the host's tick rate: it shrinks by a
/// millisecond whenever the host lags, with a ten second back-off, and grows
/// back towards the configured budget once the host has kept up for a while.
pub struct FullRenderScheduler<H: ChunkHost> {
    colors: Arc<ColorTable>,
    variants: Vec<RenderVariant>,
    progress: FullRenderProgress,
    task: Option<RenderTask<H>>,
    finished: bool,
    dirty: bool,
    backoff_until: Option<Instant>,
    raise_at: Option<Instant>,
    throttled: bool,
}

impl<H: ChunkHost> FullRenderScheduler<H> {
    /// `max_millis_per_tick` is the starting and largest per-tick budget.
    pub fn new(
        colors: Arc<ColorTable>,
        variants: &[RenderVariant],
        border: WorldBorder,
        start_time_ms: u64,
        max_millis_per_tick: u64,
    ) -> Self {
        log::info!(target: "fullrender", "full render scheduled within {border}");
        let mut progress = FullRenderProgress::new(border, start_time_ms);
        progress.max_millis_per_tick = max_millis_per_tick.max(MIN_MILLIS_PER_TICK);
        Self {
            colors,
            variants: variants.to_vec(),
            progress,
            task: None,
            finished: false,
            dirty: true,
            backoff_until: None,
            raise_at: None,
            throttled: false,
        }
    }

    /// Continues from a checkpoint, re-acquiring the chunks of the region
    /// that was in progress.
    pub fn resume(
        leases: &mut ChunkLeaseManager<H>,
        colors: Arc<ColorTable>,
        variants: &[RenderVariant],
        progress: FullRenderProgress,
    ) -> Self {
        let task = progress.current_region.map(|region| {
            let chunks = if progress.current_chunks.is_empty() {
                region_batch(region, &progress.world_border)
            } else {
                progress.current_chunks.clone()
            };
            RenderTask::for_chunks(leases, Arc::clone(&colors), progress.world_border, variants, chunks)
        });
        log::info!(
            target: "fullrender",
            "resuming full render at ring {} with {} region(s) queued, {} done",
            progress.ring,
            progress.region_queue.len(),
            progress.regions_done
        );
        Self {
            colors,
            variants: variants.to_vec(),
            progress,
            task,
            finished: false,
            dirty: false,
            backoff_until: None,
            raise_at: None,
            throttled: false,
        }
    }

    /// One step at time `now`, rendering for at most the current per-tick
    /// budget. While paused or throttled the current task's tiles are kept
    /// alive but nothing is rendered.
    pub fn tick(
        &mut self,
        leases: &mut ChunkLeaseManager<H>,
        caches: &mut RegionCaches,
        settings: &RenderSettings,
        now: Instant,
    ) -> FullRenderStep {
        if self.finished {
            return FullRenderStep::Finished;
        }
        if self.progress.paused {
            self.touch_task_regions(caches);
            return FullRenderStep::Paused;
        }
        let ceiling = settings.tick_budget_ms.max(MIN_MILLIS_PER_TICK);
        let tick_rate = leases.host().tick_rate();
        self.throttled = !self.throttle(tick_rate, ceiling, now);
        if self.throttled {
            self.touch_task_regions(caches);
            return FullRenderStep::Throttled;
        }
        let deadline = now + Duration::from_millis(self.max_millis_per_tick(ceiling));
        if let Some(task) = self.task.as_mut() {
            if task.tick(leases, caches, settings, deadline) {
                self.task = None;
                let region = self.progress.current_region.take();
                self.progress.current_chunks.clear();
                self.progress.regions_done += 1;
                self.dirty = true;
                if let Some(region) = region {
                    log::info!(
                        target: "fullrender",
                        "finished {region} ({} done, {} queued)",
                        self.progress.regions_done,
                        self.progress.region_queue.len()
                    );
                }
            }
            return FullRenderStep::Working;
        }

        let border = self.progress.world_border;
        loop {
            if let Some(region) = self.progress.region_queue.pop_front() {
                let task = RenderTask::for_region(leases, Arc::clone(&self.colors), border, &self.variants, region);
                self.progress.current_chunks = task.chunks_to_render().to_vec();
                self.progress.current_region = Some(region);
                self.task = Some(task);
                self.dirty = true;
                log::debug!(target: "fullrender", "rendering {region}");
                return FullRenderStep::Working;
            }
            let ring = self.progress.ring;
            let regions: Vec<RegionPos> = ring_regions(border.center_region(), ring)
                .into_iter()
                .filter(|r| border.contains_region(*r))
                .collect();
            self.progress.ring += 1;
            self.dirty = true;
            if regions.is_empty() {
                self.finished = true;
                let elapsed_ms = unix_millis().saturating_sub(self.progress.start_time_ms);
                log::info!(
                    target: "fullrender",
                    "full render finished: {} region(s) in {:.1}s",
                    self.progress.regions_done,
                    elapsed_ms as f64 / 1000.0
                );
                return FullRenderStep::Finished;
            }
            log::info!(target: "fullrender", "ring {ring}: {} region(s) queued", regions.len());
            self.progress.region_queue.extend(regions);
        }
    }

    fn touch_task_regions(&self, caches: &mut RegionCaches) {
        if let Some(task) = self.task.as_ref() {
            task.touch_regions(caches);
        }
    }

    /// Budget in force, capped by `ceiling`.
    fn max_millis_per_tick(&self, ceiling: u64) -> u64 {
        match self.progress.max_millis_per_tick {
            0 => ceiling,
            ms => ms.clamp(MIN_MILLIS_PER_TICK, ceiling),
        }
    }

    fn set_max_millis_per_tick(&mut self, ms: u64) {
        if self.progress.max_millis_per_tick != ms {
            self.progress.max_millis_per_tick = ms;
            self.dirty = true;
        }
    }

    /// Adjusts the budget to the host tick rate. Returns false when this
    /// tick should be sat out.
    fn throttle(&mut self, tick_rate: Option<f64>, ceiling: u64, now: Instant) -> bool {
        let Some(rate) = tick_rate else {
            self.backoff_until = None;
            return true;
        };
        if let Some(until) = self.backoff_until {
            if now < until && rate <= TICK_RATE_THRESHOLD {
                return false;
            }
            self.backoff_until = None;
        }
        let max = self.max_millis_per_tick(ceiling);
        if rate < TICK_RATE_THRESHOLD {
            self.backoff_until = Some(now + LAG_BACKOFF);
            if max > MIN_MILLIS_PER_TICK {
                self.set_max_millis_per_tick(max - 1);
                self.raise_at = Some(now + RAISE_AFTER_LAG);
                log::info!(
                    target: "fullrender",
                    "host at {rate:.1} ticks/s, lowering full render budget {max} => {} ms",
                    max - 1
                );
            }
            return false;
        }
        if rate > TICK_RATE_THRESHOLD && max < ceiling && self.raise_at.is_none_or(|at| now > at) {
            self.set_max_millis_per_tick(max + 1);
            self.raise_at = Some(now + RAISE_INTERVAL);
            log::info!(target: "fullrender", "raising full render budget {max} => {} ms", max + 1);
        }
        true
    }

    /// Stops the render and releases the chunks it holds. Pixels already
    /// pasted into tiles stay.
    pub fn cancel(&mut self, leases: &mut ChunkLeaseManager<H>) {
        if let Some(mut task) = self.task.take() {
            task.cancel(leases);
        }
        self.progress.current_region = None;
        self.progress.current_chunks.clear();
        self.progress.region_queue.clear();
        self.finished = true;
        log::info!(target: "fullrender", "full render cancelled after {} region(s)", self.progress.regions_done);
    }

    /// Releases held chunks but keeps the checkpoint intact for a later
    /// [`resume`](Self::resume).
    pub fn suspend(mut self, leases: &mut ChunkLeaseManager<H>) -> FullRenderProgress {
        if let Some(mut task) = self.task.take() {
            task.cancel(leases);
        }
        self.progress
    }

    pub fn set_paused(&mut self, paused: bool) {
        if self.progress.paused != paused {
            self.progress.paused = paused;
            self.dirty = true;
        }
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.progress.paused
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn progress(&self) -> &FullRenderProgress {
        &self.progress
    }

    pub fn current_task(&self) -> Option<&RenderTask<H>> {
        self.task.as_ref()
    }

    /// Whether the checkpoint changed since the last call.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn status(&self, leases: &ChunkLeaseManager<H>) -> FullRenderStatus {
        let mut status = FullRenderStatus::from_progress(&self.progress);
        let pending = self.task.as_ref().map(|t| t.pending_chunks(leases));
        status.chunks_pending = pending.as_ref().map_or(0, Vec::len);
        status.message = self.task.as_ref().and_then(|t| t.debug_message().map(str::to_owned));
        status.state = if self.finished {
            "finished"
        } else if self.progress.paused {
            "paused"
        } else if self.throttled {
            "throttled"
        } else if status.chunks_pending > 0 {
            "waiting for chunks"
        } else if self.task.is_some() {
            "rendering"
        } else {
            "queueing"
        };
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_zero_is_the_center() {
        assert_eq!(ring_regions(RegionPos::new(3, -2), 0), vec![RegionPos::new(3, -2)]);
    }

    #[test]
    fn ring_sizes_and_uniqueness() {
        let center = RegionPos::new(-4, 9);
        for k in 1..6 {
            let ring = ring_regions(center, k);
            assert_eq!(ring.len(), 8 * k as usize);
            let mut sorted = ring.clone();
            sorted.sort();
            sorted.dedup();
            assert_eq!(sorted.len(), ring.len(), "ring {k} repeats a region");
            for r in &ring {
                let d = (r.rx - center.rx).abs().max((r.rz - center.rz).abs());
                assert_eq!(d, k);
            }
        }
    }

    #[test]
    fn ring_one_order_is_clockwise_from_north_west() {
        let ring = ring_regions(RegionPos::new(0, 0), 1);
        let expected: Vec<RegionPos> = [
            (-1, -1),
            (0, -1),
            (1, -1),
            (1, 0),
            (1, 1),
            (0, 1),
            (-1, 1),
            (-1, 0),
        ]
        .into_iter()
        .map(RegionPos::from)
        .collect();
        assert_eq!(ring, expected);
    }

    #[test]
    fn batch_is_clipped_to_the_border() {
        let border = WorldBorder::square(0, 0, 64);
        let batch = region_batch(RegionPos::new(0, 0), &border);
        assert_eq!(batch, vec![
            ChunkPos::new(0, 0),
            ChunkPos::new(1, 0),
            ChunkPos::new(0, 1),
            ChunkPos::new(1, 1),
        ]);
        assert_eq!(region_batch(RegionPos::new(0, 0), &WorldBorder::unbounded()).len(), 1024);
        assert!(region_batch(RegionPos::new(5, 5), &border).is_empty());
    }
}
