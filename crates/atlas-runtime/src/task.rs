use std::sync::Arc;
use std::time::Instant;

use atlas_blocks::ColorTable;
use atlas_geom::{ChunkPos, RegionPos, WorldBorder};
use atlas_render::{LightDirection, RenderVariant, TileRenderer};
use atlas_world::ChunkHost;
use hashbrown::{HashMap, HashSet};

use crate::context::RenderSettings;
use crate::full_render::region_batch;
use crate::lease::ChunkLeaseManager;
use crate::region_cache::{RegionCaches, RegionState};

/// Renders a batch of chunks for every variant and pastes them into the
/// region tiles. Holds leases on the batch plus its shading halo until done.
pub struct RenderTask<H: ChunkHost> {
    host: Arc<H>,
    colors: Arc<ColorTable>,
    border: WorldBorder,
    light: LightDirection,
    halo: Vec<(i32, i32)>,
    variants: Vec<RenderVariant>,
    chunks: Vec<ChunkPos>,
    acquired: Vec<ChunkPos>,
    regions: Vec<RegionPos>,
    renderers: HashMap<(RenderVariant, ChunkPos), TileRenderer<H>>,
    done: HashSet<(RenderVariant, ChunkPos)>,
    waiting_ticks: u32,
    warned: bool,
    debug_message: Option<String>,
    finished: bool,
}

impl<H: ChunkHost> RenderTask<H> {
    /// Starts a task over `chunks` and acquires them with their halo. The
    /// light direction is fixed from the host's day clock at this point.
    pub fn for_chunks(
        leases: &mut ChunkLeaseManager<H>,
        colors: Arc<ColorTable>,
        border: WorldBorder,
        variants: &[RenderVariant],
        mut chunks: Vec<ChunkPos>,
    ) -> Self {
        let mut unique = HashSet::new();
        chunks.retain(|c| unique.insert(*c));
        let host = Arc::clone(leases.host());
        let light = LightDirection::from_day_time(host.day_time());
        let halo = light.halo_offsets();

        let mut seen = HashSet::new();
        let mut acquired = Vec::new();
        for &chunk in &chunks {
            for c in needed_chunks(chunk, &halo, &border) {
                if seen.insert(c) {
                    acquired.push(c);
                }
            }
        }
        for &c in &acquired {
            leases.acquire(c, None);
        }

        let mut regions: Vec<RegionPos> = chunks.iter().map(|c| c.region()).collect();
        regions.sort();
        regions.dedup();

        Self {
            host,
            colors,
            border,
            light,
            halo,
            variants: variants.to_vec(),
            chunks,
            acquired,
            regions,
            renderers: HashMap::new(),
            done: HashSet::new(),
            waiting_ticks: 0,
            warned: false,
            debug_message: None,
            finished: false,
        }
    }

    /// Every chunk of `region` inside the border.
    pub fn for_region(
        leases: &mut ChunkLeaseManager<H>,
        colors: Arc<ColorTable>,
        border: WorldBorder,
        variants: &[RenderVariant],
        region: RegionPos,
    ) -> Self {
        let chunks = region_batch(region, &border);
        Self::for_chunks(leases, colors, border, variants, chunks)
    }

    /// Renders until everything is pasted or `deadline` passes; at least one
    /// run of pixels is drawn per ready chunk visited. Returns whether the task
    /// is done, in which case its regions are queued for saving and its leases
    /// released.
    pub fn tick(
        &mut self,
        leases: &mut ChunkLeaseManager<H>,
        caches: &mut RegionCaches,
        settings: &RenderSettings,
        deadline: Instant,
    ) -> bool {
        if self.finished {
            return true;
        }
        self.touch_regions(caches);

        let mut missing = Vec::new();
        'variants: for vi in 0..self.variants.len() {
            let variant = self.variants[vi];
            for ci in 0..self.chunks.len() {
                let chunk = self.chunks[ci];
                let key = (variant, chunk);
                if self.done.contains(&key) {
                    continue;
                }
                let state = caches.get(&variant).and_then(|c| c.state(chunk.region()));
                if state == Some(RegionState::OutOfBounds) {
                    log::debug!(target: "fullrender", "skipping {chunk}: {variant} tile is outside the border");
                    self.renderers.remove(&key);
                    self.done.insert(key);
                    continue;
                }
                let not_ready: Vec<ChunkPos> = needed_chunks(chunk, &self.halo, &self.border)
                    .filter(|c| !leases.is_ready(*c))
                    .collect();
                if !not_ready.is_empty() {
                    for c in not_ready {
                        leases.ensure_loading(c);
                        missing.push(c);
                    }
                    continue;
                }

                let renderer = self.renderers.entry(key).or_insert_with(|| {
                    TileRenderer::for_chunk(
                        Arc::clone(&self.host),
                        Arc::clone(&self.colors),
                        self.border,
                        self.light,
                        variant,
                        chunk,
                    )
                });
                loop {
                    renderer.run(settings.steps_per_run.max(1));
                    if renderer.is_finished() || Instant::now() >= deadline {
                        break;
                    }
                }
                if renderer.is_finished() {
                    let target = caches
                        .get_mut(&variant)
                        .and_then(|cache| cache.image_mut(chunk.region()));
                    if let Some(image) = target {
                        let (px, pz) = chunk.pixel_offset();
                        image.blit(renderer.buffer(), px, pz);
                        self.renderers.remove(&key);
                        self.done.insert(key);
                    }
                }
                if Instant::now() >= deadline {
                    break 'variants;
                }
            }
        }

        self.note_missing(leases, settings, &missing);

        if self.done.len() == self.variants.len() * self.chunks.len() {
            self.finish(leases, caches);
        }
        self.finished
    }

    /// Keeps the task's tiles from going idle, also while it is not ticked.
    pub fn touch_regions(&self, caches: &mut RegionCaches) {
        if self.finished {
            return;
        }
        for variant in &self.variants {
            if let Some(cache) = caches.get_mut(variant) {
                for region in &self.regions {
                    cache.touch(*region);
                }
            }
        }
    }

    fn note_missing(&mut self, leases: &ChunkLeaseManager<H>, settings: &RenderSettings, missing: &[ChunkPos]) {
        let Some(first) = missing.first() else {
            self.waiting_ticks = 0;
            return;
        };
        self.waiting_ticks += 1;
        if self.waiting_ticks < settings.missing_chunk_warn_ticks {
            return;
        }
        let mut unique = missing.to_vec();
        unique.sort();
        unique.dedup();
        let msg = format!(
            "waited {} ticks for {} chunk(s) to become resident; first {}",
            self.waiting_ticks,
            unique.len(),
            leases.describe(*first)
        );
        if !self.warned {
            log::warn!(target: "fullrender", "{msg}");
            self.warned = true;
        }
        self.debug_message = Some(msg);
    }

    fn finish(&mut self, leases: &mut ChunkLeaseManager<H>, caches: &mut RegionCaches) {
        for variant in &self.variants {
            if let Some(cache) = caches.get_mut(variant) {
                for region in &self.regions {
                    cache.request_save(*region);
                }
            }
        }
        for &c in &self.acquired {
            leases.release(c);
        }
        self.finished = true;
        log::debug!(
            target: "fullrender",
            "rendered {} chunk(s) over {} region(s)",
            self.chunks.len(),
            self.regions.len()
        );
    }

    /// Stops the task and releases its leases. Pixels already pasted stay.
    pub fn cancel(&mut self, leases: &mut ChunkLeaseManager<H>) {
        if self.finished {
            return;
        }
        for &c in &self.acquired {
            leases.release(c);
        }
        self.renderers.clear();
        self.finished = true;
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.finished
    }

    pub fn chunks_to_render(&self) -> &[ChunkPos] {
        &self.chunks
    }

    pub fn regions(&self) -> &[RegionPos] {
        &self.regions
    }

    /// Chunks of the batch and halo that are not resident yet.
    pub fn pending_chunks(&self, leases: &ChunkLeaseManager<H>) -> Vec<ChunkPos> {
        if self.finished {
            return Vec::new();
        }
        self.acquired
            .iter()
            .copied()
            .filter(|c| !leases.is_ready(*c))
            .collect()
    }

    /// Chunk renders left, summed over variants.
    pub fn remaining(&self) -> usize {
        self.variants.len() * self.chunks.len() - self.done.len()
    }

    pub fn debug_message(&self) -> Option<&str> {
        self.debug_message.as_deref()
    }

    pub fn light(&self) -> LightDirection {
        self.light
    }
}

/// `chunk` and the halo neighbors its shading reads, clipped to the border.
fn needed_chunks<'a>(
    chunk: ChunkPos,
    halo: &'a [(i32, i32)],
    border: &'a WorldBorder,
) -> impl Iterator<Item = ChunkPos> + 'a {
    std::iter::once(chunk).chain(
        halo.iter()
            .map(move |&(dx, dz)| chunk.offset(dx, dz))
            .filter(move |c| border.contains_chunk(*c)),
    )
}
