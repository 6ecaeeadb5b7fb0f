use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use atlas_blocks::{MaterialCatalog, MaterialId};
use atlas_geom::{CHUNK_BLOCKS, ChunkPos, WorldBorder};
use fastnoise_lite::{FastNoiseLite, NoiseType};
use hashbrown::{HashMap, HashSet};
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use serde::Deserialize;

use crate::column::Column;
use crate::host::{BlockSample, BlockSource, ChunkHost, ChunkLoadRequest, Environment};

const NETHER_LAVA_LEVEL: i32 = 31;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct NoiseParams {
    pub seed: i32,
    pub environment: Environment,
    pub min_y: i32,
    pub max_y: i32,
    pub sea_level: i32,
    pub height_frequency: f32,
    pub height_amplitude: f32,
    pub snow_line: i32,
    pub caves: bool,
    pub day_time: i64,
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self {
            seed: 1337,
            environment: Environment::Normal,
            min_y: -64,
            max_y: 319,
            sea_level: 63,
            height_frequency: 0.004,
            height_amplitude: 40.0,
            snow_line: 100,
            caves: true,
            day_time: 6000,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Materials {
    stone: MaterialId,
    bedrock: MaterialId,
    dirt: MaterialId,
    grass: MaterialId,
    sand: MaterialId,
    gravel: MaterialId,
    snow: MaterialId,
    netherrack: MaterialId,
    soul_sand: MaterialId,
    glowstone: MaterialId,
    end_stone: MaterialId,
}

impl Materials {
    fn resolve(catalog: &mut MaterialCatalog) -> Self {
        Self {
            stone: catalog.intern("stone"),
            bedrock: catalog.intern("bedrock"),
            dirt: catalog.intern("dirt"),
            grass: catalog.intern("grass_block"),
            sand: catalog.intern("sand"),
            gravel: catalog.intern("gravel"),
            snow: catalog.intern("snow_block"),
            netherrack: catalog.intern("netherrack"),
            soul_sand: catalog.intern("soul_sand"),
            glowstone: catalog.intern("glowstone"),
            end_stone: catalog.intern("end_stone"),
        }
    }
}

struct GenCtx {
    terrain: FastNoiseLite,
    detail: FastNoiseLite,
    caves: FastNoiseLite,
}

impl GenCtx {
    fn new(params: &NoiseParams) -> Self {
        let mut terrain = FastNoiseLite::with_seed(params.seed);
        terrain.set_noise_type(Some(NoiseType::OpenSimplex2));
        terrain.set_frequency(Some(params.height_frequency));
        let mut detail = FastNoiseLite::with_seed(params.seed ^ 0x5EED_0F1E);
        detail.set_noise_type(Some(NoiseType::OpenSimplex2));
        detail.set_frequency(Some(params.height_frequency * 6.0));
        let mut caves = FastNoiseLite::with_seed(params.seed ^ 41_337);
        caves.set_noise_type(Some(NoiseType::OpenSimplex2));
        caves.set_frequency(Some(0.03));
        Self {
            terrain,
            detail,
            caves,
        }
    }
}

type ChunkColumns = Arc<Vec<Column>>;

struct Inner {
    params: NoiseParams,
    mats: Materials,
    border: WorldBorder,
    chunks: RwLock<HashMap<ChunkPos, ChunkColumns>>,
    pinned: Mutex<HashSet<ChunkPos>>,
    day_time: AtomicI64,
}

/// Procedural world generated column by column from 2-D/3-D noise. Chunks
/// are generated on a worker pool when requested and stay resident until
/// [`NoiseWorld::collect_garbage`] drops the unpinned ones.
pub struct NoiseWorld {
    inner: Arc<Inner>,
    pool: Arc<ThreadPool>,
}

impl NoiseWorld {
    pub fn new(
        params: NoiseParams,
        catalog: &mut MaterialCatalog,
        border: WorldBorder,
        workers: usize,
    ) -> Result<Self, ThreadPoolBuildError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("atlas-gen-{i}"))
            .build()?;
        let day_time = params.day_time;
        Ok(Self {
            inner: Arc::new(Inner {
                mats: Materials::resolve(catalog),
                params,
                border,
                chunks: RwLock::new(HashMap::new()),
                pinned: Mutex::new(HashSet::new()),
                day_time: AtomicI64::new(day_time),
            }),
            pool: Arc::new(pool),
        })
    }

    pub fn params(&self) -> &NoiseParams {
        &self.inner.params
    }

    pub fn set_day_time(&self, ticks: i64) {
        self.inner.day_time.store(ticks, Ordering::Relaxed);
    }

    pub fn resident_count(&self) -> usize {
        self.inner.chunks.read().unwrap().len()
    }

    /// Unloads every resident chunk that is not pinned.
    pub fn collect_garbage(&self) -> usize {
        let pinned = self.inner.pinned.lock().unwrap().clone();
        let mut chunks = self.inner.chunks.write().unwrap();
        let before = chunks.len();
        chunks.retain(|pos, _| pinned.contains(pos));
        let dropped = before - chunks.len();
        if dropped > 0 {
            log::debug!("unloaded {} chunks, {} pinned", dropped, pinned.len());
        }
        dropped
    }

    /// Generates a chunk on the calling thread, used by pins of chunks that
    /// were never loaded.
    fn ensure_loaded(&self, chunk: ChunkPos) {
        if self.is_chunk_resident(chunk) {
            return;
        }
        let columns = self.inner.generate(chunk);
        self.inner
            .chunks
            .write()
            .unwrap()
            .entry(chunk)
            .or_insert(columns);
    }
}

impl Inner {
    fn generate(&self, chunk: ChunkPos) -> ChunkColumns {
        let ctx = GenCtx::new(&self.params);
        let mut columns = Vec::with_capacity((CHUNK_BLOCKS * CHUNK_BLOCKS) as usize);
        for dz in 0..CHUNK_BLOCKS {
            for dx in 0..CHUNK_BLOCKS {
                let x = chunk.min_block_x() + dx;
                let z = chunk.min_block_z() + dz;
                let column = match self.params.environment {
                    Environment::Normal => self.overworld_column(&ctx, x, z),
                    Environment::Nether => self.nether_column(&ctx, x, z),
                    Environment::End => self.end_column(&ctx, x, z),
                };
                columns.push(column);
            }
        }
        Arc::new(columns)
    }

    fn overworld_column(&self, ctx: &GenCtx, x: i32, z: i32) -> Column {
        let p = &self.params;
        let m = &self.mats;
        let n = ctx.terrain.get_noise_2d(x as f32, z as f32)
            + 0.25 * ctx.detail.get_noise_2d(x as f32, z as f32);
        let h = (p.sea_level + (n * p.height_amplitude).round() as i32).clamp(p.min_y + 8, p.max_y - 1);
        let mut col = Column::new();
        col.set(p.min_y, m.bedrock).fill(p.min_y + 1, h - 4, m.stone);
        if h < p.sea_level - 1 {
            let floor = if h < p.sea_level - 12 { m.gravel } else { m.sand };
            col.fill(h - 3, h, floor).fill(h + 1, p.sea_level, MaterialId::WATER);
        } else if h <= p.sea_level + 1 {
            col.fill(h - 3, h, m.sand);
        } else if h >= p.snow_line {
            col.fill(h - 3, h - 1, m.stone).set(h, m.snow);
        } else {
            col.fill(h - 3, h - 1, m.dirt).set(h, m.grass);
        }
        if p.caves {
            self.carve(ctx, &mut col, x, z, p.min_y + 4, h - 8);
        }
        col
    }

    fn nether_column(&self, ctx: &GenCtx, x: i32, z: i32) -> Column {
        let p = &self.params;
        let m = &self.mats;
        let roof = p.max_y.min(127);
        let n = ctx.terrain.get_noise_2d(x as f32, z as f32);
        let d = ctx.detail.get_noise_2d(x as f32, z as f32);
        let floor = (40 + (n * 14.0).round() as i32).clamp(p.min_y + 2, roof - 20);
        let ceiling = (roof - 20 + (d * 8.0).round() as i32).clamp(floor + 4, roof - 1);
        let mut col = Column::new();
        col.set(p.min_y, m.bedrock).fill(p.min_y + 1, floor, m.netherrack);
        if d < -0.45 {
            col.set(floor, m.soul_sand);
        }
        if floor < NETHER_LAVA_LEVEL {
            col.fill(floor + 1, NETHER_LAVA_LEVEL, MaterialId::LAVA);
        }
        col.fill(ceiling, roof - 1, m.netherrack).set(roof, m.bedrock);
        if d > 0.6 {
            col.set(ceiling - 1, m.glowstone);
        }
        col
    }

    fn end_column(&self, ctx: &GenCtx, x: i32, z: i32) -> Column {
        let n = ctx.terrain.get_noise_2d(x as f32, z as f32);
        let mut col = Column::new();
        if n > 0.2 {
            let thickness = ((n - 0.2) * 40.0).round() as i32;
            col.fill(60 - thickness, 60 + thickness / 4, self.mats.end_stone);
        }
        col
    }

    fn carve(&self, ctx: &GenCtx, col: &mut Column, x: i32, z: i32, bottom: i32, top: i32) {
        let mut run: Option<(i32, i32)> = None;
        for y in bottom..=top {
            let v = ctx.caves.get_noise_3d(x as f32, y as f32 * 1.6, z as f32);
            if v.abs() < 0.07 {
                run = Some(match run {
                    Some((start, _)) => (start, y),
                    None => (y, y),
                });
            } else if let Some((start, end)) = run.take() {
                col.fill(start, end, MaterialId::CAVE_AIR);
            }
        }
        if let Some((start, end)) = run {
            col.fill(start, end, MaterialId::CAVE_AIR);
        }
    }
}

impl BlockSource for NoiseWorld {
    fn min_y(&self) -> i32 {
        self.inner.params.min_y
    }

    fn max_y(&self) -> i32 {
        self.inner.params.max_y
    }

    fn is_chunk_resident(&self, chunk: ChunkPos) -> bool {
        self.inner.chunks.read().unwrap().contains_key(&chunk)
    }

    fn block_at(&self, x: i32, y: i32, z: i32) -> BlockSample {
        if y < self.inner.params.min_y || y > self.inner.params.max_y {
            return BlockSample::AIR;
        }
        let chunk = ChunkPos::from_block(x, z);
        let chunks = self.inner.chunks.read().unwrap();
        let Some(columns) = chunks.get(&chunk) else {
            return BlockSample::AIR;
        };
        let lx = (x - chunk.min_block_x()) as usize;
        let lz = (z - chunk.min_block_z()) as usize;
        columns[lz * CHUNK_BLOCKS as usize + lx].sample(y)
    }

    fn day_time(&self) -> i64 {
        self.inner.day_time.load(Ordering::Relaxed)
    }
}

impl ChunkHost for NoiseWorld {
    fn load_chunk_async(&self, chunk: ChunkPos, request: ChunkLoadRequest) {
        if self.is_chunk_resident(chunk) {
            request.complete(chunk);
            return;
        }
        let inner = Arc::clone(&self.inner);
        self.pool.spawn(move || {
            let columns = inner.generate(chunk);
            inner.chunks.write().unwrap().entry(chunk).or_insert(columns);
            request.complete(chunk);
        });
    }

    fn pin_chunk(&self, chunk: ChunkPos) {
        self.ensure_loaded(chunk);
        self.inner.pinned.lock().unwrap().insert(chunk);
    }

    fn unpin_chunk(&self, chunk: ChunkPos) {
        self.inner.pinned.lock().unwrap().remove(&chunk);
    }

    fn world_border(&self) -> Option<WorldBorder> {
        Some(self.inner.border)
    }

    fn environment(&self) -> Environment {
        self.inner.params.environment
    }
}
