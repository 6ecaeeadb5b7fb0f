//! Tick-driven map scheduling: chunk leases, region tile cache, render tasks.
#![forbid(unsafe_code)]

mod context;
mod error;
mod full_render;
mod lease;
mod region_cache;
mod task;

pub use context::{MapContext, MapStatus, RenderSettings};
pub use error::MapError;
pub use full_render::{
    FullRenderScheduler, FullRenderStatus, FullRenderStep, MIN_MILLIS_PER_TICK, TICK_RATE_THRESHOLD, region_batch,
    ring_regions,
};
pub use lease::{ChunkLeaseManager, LeaseCallback};
pub use region_cache::{IoPool, RegionCache, RegionCacheStats, RegionCaches, RegionState};
pub use task::RenderTask;
