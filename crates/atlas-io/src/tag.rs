use std::collections::VecDeque;
use std::fs;
use std::io::Write;
use std::path::Path;

use atlas_geom::{ChunkPos, RegionPos, WorldBorder};
use atlas_render::RenderVariant;
use atlas_world::Environment;
use serde::{Deserialize, Serialize};

use crate::{StoreError, not_found, write_atomic};

pub const TAG_FILE: &str = "tag.json";

/// Per-world map settings and the resumable full render state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldTag {
    /// Border the host reported when the world was last enabled.
    pub world_border: Option<WorldBorder>,
    /// Operator override, preferred over `world_border`.
    pub custom_border: Option<WorldBorder>,
    pub environment: Environment,
    pub variants: Vec<RenderVariant>,
    pub full_render: Option<FullRenderProgress>,
}

impl WorldTag {
    pub fn effective_border(&self) -> Option<WorldBorder> {
        self.custom_border.or(self.world_border)
    }
}

/// Checkpoint of a ring-by-ring full render.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FullRenderProgress {
    /// Unix millis when the render was scheduled.
    pub start_time_ms: u64,
    /// Border the ring walk is clipped to.
    pub world_border: WorldBorder,
    /// Next ring to generate.
    pub ring: i32,
    pub region_queue: VecDeque<RegionPos>,
    pub current_region: Option<RegionPos>,
    pub current_chunks: Vec<ChunkPos>,
    pub regions_done: u64,
    pub paused: bool,
    /// Adaptive per-tick render budget; 0 means the configured budget.
    pub max_millis_per_tick: u64,
}

impl FullRenderProgress {
    pub fn new(world_border: WorldBorder, start_time_ms: u64) -> Self {
        Self {
            start_time_ms,
            world_border,
            ..Self::default()
        }
    }
}

pub fn load_tag(dir: &Path) -> Result<Option<WorldTag>, StoreError> {
    let path = dir.join(TAG_FILE);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if not_found(&err) => return Ok(None),
        Err(err) => return Err(StoreError::io(&path, err)),
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|err| StoreError::json(&path, err))
}

pub fn save_tag(dir: &Path, tag: &WorldTag) -> Result<(), StoreError> {
    let path = dir.join(TAG_FILE);
    let json = serde_json::to_string_pretty(tag).map_err(|err| StoreError::json(&path, err))?;
    write_atomic(&path, |tmp| {
        let mut file = fs::File::create(tmp).map_err(|err| StoreError::io(tmp, err))?;
        file.write_all(json.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|err| StoreError::io(tmp, err))
    })
}
