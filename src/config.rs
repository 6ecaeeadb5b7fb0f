use std::error::Error;
use std::path::{Path, PathBuf};

use atlas_geom::WorldBorder;
use atlas_runtime::RenderSettings;
use atlas_world::NoiseParams;
use serde::Deserialize;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AtlasConfig {
    pub world: WorldConfig,
    pub render: RenderConfig,
    pub paths: PathsConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub name: String,
    pub border_center_x: f64,
    pub border_center_z: f64,
    pub border_size: f64,
    pub generator_threads: usize,
    pub terrain: NoiseParams,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: "overworld".to_string(),
            border_center_x: 0.0,
            border_center_z: 0.0,
            border_size: 2048.0,
            generator_threads: 4,
            terrain: NoiseParams::default(),
        }
    }
}

impl WorldConfig {
    pub fn border(&self) -> WorldBorder {
        WorldBorder::from_center_size(self.border_center_x, self.border_center_z, self.border_size)
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Sleep target between ticks.
    pub tick_interval_ms: u64,
    #[serde(flatten)]
    pub settings: RenderSettings,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 50,
            settings: RenderSettings::default(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub output: PathBuf,
    /// Block color table; the built-in one when unset.
    pub colors: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("map"),
            colors: None,
        }
    }
}

impl AtlasConfig {
    /// Directory holding the world tag.
    pub fn world_dir(&self) -> PathBuf {
        self.paths.output.join(&self.world.name)
    }

    pub fn tiles_dir(&self) -> PathBuf {
        self.world_dir().join("tiles")
    }
}

pub fn parse_config(text: &str) -> Result<AtlasConfig, Box<dyn Error>> {
    Ok(toml::from_str(text)?)
}

/// A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<AtlasConfig, Box<dyn Error>> {
    if !path.exists() {
        log::info!("{} not found, using defaults", path.display());
        return Ok(AtlasConfig::default());
    }
    let text = std::fs::read_to_string(path)?;
    parse_config(&text).map_err(|e| format!("{}: {e}", path.display()).into())
}
