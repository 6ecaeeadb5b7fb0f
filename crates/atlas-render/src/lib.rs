//! Terrain sampling and resumable tile rendering into palette pixels.
#![forbid(unsafe_code)]

mod light;
mod pixels;
mod sampler;
mod tile;
mod variant;

pub use light::LightDirection;
pub use pixels::{PixelBuffer, REGION_SIZE};
pub use sampler::{TerrainSampler, liquid_shade, relief_shade};
pub use tile::{TileCursor, TileRenderer};
pub use variant::RenderVariant;
