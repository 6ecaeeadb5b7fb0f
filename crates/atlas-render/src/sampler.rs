use atlas_blocks::{BaseColor, Color, ColorTable, Shade};
use atlas_geom::{ChunkPos, WorldBorder};
use atlas_world::{BlockSample, BlockSource, FULL_SKY};

use crate::light::LightDirection;
use crate::variant::RenderVariant;

/// Nether maps start below the roof regardless of the world height.
const NETHER_ROOF_Y: i32 = 127;

type HeightSearch = fn(&TerrainSampler<'_>, &dyn BlockSource, i32, i32) -> Option<i32>;

const fn height_search(variant: RenderVariant) -> HeightSearch {
    match variant {
        RenderVariant::Surface => surface_height,
        RenderVariant::Cave => cave_height,
        RenderVariant::Nether => nether_height,
    }
}

/// Turns one world column into one palette color.
#[derive(Clone, Copy)]
pub struct TerrainSampler<'a> {
    colors: &'a ColorTable,
    border: &'a WorldBorder,
    light: LightDirection,
}

impl<'a> TerrainSampler<'a> {
    pub fn new(colors: &'a ColorTable, border: &'a WorldBorder, light: LightDirection) -> Self {
        Self {
            colors,
            border,
            light,
        }
    }

    /// Color of column (`x`, `z`); `pixel_x`/`pixel_z` only drive the liquid
    /// dither. Panics if the column's chunk, or the in-border neighbor used for
    /// shading, is not resident.
    pub fn sample(
        &self,
        source: &dyn BlockSource,
        variant: RenderVariant,
        x: i32,
        z: i32,
        pixel_x: i32,
        pixel_z: i32,
    ) -> Color {
        assert_resident(source, x, z);
        let search = height_search(variant);
        let Some(y) = search(self, source, x, z) else {
            return variant.no_data();
        };
        let block = source.block_at(x, y, z);
        if block.is_water() {
            let depth = liquid_depth(source, x, y, z, BlockSample::is_water);
            return Color::new(BaseColor::WATER, liquid_shade(depth, pixel_x, pixel_z));
        }
        if block.is_lava() {
            let depth = liquid_depth(source, x, y, z, BlockSample::is_lava);
            return Color::new(BaseColor::FIRE, liquid_shade(depth, pixel_x, pixel_z));
        }
        let nx = x + self.light.dx;
        let nz = z + self.light.dz;
        let shade = if self.border.contains_block(nx, nz) {
            assert_resident(source, nx, nz);
            relief_shade(y, search(self, source, nx, nz))
        } else {
            Shade::Light
        };
        self.colors.color(block.material, shade)
    }

    #[inline]
    fn is_transparent(&self, block: &BlockSample) -> bool {
        !block.is_liquid() && self.colors.is_transparent(block.material)
    }

    fn skip_transparent(&self, source: &dyn BlockSource, x: i32, mut y: i32, z: i32) -> Option<i32> {
        let min_y = source.min_y();
        while y >= min_y && self.is_transparent(&source.block_at(x, y, z)) {
            y -= 1;
        }
        (y >= min_y).then_some(y)
    }
}

fn assert_resident(source: &dyn BlockSource, x: i32, z: i32) {
    let chunk = ChunkPos::from_block(x, z);
    assert!(
        source.is_chunk_resident(chunk),
        "sampled block ({x}, {z}) of non-resident {chunk}"
    );
}

fn skip_while(
    source: &dyn BlockSource,
    x: i32,
    mut y: i32,
    z: i32,
    pred: impl Fn(&BlockSample) -> bool,
) -> i32 {
    let min_y = source.min_y();
    while y >= min_y && pred(&source.block_at(x, y, z)) {
        y -= 1;
    }
    y
}

fn surface_height(s: &TerrainSampler<'_>, source: &dyn BlockSource, x: i32, z: i32) -> Option<i32> {
    let y = skip_while(source, x, source.max_y(), z, BlockSample::is_air);
    s.skip_transparent(source, x, y, z)
}

// Roof blocks, then the air below them, then see-through blocks.
fn nether_height(s: &TerrainSampler<'_>, source: &dyn BlockSource, x: i32, z: i32) -> Option<i32> {
    let top = source.max_y().min(NETHER_ROOF_Y);
    let y = skip_while(source, x, top, z, |b| !b.is_air());
    let y = skip_while(source, x, y, z, BlockSample::is_air);
    s.skip_transparent(source, x, y, z)
}

// Open air, then everything solid or sky lit (the roof), then cave air, then
// see-through blocks: the first surface under a cave ceiling.
fn cave_height(s: &TerrainSampler<'_>, source: &dyn BlockSource, x: i32, z: i32) -> Option<i32> {
    let y = skip_while(source, x, source.max_y(), z, BlockSample::is_air);
    let y = skip_while(source, x, y, z, |b| !b.is_air() || b.sky_light == FULL_SKY);
    let y = skip_while(source, x, y, z, BlockSample::is_air);
    s.skip_transparent(source, x, y, z)
}

/// Number of consecutive liquid blocks from `top` downward.
fn liquid_depth(
    source: &dyn BlockSource,
    x: i32,
    top: i32,
    z: i32,
    same: fn(&BlockSample) -> bool,
) -> i32 {
    let min_y = source.min_y();
    let mut y = top;
    while y > min_y && same(&source.block_at(x, y, z)) {
        y -= 1;
    }
    top - y
}

/// Shade for a liquid column `depth` blocks deep; alternating buckets dither
/// on pixel parity.
pub fn liquid_shade(depth: i32, pixel_x: i32, pixel_z: i32) -> Shade {
    let even = (pixel_x & 1) == (pixel_z & 1);
    let checker = |a: Shade, b: Shade| if even { a } else { b };
    match depth {
        d if d <= 2 => Shade::Bright,
        d if d <= 4 => checker(Shade::Bright, Shade::Light),
        d if d <= 6 => Shade::Light,
        d if d <= 8 => checker(Shade::Normal, Shade::Light),
        d if d <= 12 => Shade::Normal,
        d if d <= 16 => checker(Shade::Normal, Shade::Dark),
        _ => Shade::Dark,
    }
}

/// Shade from comparing a surface with the one toward the light.
pub fn relief_shade(height: i32, neighbor: Option<i32>) -> Shade {
    match neighbor {
        Some(n) if height > n => Shade::Bright,
        Some(n) if height < n => Shade::Normal,
        Some(_) => Shade::Light,
        None => Shade::Normal,
    }
}
