use std::sync::Arc;

use atlas_blocks::{Color, ColorTable};
use atlas_geom::{CHUNK_BLOCKS, ChunkPos, WorldBorder};
use atlas_world::BlockSource;
use serde::{Deserialize, Serialize};

use crate::light::LightDirection;
use crate::pixels::PixelBuffer;
use crate::sampler::TerrainSampler;
use crate::variant::RenderVariant;

/// Next pixel a [`TileRenderer`] will draw.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileCursor {
    pub x: u32,
    pub z: u32,
    pub finished: bool,
}

/// Renders a rectangle of columns one pixel per [`TileRenderer::step`],
/// row by row, so the work can be spread over any number of ticks.
pub struct TileRenderer<S: BlockSource> {
    source: Arc<S>,
    colors: Arc<ColorTable>,
    border: WorldBorder,
    light: LightDirection,
    variant: RenderVariant,
    origin_x: i32,
    origin_z: i32,
    buffer: PixelBuffer,
    cursor: TileCursor,
}

impl<S: BlockSource> TileRenderer<S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Arc<S>,
        colors: Arc<ColorTable>,
        border: WorldBorder,
        light: LightDirection,
        variant: RenderVariant,
        origin_x: i32,
        origin_z: i32,
        width: usize,
        height: usize,
    ) -> Self {
        Self {
            source,
            colors,
            border,
            light,
            variant,
            origin_x,
            origin_z,
            buffer: PixelBuffer::new(width, height),
            cursor: TileCursor {
                x: 0,
                z: 0,
                finished: width == 0 || height == 0,
            },
        }
    }

    /// 16x16 renderer covering one chunk.
    pub fn for_chunk(
        source: Arc<S>,
        colors: Arc<ColorTable>,
        border: WorldBorder,
        light: LightDirection,
        variant: RenderVariant,
        chunk: ChunkPos,
    ) -> Self {
        let size = CHUNK_BLOCKS as usize;
        Self::new(
            source,
            colors,
            border,
            light,
            variant,
            chunk.min_block_x(),
            chunk.min_block_z(),
            size,
            size,
        )
    }

    /// Renders the pixel under the cursor and advances it.
    pub fn step(&mut self) {
        if self.cursor.finished {
            return;
        }
        let px = self.cursor.x as usize;
        let pz = self.cursor.z as usize;
        let x = self.origin_x + px as i32;
        let z = self.origin_z + pz as i32;
        let color = if self.border.contains_block(x, z) {
            let sampler = TerrainSampler::new(&self.colors, &self.border, self.light);
            sampler.sample(&*self.source, self.variant, x, z, px as i32, pz as i32)
        } else {
            Color::TRANSPARENT
        };
        self.buffer.set(px, pz, color);
        self.advance();
    }

    fn advance(&mut self) {
        self.cursor.x += 1;
        if self.cursor.x as usize >= self.buffer.width() {
            self.cursor.x = 0;
            self.cursor.z += 1;
            if self.cursor.z as usize >= self.buffer.height() {
                self.cursor.finished = true;
            }
        }
    }

    /// Steps up to `n` times; returns how many pixels were drawn.
    pub fn run(&mut self, n: usize) -> usize {
        let mut done = 0;
        while done < n && !self.cursor.finished {
            self.step();
            done += 1;
        }
        done
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.cursor.finished
    }

    #[inline]
    pub fn cursor(&self) -> TileCursor {
        self.cursor
    }

    /// Continues from a cursor saved earlier. Pixels before it keep whatever
    /// the buffer holds.
    pub fn resume_from(&mut self, cursor: TileCursor) {
        let in_range =
            (cursor.x as usize) < self.buffer.width() && (cursor.z as usize) < self.buffer.height();
        self.cursor = if in_range || cursor.finished {
            cursor
        } else {
            TileCursor {
                finished: true,
                ..cursor
            }
        };
    }

    #[inline]
    pub fn variant(&self) -> RenderVariant {
        self.variant
    }

    #[inline]
    pub fn origin(&self) -> (i32, i32) {
        (self.origin_x, self.origin_z)
    }

    #[inline]
    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    pub fn into_buffer(self) -> PixelBuffer {
        self.buffer
    }
}
