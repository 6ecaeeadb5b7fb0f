use atlas_blocks::Color;
use atlas_geom::REGION_BLOCKS;

/// Side length of a region tile in pixels.
pub const REGION_SIZE: usize = REGION_BLOCKS as usize;

/// Row-major grid of palette colors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    width: usize,
    height: usize,
    pixels: Vec<Color>,
}

impl PixelBuffer {
    /// Fully transparent buffer.
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, Color::TRANSPARENT)
    }

    pub fn filled(width: usize, height: usize, color: Color) -> Self {
        Self {
            width,
            height,
            pixels: vec![color; width * height],
        }
    }

    /// Blank region-sized tile.
    pub fn region() -> Self {
        Self::new(REGION_SIZE, REGION_SIZE)
    }

    pub fn from_pixels(width: usize, height: usize, pixels: Vec<Color>) -> Option<Self> {
        (pixels.len() == width * height).then_some(Self {
            width,
            height,
            pixels,
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn pixels(&self) -> &[Color] {
        &self.pixels
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Color {
        debug_assert!(x < self.width && y < self.height);
        self.pixels[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, color: Color) {
        debug_assert!(x < self.width && y < self.height);
        self.pixels[y * self.width + x] = color;
    }

    pub fn fill(&mut self, color: Color) {
        self.pixels.fill(color);
    }

    /// Copies `src` with its top-left corner at (`x`, `y`), clipped to this buffer.
    pub fn blit(&mut self, src: &PixelBuffer, x: usize, y: usize) {
        if x >= self.width || y >= self.height {
            return;
        }
        let w = src.width.min(self.width - x);
        let h = src.height.min(self.height - y);
        for row in 0..h {
            let from = row * src.width;
            let to = (y + row) * self.width + x;
            self.pixels[to..to + w].copy_from_slice(&src.pixels[from..from + w]);
        }
    }

    pub fn is_blank(&self) -> bool {
        self.pixels.iter().all(|c| c.is_transparent())
    }

    pub fn count(&self, color: Color) -> usize {
        self.pixels.iter().filter(|c| **c == color).count()
    }
}
