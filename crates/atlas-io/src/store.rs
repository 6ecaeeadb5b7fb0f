use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use atlas_blocks::Palette;
use atlas_geom::RegionPos;
use atlas_render::{PixelBuffer, REGION_SIZE, RenderVariant};
use image::{ImageError, ImageFormat, RgbaImage};

use crate::{StoreError, not_found, write_atomic};

/// Persistent home of region tiles. Called from I/O worker threads.
pub trait TileStore: Send + Sync {
    /// `Ok(None)` when the tile was never saved.
    fn load(&self, variant: RenderVariant, region: RegionPos) -> Result<Option<PixelBuffer>, StoreError>;
    fn save(&self, variant: RenderVariant, region: RegionPos, image: &PixelBuffer) -> Result<(), StoreError>;
}

/// RGBA PNG tiles at `<root>/<variant>/r.<x>.<z>.png`.
pub struct PngTileStore {
    root: PathBuf,
    palette: Palette,
}

impl PngTileStore {
    pub fn new(root: impl Into<PathBuf>, palette: Palette) -> Self {
        Self {
            root: root.into(),
            palette,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tile_path(&self, variant: RenderVariant, region: RegionPos) -> PathBuf {
        self.root
            .join(variant.dir_name())
            .join(format!("{}.png", region.file_stem()))
    }
}

impl TileStore for PngTileStore {
    fn load(&self, variant: RenderVariant, region: RegionPos) -> Result<Option<PixelBuffer>, StoreError> {
        let path = self.tile_path(variant, region);
        let img = match image::open(&path) {
            Ok(img) => img.to_rgba8(),
            Err(ImageError::IoError(err)) if not_found(&err) => return Ok(None),
            Err(err) => return Err(StoreError::image(&path, err)),
        };
        let (width, height) = img.dimensions();
        if width as usize != REGION_SIZE || height as usize != REGION_SIZE {
            return Err(StoreError::Dimensions {
                path,
                width,
                height,
                expected: REGION_SIZE,
            });
        }
        let pixels = img.pixels().map(|p| self.palette.color_of(p.0)).collect();
        Ok(PixelBuffer::from_pixels(REGION_SIZE, REGION_SIZE, pixels))
    }

    fn save(&self, variant: RenderVariant, region: RegionPos, image: &PixelBuffer) -> Result<(), StoreError> {
        let path = self.tile_path(variant, region);
        let mut bytes = Vec::with_capacity(image.pixels().len() * 4);
        for color in image.pixels() {
            bytes.extend_from_slice(&self.palette.rgba(*color));
        }
        let (w, h) = (image.width() as u32, image.height() as u32);
        let rgba = RgbaImage::from_raw(w, h, bytes).ok_or(StoreError::Dimensions {
            path: path.clone(),
            width: w,
            height: h,
            expected: REGION_SIZE,
        })?;
        write_atomic(&path, |tmp| {
            rgba.save_with_format(tmp, ImageFormat::Png)
                .map_err(|err| StoreError::image(tmp, err))
        })?;
        log::trace!(target: "regions", "wrote {:?}", path);
        Ok(())
    }
}

/// Tiles kept in memory; used where nothing should touch the disk.
#[derive(Default)]
pub struct MemoryTileStore {
    tiles: Mutex<HashMap<(RenderVariant, RegionPos), PixelBuffer>>,
    saves: Mutex<usize>,
}

impl MemoryTileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps serving tiles after a writer thread panicked mid-save.
    fn tiles(&self) -> MutexGuard<'_, HashMap<(RenderVariant, RegionPos), PixelBuffer>> {
        self.tiles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, variant: RenderVariant, region: RegionPos, image: PixelBuffer) {
        self.tiles().insert((variant, region), image);
    }

    pub fn get(&self, variant: RenderVariant, region: RegionPos) -> Option<PixelBuffer> {
        self.tiles().get(&(variant, region)).cloned()
    }

    pub fn len(&self) -> usize {
        self.tiles().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of successful saves so far.
    pub fn saves(&self) -> usize {
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TileStore for MemoryTileStore {
    fn load(&self, variant: RenderVariant, region: RegionPos) -> Result<Option<PixelBuffer>, StoreError> {
        Ok(self.get(variant, region))
    }

    fn save(&self, variant: RenderVariant, region: RegionPos, image: &PixelBuffer) -> Result<(), StoreError> {
        self.insert(variant, region, image.clone());
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn memory_store_survives_a_poisoned_lock() {
        let store = Arc::new(MemoryTileStore::new());
        let held = Arc::clone(&store);
        let joined = std::thread::spawn(move || {
            let _guard = held.tiles.lock().unwrap();
            panic!("writer dies holding the lock");
        })
        .join();
        assert!(joined.is_err());

        let region = RegionPos::new(2, -3);
        store.save(RenderVariant::Surface, region, &PixelBuffer::region()).unwrap();
        assert_eq!(store.saves(), 1);
        assert!(store.load(RenderVariant::Surface, region).unwrap().is_some());
        assert_eq!(store.len(), 1);
    }
}
