//! Persistence: region tile images and the per-world map tag.
#![forbid(unsafe_code)]

mod error;
mod store;
mod tag;

pub use error::StoreError;
pub use store::{MemoryTileStore, PngTileStore, TileStore};
pub use tag::{FullRenderProgress, TAG_FILE, WorldTag, load_tag, save_tag};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Lets `write` fill a temporary sibling of `path`, then renames it into
/// place. Readers never see a partial file.
pub(crate) fn write_atomic(
    path: &Path,
    write: impl FnOnce(&Path) -> Result<(), StoreError>,
) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StoreError::io(parent, source))?;
    }
    let tmp = tmp_path(path);
    write(&tmp)?;
    fs::rename(&tmp, path).map_err(|source| {
        let _ = fs::remove_file(&tmp);
        StoreError::io(path, source)
    })
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

pub(crate) fn not_found(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::NotFound
}
