use atlas_io::StoreError;
use rayon::ThreadPoolBuildError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MapError {
    #[error("map storage failed: {0}")]
    Store(#[from] StoreError),
    #[error("could not start i/o workers: {0}")]
    IoPool(#[from] ThreadPoolBuildError),
    #[error("map of {0} is disabled")]
    Disabled(String),
    #[error("world {0} has no known border")]
    NoWorldBorder(String),
    #[error("a full render of {0} is already scheduled")]
    FullRenderRunning(String),
    #[error("no full render of {0} is scheduled")]
    NoFullRender(String),
}
