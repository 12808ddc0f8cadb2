#![forbid(unsafe_code)]

use std::path::PathBuf;

use thiserror::Error;

/// Failures that escape a downloader handler.
///
/// Artifact-level problems (no space, failed transfer, oversized
/// result) are recorded in the artifact's status file instead and are
/// not errors here.
#[derive(Debug, Error)]
pub enum DownloaderError {
    #[error("global download config missing at {0}")]
    MissingGlobalConfig(PathBuf),

    #[error(transparent)]
    State(#[from] gantry_state::StateError),

    #[error(transparent)]
    Catalog(#[from] gantry_catalog::CatalogError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DownloaderResult<T> = Result<T, DownloaderError>;
