#![forbid(unsafe_code)]

use std::path::PathBuf;

use thiserror::Error;

/// Catalogue and ledger errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalogue root missing: {0}")]
    RootMissing(PathBuf),

    #[error("would exceed remaining space {requested} vs {remaining}")]
    NoSpace { requested: u64, remaining: u64 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    State(#[from] gantry_state::StateError),
}

pub type CatalogResult<T> = Result<T, CatalogError>;
