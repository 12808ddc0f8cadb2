#![forbid(unsafe_code)]

use thiserror::Error;

/// Failures that escape a verifier handler.
///
/// Rename, permission and digest problems for a single artifact are
/// recorded in its status file and are not errors here.
#[derive(Debug, Error)]
pub enum VerifierError {
    #[error(transparent)]
    State(#[from] gantry_state::StateError),

    #[error(transparent)]
    Catalog(#[from] gantry_catalog::CatalogError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type VerifierResult<T> = Result<T, VerifierError>;
