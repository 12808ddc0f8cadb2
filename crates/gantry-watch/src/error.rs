#![forbid(unsafe_code)]

use thiserror::Error;

/// Watch-boundary errors.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("malformed watch event: {0:?}")]
    BadEvent(String),

    #[error("unknown watch operation: {0:?}")]
    UnknownOp(String),
}

pub type WatchResult<T> = Result<T, WatchError>;
