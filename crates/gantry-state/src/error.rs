#![forbid(unsafe_code)]

use thiserror::Error;

/// State-store errors.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid safe name: {0:?}")]
    InvalidName(String),

    #[error("invalid sha256 digest: {0:?}")]
    InvalidDigest(String),
}

pub type StateResult<T> = Result<T, StateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_name_display() {
        let err = StateError::InvalidName("a/b".into());
        assert_eq!(err.to_string(), "invalid safe name: \"a/b\"");
    }

    #[test]
    fn state_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StateError>();
    }
}
