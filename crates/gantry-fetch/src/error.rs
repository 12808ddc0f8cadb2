#![forbid(unsafe_code)]

use reqwest::Error as ReqwestError;
use thiserror::Error;
use url::Url;

pub type FetchResult<T> = Result<T, FetchError>;

/// Transfer errors, classified for retry.
#[derive(Debug, Error, Clone)]
pub enum FetchError {
    #[error("transfer failed: {0}")]
    Http(String),

    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: Url },

    #[error("timeout")]
    Timeout,

    #[error("cancelled")]
    Cancelled,

    #[error("transfer failed after {max_retries} retries: {source}")]
    RetryExhausted { max_retries: u32, source: Box<Self> },

    #[error("io error: {0}")]
    Io(String),
}

impl FetchError {
    /// Whether another attempt may succeed.
    ///
    /// Transport-level failures and server-side statuses are
    /// transient; client errors (4xx other than 408/429), local io
    /// failures and cancellation are not. Permanent failures share
    /// the same status-file surface as transient ones; only the retry
    /// loop distinguishes them.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout => true,
            Self::HttpStatus { status, .. } => {
                *status >= 500 || *status == 429 || *status == 408
            }
            Self::Cancelled | Self::RetryExhausted { .. } | Self::Io(_) => false,
        }
    }
}

impl From<ReqwestError> for FetchError {
    fn from(e: ReqwestError) -> Self {
        if e.is_timeout() {
            return Self::Timeout;
        }
        // Alternate formatting includes the full source chain
        // ("error sending request ...: connection refused").
        Self::Http(format!("{e:#}"))
    }
}

impl From<std::io::Error> for FetchError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn test_url() -> Url {
        Url::parse("https://example.com/image").expect("valid test URL")
    }

    #[rstest]
    #[case::timeout(FetchError::Timeout, true)]
    #[case::transport(FetchError::Http("connection reset".into()), true)]
    #[case::http_500(FetchError::HttpStatus { status: 500, url: test_url() }, true)]
    #[case::http_503(FetchError::HttpStatus { status: 503, url: test_url() }, true)]
    #[case::http_429(FetchError::HttpStatus { status: 429, url: test_url() }, true)]
    #[case::http_408(FetchError::HttpStatus { status: 408, url: test_url() }, true)]
    #[case::http_404(FetchError::HttpStatus { status: 404, url: test_url() }, false)]
    #[case::http_403(FetchError::HttpStatus { status: 403, url: test_url() }, false)]
    #[case::cancelled(FetchError::Cancelled, false)]
    #[case::io(FetchError::Io("disk full".into()), false)]
    #[case::exhausted(
        FetchError::RetryExhausted { max_retries: 3, source: Box::new(FetchError::Timeout) },
        false
    )]
    fn retry_classification(#[case] error: FetchError, #[case] retryable: bool) {
        assert_eq!(error.is_retryable(), retryable);
    }

    #[test]
    fn retry_exhausted_display_carries_source() {
        let error = FetchError::RetryExhausted {
            max_retries: 3,
            source: Box::new(FetchError::Timeout),
        };
        assert_eq!(
            error.to_string(),
            "transfer failed after 3 retries: timeout"
        );
    }
}
