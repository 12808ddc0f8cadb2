#![forbid(unsafe_code)]

//! # gantry-fetch
//!
//! Byte transfer from a URL into a local file.
//!
//! The consumer-facing seam is the [`Fetcher`] trait; [`HttpFetcher`]
//! is the in-process HTTP realization. It streams the body to a
//! `.part` sibling and renames on success, so a failed transfer never
//! leaves a partial file at the destination.
//!
//! Retries are internal: transient failures (5xx, 429, 408, timeouts,
//! connection errors) are retried with exponential backoff up to the
//! configured budget, then surfaced as [`FetchError::RetryExhausted`]
//! wrapping the last attempt's error. Permanent failures (other 4xx,
//! local io, cancellation) are returned as-is on the first attempt.

mod error;
mod http;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
mod options;
mod traits;

pub use error::{FetchError, FetchResult};
pub use http::HttpFetcher;
pub use options::FetchOptions;
pub use traits::Fetcher;
