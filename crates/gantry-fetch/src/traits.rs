#![forbid(unsafe_code)]

use std::path::Path;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::FetchResult;

/// Byte transfer from a URL to a local file.
///
/// On success the destination holds the complete body and the byte
/// count is returned (also observable via filesystem stat). On error
/// the destination must not exist. Retries on transient failures are
/// the implementation's responsibility, bounded by its configured
/// budget.
///
/// Cancellation is cooperative via the token; an implementation that
/// cannot interrupt a running transfer must still fail promptly after
/// it completes and leave no file behind.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url, dest: &Path, cancel: CancellationToken) -> FetchResult<u64>;
}
