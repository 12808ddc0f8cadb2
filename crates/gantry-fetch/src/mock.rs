#![forbid(unsafe_code)]

//! Scripted [`Fetcher`] for reconciler tests.

use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
    sync::Mutex,
};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{
    error::{FetchError, FetchResult},
    traits::Fetcher,
};

/// One scripted outcome, consumed per `fetch` call in FIFO order.
#[derive(Clone, Debug)]
pub enum MockTransfer {
    /// Write these bytes to the destination and succeed.
    Serve(Vec<u8>),
    /// Fail with a transport error carrying this message.
    Fail(String),
    /// Fail with an HTTP status.
    FailStatus(u16),
}

/// Fetcher that plays back a script and records its invocations.
///
/// An exhausted script fails the call, so a test that expects N
/// transfers pushes exactly N outcomes.
#[derive(Default)]
pub struct MockFetcher {
    script: Mutex<VecDeque<MockTransfer>>,
    calls: Mutex<Vec<(Url, PathBuf)>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, outcome: MockTransfer) {
        self.script
            .lock()
            .expect("mock script mutex poisoned")
            .push_back(outcome);
    }

    pub fn serving(bytes: impl Into<Vec<u8>>) -> Self {
        let mock = Self::new();
        mock.push(MockTransfer::Serve(bytes.into()));
        mock
    }

    /// Destinations passed to `fetch`, in call order.
    pub fn calls(&self) -> Vec<(Url, PathBuf)> {
        self.calls.lock().expect("mock calls mutex poisoned").clone()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &Url, dest: &Path, cancel: CancellationToken) -> FetchResult<u64> {
        self.calls
            .lock()
            .expect("mock calls mutex poisoned")
            .push((url.clone(), dest.to_path_buf()));

        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let outcome = self
            .script
            .lock()
            .expect("mock script mutex poisoned")
            .pop_front();

        match outcome {
            Some(MockTransfer::Serve(bytes)) => {
                tokio::fs::write(dest, &bytes).await?;
                Ok(bytes.len() as u64)
            }
            Some(MockTransfer::Fail(message)) => Err(FetchError::Http(message)),
            Some(MockTransfer::FailStatus(status)) => Err(FetchError::HttpStatus {
                status,
                url: url.clone(),
            }),
            None => Err(FetchError::Http("mock script exhausted".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn plays_back_in_order_and_records_calls() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("img");
        let url = Url::parse("https://example.com/img").unwrap();

        let mock = MockFetcher::new();
        mock.push(MockTransfer::Fail("boom".into()));
        mock.push(MockTransfer::Serve(b"payload".to_vec()));

        let err = mock
            .fetch(&url, &dest, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Http(_)));

        let written = mock
            .fetch(&url, &dest, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(written, 7);
        assert_eq!(std::fs::read(&dest).unwrap(), b"payload");
        assert_eq!(mock.calls().len(), 2);
    }
}
