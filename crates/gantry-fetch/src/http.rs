#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use tokio::{fs, io::AsyncWriteExt, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::{
    error::{FetchError, FetchResult},
    options::FetchOptions,
    traits::Fetcher,
};

/// In-process HTTP(S) fetcher.
///
/// Streams the response body to `<dest>.part`, then renames into
/// place, so `dest` either holds the complete body or does not exist.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    inner: Client,
    options: FetchOptions,
}

impl HttpFetcher {
    pub fn new(options: FetchOptions) -> FetchResult<Self> {
        let mut builder = Client::builder()
            .connect_timeout(options.connect_timeout)
            .danger_accept_invalid_certs(options.accept_invalid_certs);
        if options.ipv4_only {
            builder = builder.local_address(std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED));
        }
        let inner = builder.build()?;
        Ok(Self { inner, options })
    }

    fn part_path(dest: &Path) -> PathBuf {
        let mut name = dest.file_name().unwrap_or_default().to_os_string();
        name.push(".part");
        dest.with_file_name(name)
    }

    async fn attempt(
        &self,
        url: &Url,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> FetchResult<u64> {
        let mut req = self.inner.get(url.clone());
        if let Some(timeout) = self.options.request_timeout {
            req = req.timeout(timeout);
        }

        let resp = req.send().await.map_err(FetchError::from)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: url.clone(),
            });
        }

        let part = Self::part_path(dest);
        let mut file = fs::File::create(&part).await?;
        let mut stream = resp.bytes_stream();
        let mut written = 0u64;

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Err(FetchError::Cancelled);
                }
                chunk = stream.next() => match chunk {
                    Some(Ok(bytes)) => {
                        file.write_all(&bytes).await?;
                        written += bytes.len() as u64;
                    }
                    Some(Err(err)) => return Err(err.into()),
                    None => break,
                }
            }
        }

        file.flush().await?;
        drop(file);
        fs::rename(&part, dest).await?;
        Ok(written)
    }

    /// Remove the scratch `.part` and any destination left behind by a
    /// failed attempt. The contract is that `dest` does not exist on
    /// error.
    async fn discard_partial(dest: &Path) {
        for path in [Self::part_path(dest), dest.to_path_buf()] {
            if let Err(err) = fs::remove_file(&path).await {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), %err, "failed to discard partial transfer");
                }
            }
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, dest: &Path, cancel: CancellationToken) -> FetchResult<u64> {
        let mut attempt = 0;
        loop {
            match self.attempt(url, dest, &cancel).await {
                Ok(written) => {
                    debug!(url = %url, dest = %dest.display(), written, "transfer complete");
                    return Ok(written);
                }
                Err(error) => {
                    Self::discard_partial(dest).await;
                    if !error.is_retryable() {
                        return Err(error);
                    }
                    if attempt == self.options.max_retries {
                        return Err(FetchError::RetryExhausted {
                            max_retries: self.options.max_retries,
                            source: Box::new(error),
                        });
                    }
                    attempt += 1;
                    debug!(url = %url, attempt, %error, "transient transfer failure, will retry");
                    sleep(self.options.delay_for_attempt(attempt)).await;
                }
            }
        }
    }
}
