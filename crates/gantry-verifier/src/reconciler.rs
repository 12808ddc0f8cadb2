#![forbid(unsafe_code)]

use std::path::Path;

use async_trait::async_trait;
use gantry_catalog::{restrict_dir, restrict_file, unrestrict_dir, Catalog, CatalogResult};
use gantry_state::{DownloadState, StateDir, VerifyConfig, VerifyStatus};
use gantry_watch::Reconciler;
use sha2::{Digest, Sha256};
use tokio::{fs, io::AsyncReadExt};
use tracing::{debug, info, warn};

use crate::error::VerifierResult;

/// Drives `VerifyConfig` artifacts from `Downloaded` to `Delivered`.
pub struct VerifyReconciler {
    catalog: Catalog,
    status_dir: StateDir<VerifyStatus>,
}

impl VerifyReconciler {
    /// The downloader owns the startup wipe; the verifier only makes
    /// sure the subtrees it owns exist.
    pub async fn init(
        catalog: Catalog,
        status_dir: StateDir<VerifyStatus>,
    ) -> VerifierResult<Self> {
        catalog.ensure_subtrees()?;
        status_dir.ensure().await?;
        Ok(Self {
            catalog,
            status_dir,
        })
    }

    async fn store(&self, status: &VerifyStatus) -> VerifierResult<()> {
        self.status_dir.store(&status.safe_name, status).await?;
        Ok(())
    }

    /// Record an artifact failure and finish the handler normally:
    /// the error belongs to the status file, not the event loop.
    async fn fail(
        &self,
        status: &mut VerifyStatus,
        message: String,
    ) -> VerifierResult<()> {
        warn!(name = %status.safe_name, error = %message, "verification failed");
        status.pending_add = false;
        status.record_error(message);
        self.store(status).await
    }
}

/// Terminal rename. Both directories need their write bit back for
/// the move itself; the destination is restricted again afterwards.
/// The emptied staging directory is left relaxed for the startup wipe.
fn commit(
    stage_dir: &Path,
    staged: &Path,
    verified_dir: &Path,
    verified: &Path,
) -> CatalogResult<()> {
    unrestrict_dir(verified_dir)?;
    unrestrict_dir(stage_dir)?;
    std::fs::rename(staged, verified)?;
    restrict_dir(verified_dir)?;
    Ok(())
}

/// Stream a file through SHA-256 and return the lowercase hex digest.
async fn digest_file(path: &Path) -> std::io::Result<String> {
    let mut file = fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[async_trait]
impl Reconciler for VerifyReconciler {
    type Config = VerifyConfig;
    type Status = VerifyStatus;
    type Error = crate::VerifierError;

    async fn handle_create(&mut self, config: VerifyConfig) -> VerifierResult<()> {
        info!(name = %config.safe_name, url = %config.download_url, "verify");

        let mut status = VerifyStatus::started(&config);
        self.store(&status).await?;

        let pending = self
            .catalog
            .pending_file(&config.image_sha256, &config.safe_name);
        let stage_dir = self.catalog.ensure_staging_dir(&config.image_sha256)?;
        // An earlier artifact under the same sha leaves the directory
        // read-only; open it up for the rename.
        unrestrict_dir(&stage_dir)?;
        let staged = self
            .catalog
            .staging_file(&config.image_sha256, &config.safe_name);

        debug!(from = %pending.display(), to = %staged.display(), "staging");
        if let Err(err) = fs::rename(&pending, &staged).await {
            // Most commonly the producer published the verify config
            // before the download finished; surfaced as a retryable
            // artifact error, not a crash.
            return self
                .fail(
                    &mut status,
                    format!(
                        "stage {} -> {}: {err}",
                        pending.display(),
                        staged.display()
                    ),
                )
                .await;
        }

        // Owner-only read between digest computation and commit.
        if let Err(err) = restrict_file(&staged).and_then(|()| restrict_dir(&stage_dir)) {
            return self.fail(&mut status, format!("restrict staging: {err}")).await;
        }

        let got = match digest_file(&staged).await {
            Ok(got) => got,
            Err(err) => {
                return self
                    .fail(&mut status, format!("digest {}: {err}", staged.display()))
                    .await;
            }
        };
        if got != config.image_sha256.as_str() {
            // The file stays in staging; the next downloader startup
            // discards it.
            return self
                .fail(
                    &mut status,
                    format!("got {got} expected {}", config.image_sha256),
                )
                .await;
        }

        let verified_dir = self.catalog.ensure_verified_dir(&config.image_sha256)?;
        let verified = self
            .catalog
            .verified_file(&config.image_sha256, &config.safe_name);
        debug!(from = %staged.display(), to = %verified.display(), "committing");
        if let Err(err) = commit(&stage_dir, &staged, &verified_dir, &verified) {
            return self.fail(&mut status, format!("commit: {err}")).await;
        }

        status.pending_add = false;
        status.state = DownloadState::Delivered;
        self.store(&status).await?;
        info!(name = %config.safe_name, sha = %config.image_sha256, "delivered");
        Ok(())
    }

    async fn handle_modify(
        &mut self,
        config: VerifyConfig,
        mut status: VerifyStatus,
    ) -> VerifierResult<()> {
        // Identical identity is a no-op; anything else restarts the
        // artifact from the staged bytes.
        if config.same_identity(&status) {
            info!(name = %config.safe_name, "modify: no change");
            return Ok(());
        }

        status.pending_modify = true;
        self.store(&status).await?;
        self.handle_delete(status).await?;
        self.handle_create(config).await
    }

    async fn handle_delete(&mut self, status: VerifyStatus) -> VerifierResult<()> {
        info!(name = %status.safe_name, url = %status.download_url, "delete");
        // The terminal verified/<sha>/<name> file is deliberately left
        // behind; other consumers may share it.
        self.status_dir.remove(&status.safe_name).await?;
        Ok(())
    }
}
