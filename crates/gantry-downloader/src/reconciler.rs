#![forbid(unsafe_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use gantry_catalog::{kib_ceil, Catalog, CatalogError, SpaceLedger};
use gantry_fetch::Fetcher;
use gantry_state::{
    read_json, DownloadConfig, DownloadState, DownloadStatus, GlobalConfig, StateDir,
};
use gantry_watch::Reconciler;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{DownloaderError, DownloaderResult};

/// Drives `DownloadConfig` artifacts through the download state
/// machine and owns the global space ledger.
pub struct DownloadReconciler {
    catalog: Catalog,
    ledger: SpaceLedger,
    status_dir: StateDir<DownloadStatus>,
    fetcher: Arc<dyn Fetcher>,
    cancel: CancellationToken,
}

impl DownloadReconciler {
    /// Startup sequence: load the space budget from
    /// `<config>/global.json`, discard uncommitted catalogue contents,
    /// recompute used space from what survived, publish the first
    /// ledger snapshot. Fatal on a missing budget or catalogue root.
    pub async fn init(
        catalog: Catalog,
        config_dir: &StateDir<DownloadConfig>,
        status_dir: StateDir<DownloadStatus>,
        fetcher: Arc<dyn Fetcher>,
        cancel: CancellationToken,
    ) -> DownloaderResult<Self> {
        let global_path = config_dir.path_for_file("global.json");
        let global: GlobalConfig = read_json(&global_path)
            .await?
            .ok_or_else(|| DownloaderError::MissingGlobalConfig(global_path.clone()))?;
        info!(max_space = global.max_space, "loaded space budget");

        catalog.bootstrap()?;
        status_dir.ensure().await?;

        let mut ledger = SpaceLedger::new(global, status_dir.path_for_file("global.json"));
        let used = catalog.disk_usage_kib()?;
        ledger.set_used(used).await?;

        Ok(Self {
            catalog,
            ledger,
            status_dir,
            fetcher,
            cancel,
        })
    }

    pub fn ledger(&self) -> &SpaceLedger {
        &self.ledger
    }

    async fn store(&self, status: &DownloadStatus) -> DownloaderResult<()> {
        self.status_dir.store(&status.safe_name, status).await?;
        Ok(())
    }

    /// The fetch itself: `DownloadStarted`, transfer into
    /// `pending/<sha>/<name>`, size check, reservation conversion.
    /// Artifact failures are recorded in `status` and return `Ok`.
    async fn do_create(
        &mut self,
        config: &DownloadConfig,
        status: &mut DownloadStatus,
    ) -> DownloaderResult<()> {
        status.state = DownloadState::DownloadStarted;
        self.store(status).await?;

        self.catalog.ensure_pending_dir(&config.image_sha256)?;
        let dest = self
            .catalog
            .pending_file(&config.image_sha256, &config.safe_name);
        debug!(url = %config.download_url, dest = %dest.display(), "downloading");

        if let Err(err) = self
            .fetcher
            .fetch(&config.download_url, &dest, self.cancel.child_token())
            .await
        {
            self.do_delete(status).await?;
            status.pending_add = false;
            status.record_error(err.to_string());
            self.store(status).await?;
            warn!(name = %config.safe_name, url = %config.download_url, %err, "download failed");
            return Ok(());
        }

        let meta = match fs::metadata(&dest).await {
            Ok(meta) => meta,
            Err(err) => {
                self.do_delete(status).await?;
                status.pending_add = false;
                status.record_error(err.to_string());
                self.store(status).await?;
                warn!(name = %config.safe_name, %err, "cannot stat downloaded file");
                return Ok(());
            }
        };
        status.size = kib_ceil(meta.len());

        if status.size > config.max_size {
            let message = format!(
                "size exceeds MaxSize; {} vs. {} for {}",
                status.size, config.max_size, config.download_url
            );
            self.do_delete(status).await?;
            status.pending_add = false;
            status.record_error(message);
            self.store(status).await?;
            warn!(name = %config.safe_name, "downloaded file over budget, discarded");
            return Ok(());
        }

        self.ledger
            .commit_used(status.reserved_space, status.size)
            .await?;
        status.reserved_space = 0;

        // RetryCount and LastErr are deliberately left in place;
        // consumers key on State == Downloaded.
        status.mod_time = Some(Utc::now());
        status.pending_add = false;
        status.state = DownloadState::Downloaded;
        self.store(status).await?;
        info!(name = %config.safe_name, size = status.size, "download complete");
        Ok(())
    }

    /// Remove the staged file and give its used space back. The
    /// reservation is untouched: it is released only on full delete,
    /// so a released artifact can come back without racing admission.
    async fn do_delete(&mut self, status: &mut DownloadStatus) -> DownloaderResult<()> {
        let staged = self
            .catalog
            .pending_file(&status.image_sha256, &status.safe_name);
        match fs::remove_file(&staged).await {
            Ok(()) => debug!(path = %staged.display(), "removed staged file"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!(path = %staged.display(), %err, "failed to remove staged file"),
        }

        status.state = DownloadState::Initial;
        self.ledger.release_used(status.size).await?;
        status.size = 0;
        self.store(status).await?;
        Ok(())
    }
}

#[async_trait]
impl Reconciler for DownloadReconciler {
    type Config = DownloadConfig;
    type Status = DownloadStatus;
    type Error = DownloaderError;

    async fn handle_create(&mut self, config: DownloadConfig) -> DownloaderResult<()> {
        info!(name = %config.safe_name, url = %config.download_url, "create");

        let mut status = DownloadStatus::initial(&config);
        status.pending_add = true;
        self.store(&status).await?;

        // The ledger is the only admission check in the system.
        match self.ledger.reserve(config.max_size).await {
            Ok(()) => {}
            Err(err @ CatalogError::NoSpace { .. }) => {
                status.pending_add = false;
                status.record_error(err.to_string());
                self.store(&status).await?;
                warn!(name = %config.safe_name, %err, "admission denied");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        }
        status.reserved_space = config.max_size;

        // RefCount == 0: hold the reservation, do not fetch yet. The
        // error surface here is historical but load-bearing: the
        // non-empty LastErr is what later triggers the retry path.
        if config.ref_count == 0 {
            status.pending_add = false;
            status.record_error(format!(
                "RefCount==0; download deferred for {}",
                config.download_url
            ));
            self.store(&status).await?;
            info!(name = %config.safe_name, "download deferred");
            return Ok(());
        }

        self.do_create(&config, &mut status).await
    }

    async fn handle_modify(
        &mut self,
        config: DownloadConfig,
        mut status: DownloadStatus,
    ) -> DownloaderResult<()> {
        info!(name = %config.safe_name, url = %config.download_url, "modify");

        // An artifact's identity includes its URL.
        if config.download_url != status.download_url {
            warn!(
                name = %config.safe_name,
                from = %status.download_url,
                to = %config.download_url,
                "URL changed - not allowed"
            );
            return Ok(());
        }

        status.pending_modify = true;
        self.store(&status).await?;

        // A digest change invalidates the staged file; a non-empty
        // LastErr is the retry trigger. Both restart the artifact.
        if status.image_sha256 != config.image_sha256 || !status.last_err.is_empty() {
            let reason = if status.image_sha256 != config.image_sha256 {
                "sha256 changed"
            } else {
                "recovering from previous error"
            };
            info!(name = %config.safe_name, reason, "restarting artifact");

            self.do_delete(&mut status).await?;
            if status.reserved_space > 0 {
                // Space is already held; reuse it instead of racing
                // admission again. PendingAdd marks the in-flight
                // create so a crash here is re-dispatched on restart.
                let mut fresh = DownloadStatus::initial(&config);
                fresh.reserved_space = status.reserved_space;
                fresh.pending_add = true;
                self.store(&fresh).await?;
                if config.ref_count == 0 {
                    fresh.pending_add = false;
                    fresh.record_error(format!(
                        "RefCount==0; download deferred for {}",
                        config.download_url
                    ));
                    self.store(&fresh).await?;
                    return Ok(());
                }
                return self.do_create(&config, &mut fresh).await;
            }
            // Never admitted (for example an earlier NoSpace): go
            // through full admission again.
            return self.handle_create(config).await;
        }

        if status.ref_count == 0 && config.ref_count != 0 {
            // Perform the fetch that was deferred at create time.
            info!(name = %config.safe_name, "installing");
            self.do_create(&config, &mut status).await?;
            status.ref_count = config.ref_count;
            status.pending_modify = false;
            self.store(&status).await?;
        } else if status.ref_count != 0 && config.ref_count == 0 {
            info!(name = %config.safe_name, "released");
            self.do_delete(&mut status).await?;
            status.ref_count = 0;
            status.pending_modify = false;
            self.store(&status).await?;
        } else {
            status.ref_count = config.ref_count;
            status.pending_modify = false;
            self.store(&status).await?;
        }
        Ok(())
    }

    async fn handle_delete(&mut self, mut status: DownloadStatus) -> DownloaderResult<()> {
        info!(name = %status.safe_name, url = %status.download_url, "delete");

        status.pending_delete = true;
        self.store(&status).await?;

        self.ledger.release_reserved(status.reserved_space).await?;
        status.reserved_space = 0;
        self.ledger.release_used(status.size).await?;
        status.size = 0;
        self.store(&status).await?;

        self.do_delete(&mut status).await?;

        status.pending_delete = false;
        self.store(&status).await?;
        self.status_dir.remove(&status.safe_name).await?;
        info!(name = %status.safe_name, "delete done");
        Ok(())
    }
}
