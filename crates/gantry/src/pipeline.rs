#![forbid(unsafe_code)]

use std::sync::Arc;

use gantry_downloader::{DownloadReconciler, DownloaderResult};
use gantry_fetch::Fetcher;
use gantry_verifier::{VerifierResult, VerifyReconciler};
use gantry_watch::{run_reconciler, WatchEvent};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::PipelineDirs;

/// Bound on the watcher channel; the watcher blocks when the
/// reconciler falls this far behind.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Initialize the downloader (budget load, catalogue bootstrap, used
/// space recompute) and run it on an owned task.
///
/// The returned sender is the watcher's end of the event channel; the
/// task ends when the sender is dropped.
pub async fn spawn_downloader(
    dirs: &PipelineDirs,
    fetcher: Arc<dyn Fetcher>,
    cancel: CancellationToken,
) -> DownloaderResult<(mpsc::Sender<WatchEvent>, JoinHandle<()>)> {
    let config_dir = dirs.downloader_config_dir();
    let status_dir = dirs.downloader_status_dir();
    let reconciler = DownloadReconciler::init(
        dirs.catalog(),
        &config_dir,
        status_dir.clone(),
        fetcher,
        cancel,
    )
    .await?;
    info!("downloader ready");

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let handle = tokio::spawn(run_reconciler(rx, config_dir, status_dir, reconciler));
    Ok((tx, handle))
}

/// Initialize the verifier and run it on an owned task.
pub async fn spawn_verifier(
    dirs: &PipelineDirs,
) -> VerifierResult<(mpsc::Sender<WatchEvent>, JoinHandle<()>)> {
    let config_dir = dirs.verifier_config_dir();
    let status_dir = dirs.verifier_status_dir();
    config_dir.ensure().await.map_err(gantry_verifier::VerifierError::from)?;
    let reconciler = VerifyReconciler::init(dirs.catalog(), status_dir.clone()).await?;
    info!("verifier ready");

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let handle = tokio::spawn(run_reconciler(rx, config_dir, status_dir, reconciler));
    Ok((tx, handle))
}
