#![forbid(unsafe_code)]

use async_trait::async_trait;
use gantry_state::{Pending, Record, StateDir, StatusRecord};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::event::{WatchEvent, WatchOp};

/// The global ledger file lives beside the artifact records but is not
/// one of them.
const GLOBAL_FILE: &str = "global.json";

/// One reconciler: three entry points matching the watcher's
/// classification. Handler errors are logged by the event loop; errors
/// that belong to an artifact are recorded in its status file by the
/// handler itself.
#[async_trait]
pub trait Reconciler: Send {
    type Config: Record + Serialize + DeserializeOwned + Send + Sync;
    type Status: StatusRecord + Serialize + DeserializeOwned + Send + Sync;
    type Error: std::error::Error + Send + Sync + 'static;

    async fn handle_create(&mut self, config: Self::Config) -> Result<(), Self::Error>;

    async fn handle_modify(
        &mut self,
        config: Self::Config,
        status: Self::Status,
    ) -> Result<(), Self::Error>;

    async fn handle_delete(&mut self, status: Self::Status) -> Result<(), Self::Error>;
}

/// Pair one watch event with its config/status records and call the
/// matching handler.
///
/// Filtering (non-`.json` names, the global ledger file, parse
/// failures, basename/`SafeName` mismatches) drops the event with a
/// log line and no status change. A status carrying a pending flag is
/// an interrupted transition: the flagged operation is re-dispatched
/// instead of the classified one, which is what makes every transition
/// idempotent across crashes.
pub async fn dispatch<R: Reconciler>(
    event: &WatchEvent,
    config_dir: &StateDir<R::Config>,
    status_dir: &StateDir<R::Status>,
    reconciler: &mut R,
) -> Result<(), R::Error> {
    let file_name = event.file_name.as_str();
    if !file_name.ends_with(".json") || file_name == GLOBAL_FILE {
        debug!(file = file_name, "ignoring non-artifact file");
        return Ok(());
    }

    match event.op {
        WatchOp::Deleted => {
            let Some(status) = load_checked(status_dir, file_name, "status").await else {
                return Ok(());
            };
            reconciler.handle_delete(status).await
        }
        WatchOp::Modified => {
            let Some(config) = load_checked(config_dir, file_name, "config").await else {
                return Ok(());
            };
            let status = match status_dir.load_file(file_name).await {
                Ok(status) => status,
                Err(err) => {
                    warn!(file = file_name, %err, "unreadable status file, dropping event");
                    return Ok(());
                }
            };
            let Some(status) = status else {
                return reconciler.handle_create(config).await;
            };
            if status.safe_name().json_file_name() != file_name {
                warn!(
                    file = file_name,
                    safe_name = %status.safe_name(),
                    "status SafeName does not match its basename, dropping event"
                );
                return Ok(());
            }

            // Interrupted transition first: repeat it before looking at
            // the new desired state.
            match status.pending() {
                Pending::Add => reconciler.handle_create(config).await,
                Pending::Delete => reconciler.handle_delete(status).await,
                Pending::Modify | Pending::None => {
                    reconciler.handle_modify(config, status).await
                }
            }
        }
    }
}

async fn load_checked<T>(dir: &StateDir<T>, file_name: &str, kind: &str) -> Option<T>
where
    T: Record + Serialize + DeserializeOwned,
{
    match dir.load_file(file_name).await {
        Ok(Some(record)) => {
            if record.safe_name().json_file_name() != file_name {
                warn!(
                    file = file_name,
                    safe_name = %record.safe_name(),
                    "{kind} SafeName does not match its basename, dropping event"
                );
                return None;
            }
            Some(record)
        }
        Ok(None) => {
            // The file vanished between the event and the read.
            debug!(file = file_name, "{kind} file disappeared, dropping event");
            None
        }
        Err(err) => {
            warn!(file = file_name, %err, "unreadable {kind} file, dropping event");
            None
        }
    }
}

/// Events equivalent to the watcher's initial directory scan: `M` for
/// every existing config record, then `D` for every status record left
/// without a config (the desired state was withdrawn while the
/// reconciler was down).
pub async fn initial_scan<C, S>(
    config_dir: &StateDir<C>,
    status_dir: &StateDir<S>,
) -> Result<Vec<WatchEvent>, gantry_state::StateError>
where
    C: Serialize + DeserializeOwned,
    S: Serialize + DeserializeOwned,
{
    let configs = config_dir.scan().await?;
    let statuses = status_dir.scan().await?;

    let mut events: Vec<WatchEvent> = configs
        .iter()
        .filter(|name| name.as_str() != GLOBAL_FILE)
        .map(|name| WatchEvent::modified(name.as_str()))
        .collect();
    events.extend(
        statuses
            .iter()
            .filter(|name| name.as_str() != GLOBAL_FILE && !configs.contains(name))
            .map(|name| WatchEvent::deleted(name.as_str())),
    );
    Ok(events)
}

/// Consume the watcher channel until it closes, one handler at a time.
///
/// A handler error never stops the loop; it is logged and the next
/// event is taken. Artifact-level failures are already recorded in
/// status files by the handlers themselves.
pub async fn run_reconciler<R: Reconciler>(
    mut events: mpsc::Receiver<WatchEvent>,
    config_dir: StateDir<R::Config>,
    status_dir: StateDir<R::Status>,
    mut reconciler: R,
) {
    while let Some(event) = events.recv().await {
        if let Err(err) = dispatch(&event, &config_dir, &status_dir, &mut reconciler).await {
            error!(file = %event.file_name, %err, "change handler failed");
        }
    }
    debug!("watch channel closed, reconciler stopping");
}
