#![forbid(unsafe_code)]

use std::path::PathBuf;

use gantry_state::{write_json, GlobalConfig, GlobalStatus};
use tracing::debug;

use crate::error::{CatalogError, CatalogResult};

/// The global reservation/usage ledger, in KiB.
///
/// Owned by the downloader; the verifier reads the filesystem but
/// never touches reservations. Every mutation recomputes
/// `remaining = max − used − reserved` and persists the snapshot to
/// the status path atomically, so external consumers always see a
/// consistent `global.json`.
///
/// Decrements saturate at zero: rounding slack must never underflow
/// the counters, and saturation here is a correctness-preserving
/// tolerance rather than a hidden error.
pub struct SpaceLedger {
    max_space: u64,
    used: u64,
    reserved: u64,
    status_path: PathBuf,
}

impl SpaceLedger {
    pub fn new(config: GlobalConfig, status_path: impl Into<PathBuf>) -> Self {
        Self {
            max_space: config.max_space,
            used: 0,
            reserved: 0,
            status_path: status_path.into(),
        }
    }

    pub fn max_space(&self) -> u64 {
        self.max_space
    }

    pub fn remaining(&self) -> u64 {
        self.max_space.saturating_sub(self.used).saturating_sub(self.reserved)
    }

    pub fn snapshot(&self) -> GlobalStatus {
        GlobalStatus {
            used_space: self.used,
            reserved_space: self.reserved,
            remaining_space: self.remaining(),
        }
    }

    /// Admit `kib` of reserved space.
    ///
    /// Fails when `kib >= remaining`: a request exactly equal to the
    /// remaining budget is rejected, keeping a one-KiB margin. This is
    /// the only admission test in the system; callers never pre-check.
    pub async fn reserve(&mut self, kib: u64) -> CatalogResult<()> {
        let remaining = self.remaining();
        if kib >= remaining {
            return Err(CatalogError::NoSpace {
                requested: kib,
                remaining,
            });
        }
        self.reserved += kib;
        self.publish().await
    }

    /// Convert a reservation into used space after a successful fetch.
    pub async fn commit_used(&mut self, reservation_kib: u64, actual_kib: u64) -> CatalogResult<()> {
        self.reserved = self.reserved.saturating_sub(reservation_kib);
        self.used += actual_kib;
        self.publish().await
    }

    pub async fn release_reserved(&mut self, kib: u64) -> CatalogResult<()> {
        self.reserved = self.reserved.saturating_sub(kib);
        self.publish().await
    }

    pub async fn release_used(&mut self, kib: u64) -> CatalogResult<()> {
        self.used = self.used.saturating_sub(kib);
        self.publish().await
    }

    /// Startup recompute: replace `used` with what the disk walk found.
    pub async fn set_used(&mut self, kib: u64) -> CatalogResult<()> {
        self.used = kib;
        self.publish().await
    }

    async fn publish(&self) -> CatalogResult<()> {
        debug!(
            remaining = self.remaining(),
            max = self.max_space,
            used = self.used,
            reserved = self.reserved,
            "space ledger updated"
        );
        write_json(&self.status_path, &self.snapshot()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn ledger(max_space: u64, dir: &std::path::Path) -> SpaceLedger {
        SpaceLedger::new(GlobalConfig { max_space }, dir.join("global.json"))
    }

    async fn read_snapshot(dir: &std::path::Path) -> GlobalStatus {
        gantry_state::read_json(&dir.join("global.json"))
            .await
            .unwrap()
            .expect("ledger snapshot must exist after a mutation")
    }

    #[tokio::test]
    async fn reserve_then_commit_keeps_the_books_balanced() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = ledger(1_048_576, dir.path());

        ledger.reserve(2048).await.unwrap();
        assert_eq!(ledger.remaining(), 1_048_576 - 2048);

        ledger.commit_used(2048, 1465).await.unwrap();
        let snap = ledger.snapshot();
        assert_eq!(snap.reserved_space, 0);
        assert_eq!(snap.used_space, 1465);
        assert_eq!(
            snap.remaining_space + snap.used_space + snap.reserved_space,
            1_048_576
        );

        // Disk and memory agree.
        assert_eq!(read_snapshot(dir.path()).await, snap);
    }

    #[rstest]
    #[case::exactly_remaining(1024, 1024)]
    #[case::over_remaining(1024, 2048)]
    #[tokio::test]
    async fn reserve_rejects_at_or_above_remaining(#[case] max: u64, #[case] request: u64) {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = ledger(max, dir.path());

        let err = ledger.reserve(request).await.unwrap_err();
        match err {
            CatalogError::NoSpace { requested, remaining } => {
                assert_eq!(requested, request);
                assert_eq!(remaining, max);
            }
            other => panic!("expected NoSpace, got {other}"),
        }
        // A failed admission mutates nothing.
        assert_eq!(ledger.snapshot().reserved_space, 0);
    }

    #[tokio::test]
    async fn reserve_just_under_remaining_is_admitted() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = ledger(1024, dir.path());
        ledger.reserve(1023).await.unwrap();
        assert_eq!(ledger.remaining(), 1);
    }

    #[tokio::test]
    async fn releases_saturate_at_zero() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = ledger(4096, dir.path());

        ledger.reserve(1024).await.unwrap();
        ledger.release_reserved(9999).await.unwrap();
        ledger.release_used(9999).await.unwrap();

        let snap = ledger.snapshot();
        assert_eq!(snap.reserved_space, 0);
        assert_eq!(snap.used_space, 0);
        assert_eq!(snap.remaining_space, 4096);
    }

    #[tokio::test]
    async fn round_trip_reserve_release_restores_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = ledger(8192, dir.path());
        let before = ledger.snapshot();

        ledger.reserve(2048).await.unwrap();
        ledger.release_reserved(2048).await.unwrap();

        assert_eq!(ledger.snapshot(), before);
    }

    #[tokio::test]
    async fn set_used_replaces_not_accumulates() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = ledger(8192, dir.path());

        ledger.set_used(100).await.unwrap();
        ledger.set_used(40).await.unwrap();
        assert_eq!(ledger.snapshot().used_space, 40);
    }
}
