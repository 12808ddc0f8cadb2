#![forbid(unsafe_code)]

//! # gantry-downloader
//!
//! The first stage of the acquisition pipeline: moves bytes from a URL
//! into the catalogue's `pending/` scratch area, under a global space
//! budget.
//!
//! One [`DownloadReconciler`] consumes the change stream for
//! `DownloadConfig` files and drives each artifact through
//! `Initial -> DownloadStarted -> Downloaded`. It owns the
//! [`SpaceLedger`](gantry_catalog::SpaceLedger): every admission is a
//! reservation, converted to used space on success and released on
//! deletion. Failures never escape a handler as anything but status
//! fields (`LastErr`, `LastErrTime`, `RetryCount`).
//!
//! Startup wipes `pending/` and `verifier/` (nothing there is
//! committed), preserves `verified/`, and recomputes used space from
//! the surviving tree.

mod error;
mod reconciler;

pub use error::{DownloaderError, DownloaderResult};
pub use reconciler::DownloadReconciler;
