#![forbid(unsafe_code)]

//! # Gantry
//!
//! Content-addressed image acquisition for an edge-device provisioning
//! agent: artifacts named by URL and claimed SHA-256 are pulled into a
//! budgeted local catalogue, integrity-checked, and committed to a
//! terminal directory for downstream consumers.
//!
//! Two independent reconcilers share one catalogue:
//!
//! ```text
//! desired(download) ──► Downloader ──► pending/<sha>/<name>
//!                                               │
//! desired(verify)   ──► Verifier   ──► verifier/<sha>/<name>
//!                                               │
//!                                      verified/<sha>/<name>
//! ```
//!
//! Each reconciler consumes a serial stream of watch events for its
//! config directory and records everything it observes in per-artifact
//! status files. See [`PipelineDirs`] for the directory layout and
//! [`spawn_downloader`] / [`spawn_verifier`] for wiring.

// ── Re-export sub-crates ────────────────────────────────────────────────

pub mod catalog {
    pub use gantry_catalog::*;
}

pub mod downloader {
    pub use gantry_downloader::*;
}

pub mod fetch {
    pub use gantry_fetch::*;
}

pub mod state {
    pub use gantry_state::*;
}

pub mod verifier {
    pub use gantry_verifier::*;
}

pub mod watch {
    pub use gantry_watch::*;
}

mod config;
mod pipeline;

pub use config::PipelineDirs;
pub use pipeline::{spawn_downloader, spawn_verifier};
