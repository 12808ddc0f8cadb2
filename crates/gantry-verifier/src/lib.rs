#![forbid(unsafe_code)]

//! # gantry-verifier
//!
//! The second stage of the acquisition pipeline: promotes downloaded
//! artifacts from `pending/` through an immutable staging area into
//! the terminal `verified/` directory.
//!
//! Promotion is three steps, each crash-safe: an atomic rename into
//! `verifier/<sha>/` (then made read-only), a streamed SHA-256 of the
//! staged file, and on a digest match a second rename into
//! `verified/<sha>/`. A mismatch strands the file in staging, where
//! the next downloader startup discards it.
//!
//! The verifier owns `verifier/` and `verified/` and never touches
//! the space ledger; the downloader accounts for every byte here.

mod error;
mod reconciler;

pub use error::{VerifierError, VerifierResult};
pub use reconciler::VerifyReconciler;
