#![forbid(unsafe_code)]

//! # gantry-catalog
//!
//! The shared on-disk catalogue and its space accounting.
//!
//! The catalogue is a three-subdirectory tree under one root:
//!
//! ```text
//! <root>/pending/<sha>/<safename>    downloader scratch
//! <root>/verifier/<sha>/<safename>   verifier staging (read-only)
//! <root>/verified/<sha>/<safename>   verifier terminal (read-only dir)
//! ```
//!
//! [`SpaceLedger`] is the single arbiter of admission: every KiB that
//! enters the tree is either reserved or used, and
//! `remaining = max − used − reserved` holds after every mutation.
//! The ledger snapshot is persisted atomically on each change.

mod error;
mod layout;
mod ledger;
mod perms;

pub use error::{CatalogError, CatalogResult};
pub use layout::{kib_ceil, Catalog};
pub use ledger::SpaceLedger;
pub use perms::{restrict_dir, restrict_file, unrestrict_dir};
