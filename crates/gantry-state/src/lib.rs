#![forbid(unsafe_code)]

//! # gantry-state
//!
//! Desired-state and observed-state records for the acquisition
//! pipeline, plus the on-disk store that holds them.
//!
//! ## Public contract
//!
//! Each artifact is one `<SafeName>.json` file in a config directory
//! (desired state, written by producers) and one in a status directory
//! (observed state, written by the owning reconciler). The file is the
//! truth; no in-process cache is authoritative.
//!
//! ## Wire format (normative)
//!
//! UTF-8 JSON objects with PascalCase field names. Unknown fields are
//! ignored on read; absent non-identity fields default to zero/empty.

mod digest;
mod download;
mod error;
mod global;
mod name;
mod record;
mod store;
mod verify;

pub use digest::ImageSha256;
pub use download::{DownloadConfig, DownloadState, DownloadStatus};
pub use error::{StateError, StateResult};
pub use global::{GlobalConfig, GlobalStatus};
pub use name::SafeName;
pub use record::{Pending, Record, StatusRecord};
pub use store::{read_json, write_json, StateDir};
pub use verify::{VerifyConfig, VerifyStatus};
