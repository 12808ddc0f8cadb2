#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

/// Global space budget for the whole catalogue, in KiB.
///
/// Read once at startup from `<config>/global.json`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(rename = "MaxSpace")]
    pub max_space: u64,
}

/// Published space accounting, written to `<status>/global.json` on
/// every ledger mutation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalStatus {
    #[serde(rename = "UsedSpace", default)]
    pub used_space: u64,
    #[serde(rename = "ReservedSpace", default)]
    pub reserved_space: u64,
    #[serde(rename = "RemainingSpace", default)]
    pub remaining_space: u64,
}
