#![forbid(unsafe_code)]

use std::str::FromStr;

use crate::error::WatchError;

/// Watcher operation classification.
///
/// `Modified` covers both creation and modification; the adapter
/// decides which by the presence of a status file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchOp {
    Modified,
    Deleted,
}

/// One change notification: `"M <file>"` or `"D <file>"`, where
/// `<file>` is the basename of a `<SafeName>.json` entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchEvent {
    pub op: WatchOp,
    pub file_name: String,
}

impl WatchEvent {
    pub fn modified(file_name: impl Into<String>) -> Self {
        Self {
            op: WatchOp::Modified,
            file_name: file_name.into(),
        }
    }

    pub fn deleted(file_name: impl Into<String>) -> Self {
        Self {
            op: WatchOp::Deleted,
            file_name: file_name.into(),
        }
    }
}

impl FromStr for WatchEvent {
    type Err = WatchError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let (op, file_name) = line
            .split_once(' ')
            .ok_or_else(|| WatchError::BadEvent(line.to_string()))?;
        if file_name.is_empty() {
            return Err(WatchError::BadEvent(line.to_string()));
        }
        let op = match op {
            "M" => WatchOp::Modified,
            "D" => WatchOp::Deleted,
            other => return Err(WatchError::UnknownOp(other.to_string())),
        };
        Ok(Self {
            op,
            file_name: file_name.to_string(),
        })
    }
}
