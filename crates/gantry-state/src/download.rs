#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    digest::ImageSha256,
    name::SafeName,
    record::{fold_pending, Pending, Record, StatusRecord},
};

/// Acquisition progress of one artifact.
///
/// The downloader drives `Initial -> DownloadStarted -> Downloaded`;
/// the verifier picks up at `Downloaded` and ends at `Delivered`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadState {
    #[default]
    Initial,
    DownloadStarted,
    Downloaded,
    Delivered,
}

/// Desired state for the downloader, one file per artifact.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    #[serde(rename = "SafeName")]
    pub safe_name: SafeName,
    #[serde(rename = "DownloadURL")]
    pub download_url: Url,
    #[serde(rename = "ImageSha256")]
    pub image_sha256: ImageSha256,
    /// Upper bound on the fetched size, in KiB.
    #[serde(rename = "MaxSize", default)]
    pub max_size: u64,
    /// Zero means "do not fetch / release".
    #[serde(rename = "RefCount", default)]
    pub ref_count: u32,
}

/// Observed state the downloader maintains for one artifact.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadStatus {
    #[serde(rename = "SafeName")]
    pub safe_name: SafeName,
    #[serde(rename = "DownloadURL")]
    pub download_url: Url,
    #[serde(rename = "ImageSha256")]
    pub image_sha256: ImageSha256,
    #[serde(rename = "RefCount", default)]
    pub ref_count: u32,
    #[serde(rename = "State", default)]
    pub state: DownloadState,
    /// Actual fetched size in KiB, rounded up per file.
    #[serde(rename = "Size", default)]
    pub size: u64,
    /// Space debited against the global budget at admission, in KiB.
    /// Converted to used space on success, released on full delete.
    #[serde(rename = "ReservedSpace", default)]
    pub reserved_space: u64,
    #[serde(rename = "ModTime", default, skip_serializing_if = "Option::is_none")]
    pub mod_time: Option<DateTime<Utc>>,
    #[serde(rename = "LastErr", default)]
    pub last_err: String,
    #[serde(
        rename = "LastErrTime",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub last_err_time: Option<DateTime<Utc>>,
    #[serde(rename = "RetryCount", default)]
    pub retry_count: u32,
    #[serde(rename = "PendingAdd", default)]
    pub pending_add: bool,
    #[serde(rename = "PendingModify", default)]
    pub pending_modify: bool,
    #[serde(rename = "PendingDelete", default)]
    pub pending_delete: bool,
}

impl DownloadStatus {
    /// Fresh status for a just-seen config, before admission.
    pub fn initial(config: &DownloadConfig) -> Self {
        Self {
            safe_name: config.safe_name.clone(),
            download_url: config.download_url.clone(),
            image_sha256: config.image_sha256.clone(),
            ref_count: config.ref_count,
            state: DownloadState::Initial,
            size: 0,
            reserved_space: 0,
            mod_time: None,
            last_err: String::new(),
            last_err_time: None,
            retry_count: 0,
            pending_add: false,
            pending_modify: false,
            pending_delete: false,
        }
    }

    /// Record a failure the way every downloader error path does:
    /// message, timestamp, bumped retry counter, back to `Initial`.
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.last_err = message.into();
        self.last_err_time = Some(Utc::now());
        self.retry_count += 1;
        self.size = 0;
        self.state = DownloadState::Initial;
    }
}

impl Record for DownloadConfig {
    fn safe_name(&self) -> &SafeName {
        &self.safe_name
    }
}

impl Record for DownloadStatus {
    fn safe_name(&self) -> &SafeName {
        &self.safe_name
    }
}

impl StatusRecord for DownloadStatus {
    fn pending(&self) -> Pending {
        fold_pending(self.pending_add, self.pending_modify, self.pending_delete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHA: &str = "a665a45920422f9d417e4867efdc4fb8a04a1f3fff1fa07e998e86f7f7a27ae3";

    fn config() -> DownloadConfig {
        DownloadConfig {
            safe_name: SafeName::new("img-1").unwrap(),
            download_url: Url::parse("https://example.com/img-1").unwrap(),
            image_sha256: ImageSha256::new(SHA).unwrap(),
            max_size: 2048,
            ref_count: 1,
        }
    }

    #[test]
    fn wire_names_are_pascal_case() {
        let status = DownloadStatus::initial(&config());
        let value = serde_json::to_value(&status).unwrap();
        for key in [
            "SafeName",
            "DownloadURL",
            "ImageSha256",
            "RefCount",
            "State",
            "Size",
            "ReservedSpace",
            "LastErr",
            "RetryCount",
            "PendingAdd",
            "PendingModify",
            "PendingDelete",
        ] {
            assert!(value.get(key).is_some(), "missing wire field {key}");
        }
    }

    #[test]
    fn unknown_fields_ignored_and_absent_fields_defaulted() {
        let json = format!(
            r#"{{"SafeName":"img-1","DownloadURL":"https://example.com/x",
                 "ImageSha256":"{SHA}","FutureField":42}}"#
        );
        let status: DownloadStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(status.state, DownloadState::Initial);
        assert_eq!(status.size, 0);
        assert_eq!(status.last_err, "");
        assert!(!status.pending_add);
    }

    #[test]
    fn record_error_resets_and_counts() {
        let mut status = DownloadStatus::initial(&config());
        status.state = DownloadState::DownloadStarted;
        status.size = 10;
        status.record_error("boom");
        assert_eq!(status.state, DownloadState::Initial);
        assert_eq!(status.size, 0);
        assert_eq!(status.retry_count, 1);
        assert_eq!(status.last_err, "boom");
        assert!(status.last_err_time.is_some());
    }

    #[test]
    fn state_serializes_as_string() {
        let json = serde_json::to_string(&DownloadState::DownloadStarted).unwrap();
        assert_eq!(json, "\"DownloadStarted\"");
    }
}
