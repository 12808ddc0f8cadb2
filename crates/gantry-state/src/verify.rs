#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    digest::ImageSha256,
    download::DownloadState,
    name::SafeName,
    record::{fold_pending, Pending, Record, StatusRecord},
};

/// Desired state for the verifier: verify and deliver one downloaded
/// artifact. Published by the producer only after the matching
/// download status reaches `Downloaded`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerifyConfig {
    #[serde(rename = "SafeName")]
    pub safe_name: SafeName,
    #[serde(rename = "DownloadURL")]
    pub download_url: Url,
    #[serde(rename = "ImageSha256")]
    pub image_sha256: ImageSha256,
}

impl VerifyConfig {
    /// True iff the identity triple matches the observed status.
    /// Anything else is handled as delete-then-create.
    pub fn same_identity(&self, status: &VerifyStatus) -> bool {
        self.safe_name == status.safe_name
            && self.download_url == status.download_url
            && self.image_sha256 == status.image_sha256
    }
}

/// Observed state the verifier maintains for one artifact.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerifyStatus {
    #[serde(rename = "SafeName")]
    pub safe_name: SafeName,
    #[serde(rename = "DownloadURL")]
    pub download_url: Url,
    #[serde(rename = "ImageSha256")]
    pub image_sha256: ImageSha256,
    #[serde(rename = "State", default)]
    pub state: DownloadState,
    #[serde(rename = "LastErr", default)]
    pub last_err: String,
    #[serde(
        rename = "LastErrTime",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub last_err_time: Option<DateTime<Utc>>,
    #[serde(rename = "PendingAdd", default)]
    pub pending_add: bool,
    #[serde(rename = "PendingModify", default)]
    pub pending_modify: bool,
    #[serde(rename = "PendingDelete", default)]
    pub pending_delete: bool,
}

impl VerifyStatus {
    /// Fresh status for a just-seen config: the artifact is expected
    /// to sit in `pending/` in state `Downloaded`.
    pub fn started(config: &VerifyConfig) -> Self {
        Self {
            safe_name: config.safe_name.clone(),
            download_url: config.download_url.clone(),
            image_sha256: config.image_sha256.clone(),
            state: DownloadState::Downloaded,
            last_err: String::new(),
            last_err_time: None,
            pending_add: true,
            pending_modify: false,
            pending_delete: false,
        }
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.last_err = message.into();
        self.last_err_time = Some(Utc::now());
        self.state = DownloadState::Initial;
    }
}

impl Record for VerifyConfig {
    fn safe_name(&self) -> &SafeName {
        &self.safe_name
    }
}

impl Record for VerifyStatus {
    fn safe_name(&self) -> &SafeName {
        &self.safe_name
    }
}

impl StatusRecord for VerifyStatus {
    fn pending(&self) -> Pending {
        fold_pending(self.pending_add, self.pending_modify, self.pending_delete)
    }
}
