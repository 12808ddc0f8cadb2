#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use gantry_catalog::Catalog;
use gantry_state::{
    DownloadConfig, DownloadStatus, StateDir, VerifyConfig, VerifyStatus,
};

/// Directory layout of one pipeline instance.
///
/// All bases are independently configurable; [`PipelineDirs::under`]
/// gives the conventional arrangement beneath a single base directory:
///
/// ```text
/// <base>/downloads              the shared catalogue
/// <base>/downloader/config      DownloadConfig records + global.json
/// <base>/downloader/status      DownloadStatus records + global.json
/// <base>/verifier/config        VerifyConfig records
/// <base>/verifier/status        VerifyStatus records
/// ```
#[derive(Clone, Debug)]
pub struct PipelineDirs {
    pub catalog_root: PathBuf,
    pub downloader_config: PathBuf,
    pub downloader_status: PathBuf,
    pub verifier_config: PathBuf,
    pub verifier_status: PathBuf,
}

impl PipelineDirs {
    pub fn under(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            catalog_root: base.join("downloads"),
            downloader_config: base.join("downloader").join("config"),
            downloader_status: base.join("downloader").join("status"),
            verifier_config: base.join("verifier").join("config"),
            verifier_status: base.join("verifier").join("status"),
        }
    }

    pub fn catalog(&self) -> Catalog {
        Catalog::new(&self.catalog_root)
    }

    pub fn downloader_config_dir(&self) -> StateDir<DownloadConfig> {
        StateDir::new(&self.downloader_config)
    }

    pub fn downloader_status_dir(&self) -> StateDir<DownloadStatus> {
        StateDir::new(&self.downloader_status)
    }

    pub fn verifier_config_dir(&self) -> StateDir<VerifyConfig> {
        StateDir::new(&self.verifier_config)
    }

    pub fn verifier_status_dir(&self) -> StateDir<VerifyStatus> {
        StateDir::new(&self.verifier_status)
    }
}
