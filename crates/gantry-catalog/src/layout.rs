#![forbid(unsafe_code)]

use std::{
    fs,
    path::{Path, PathBuf},
};

use gantry_state::{ImageSha256, SafeName};
use tracing::debug;

use crate::error::{CatalogError, CatalogResult};

const PENDING: &str = "pending";
const VERIFIER: &str = "verifier";
const VERIFIED: &str = "verified";

/// Round a byte count up to whole KiB.
pub fn kib_ceil(bytes: u64) -> u64 {
    bytes.div_ceil(1024)
}

/// The three-subdirectory catalogue tree shared by both reconcilers.
///
/// Path construction only; the downloader owns `pending/`, the
/// verifier owns `verifier/` and `verified/`, and neither reaches into
/// the other's subtree.
#[derive(Clone, Debug)]
pub struct Catalog {
    root: PathBuf,
}

impl Catalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn pending_dir(&self, sha: &ImageSha256) -> PathBuf {
        self.root.join(PENDING).join(sha.as_str())
    }

    pub fn pending_file(&self, sha: &ImageSha256, name: &SafeName) -> PathBuf {
        self.pending_dir(sha).join(name.as_str())
    }

    pub fn staging_dir(&self, sha: &ImageSha256) -> PathBuf {
        self.root.join(VERIFIER).join(sha.as_str())
    }

    pub fn staging_file(&self, sha: &ImageSha256, name: &SafeName) -> PathBuf {
        self.staging_dir(sha).join(name.as_str())
    }

    pub fn verified_dir(&self, sha: &ImageSha256) -> PathBuf {
        self.root.join(VERIFIED).join(sha.as_str())
    }

    pub fn verified_file(&self, sha: &ImageSha256, name: &SafeName) -> PathBuf {
        self.verified_dir(sha).join(name.as_str())
    }

    /// Create `pending/<sha>/` for a transfer about to start.
    pub fn ensure_pending_dir(&self, sha: &ImageSha256) -> CatalogResult<PathBuf> {
        let dir = self.pending_dir(sha);
        create_private_dir(&dir)?;
        Ok(dir)
    }

    /// Create `verifier/<sha>/` ahead of the staging rename.
    pub fn ensure_staging_dir(&self, sha: &ImageSha256) -> CatalogResult<PathBuf> {
        let dir = self.staging_dir(sha);
        create_private_dir(&dir)?;
        Ok(dir)
    }

    /// Create `verified/<sha>/` ahead of the terminal rename.
    pub fn ensure_verified_dir(&self, sha: &ImageSha256) -> CatalogResult<PathBuf> {
        let dir = self.verified_dir(sha);
        create_private_dir(&dir)?;
        Ok(dir)
    }

    /// Create the three subtrees if absent. The root itself must
    /// already exist: a missing root is fatal at startup, not
    /// something to paper over.
    pub fn ensure_subtrees(&self) -> CatalogResult<()> {
        if !self.root.is_dir() {
            return Err(CatalogError::RootMissing(self.root.clone()));
        }
        for sub in [PENDING, VERIFIER, VERIFIED] {
            create_private_dir(&self.root.join(sub))?;
        }
        Ok(())
    }

    /// Downloader startup: discard everything that has not been
    /// committed. `pending/` and `verifier/` are wiped and recreated;
    /// `verified/` is owned by the verifier and preserved.
    pub fn bootstrap(&self) -> CatalogResult<()> {
        if !self.root.is_dir() {
            return Err(CatalogError::RootMissing(self.root.clone()));
        }
        for sub in [PENDING, VERIFIER] {
            let dir = self.root.join(sub);
            remove_tree(&dir)?;
            debug!(dir = %dir.display(), "wiped uncommitted catalogue subtree");
        }
        self.ensure_subtrees()
    }

    /// Total size of the catalogue in KiB, each file rounded up to a
    /// whole KiB before summing.
    pub fn disk_usage_kib(&self) -> CatalogResult<u64> {
        dir_usage_kib(&self.root)
    }
}

fn dir_usage_kib(dir: &Path) -> CatalogResult<u64> {
    let mut total = 0u64;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        if meta.is_dir() {
            total += dir_usage_kib(&entry.path())?;
        } else {
            total += kib_ceil(meta.len());
        }
    }
    Ok(total)
}

fn remove_tree(dir: &Path) -> CatalogResult<()> {
    // Staged subtrees are deliberately r-x; give ourselves write
    // access back before tearing them down.
    relax_tree(dir)?;
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

#[cfg(unix)]
fn relax_tree(dir: &Path) -> CatalogResult<()> {
    use std::os::unix::fs::PermissionsExt;
    if !dir.is_dir() {
        return Ok(());
    }
    fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.metadata()?.is_dir() {
            relax_tree(&entry.path())?;
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn relax_tree(_dir: &Path) -> CatalogResult<()> {
    Ok(())
}

/// Create a scratch directory with owner-only access.
pub(crate) fn create_private_dir(dir: &Path) -> CatalogResult<()> {
    if dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}
