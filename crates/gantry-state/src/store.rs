#![forbid(unsafe_code)]

use std::{
    marker::PhantomData,
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;
use tracing::trace;

use crate::{error::StateResult, name::SafeName};

/// Atomically replace `path` with the JSON encoding of `value`.
///
/// Write-to-temp-then-rename so readers never observe a torn file,
/// which makes the store safe on durable storage as well as tmpfs.
pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> StateResult<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, &bytes).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

/// Read and decode a JSON file. `Ok(None)` when the file is absent.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> StateResult<Option<T>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    Ok(Some(serde_json::from_slice(&bytes)?))
}

/// A directory of `<SafeName>.json` records of one type.
///
/// The directory is the authoritative store; every operation goes to
/// disk. Writes are whole-file atomic replacements.
pub struct StateDir<T> {
    dir: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for StateDir<T> {
    fn clone(&self) -> Self {
        Self {
            dir: self.dir.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> StateDir<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            _marker: PhantomData,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure(&self) -> StateResult<()> {
        fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    pub fn path_for(&self, name: &SafeName) -> PathBuf {
        self.dir.join(name.json_file_name())
    }

    /// Path for a raw watcher-supplied basename (already `.json`).
    pub fn path_for_file(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    pub async fn load(&self, name: &SafeName) -> StateResult<Option<T>> {
        read_json(&self.path_for(name)).await
    }

    pub async fn load_file(&self, file_name: &str) -> StateResult<Option<T>> {
        read_json(&self.path_for_file(file_name)).await
    }

    pub async fn store(&self, name: &SafeName, value: &T) -> StateResult<()> {
        trace!(name = %name, dir = %self.dir.display(), "store state record");
        write_json(&self.path_for(name), value).await
    }

    /// Remove the record; absent is not an error.
    pub async fn remove(&self, name: &SafeName) -> StateResult<()> {
        match fs::remove_file(self.path_for(name)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Basenames of all `.json` records currently in the directory.
    pub async fn scan(&self) -> StateResult<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if file_name.ends_with(".json") {
                names.push(file_name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}
