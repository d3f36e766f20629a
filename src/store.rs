//! Durable JSON document storage with atomic writes.

use crate::error::{Result, StoreError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::Write as _;
use std::path::{Path, PathBuf};

/// Stores named JSON documents under a single directory, rewritten wholesale
/// on each save.
///
/// This is a generic durability primitive with no domain knowledge. Callers
/// that share a document must serialize their own writes; every domain store
/// in this crate saves while holding its own lock.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    dir: PathBuf,
}

impl DocumentStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Path of a named document.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Load a document, substituting the type's default when the file is
    /// missing or unreadable. Corruption is tolerated by fallback, never by
    /// failing the caller.
    pub fn load<T: DeserializeOwned + Default>(&self, name: &str) -> T {
        let path = self.path(name);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return T::default(),
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "failed to read document, using default");
                return T::default();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "corrupt document, using default");
                T::default()
            }
        }
    }

    /// Save a document atomically: the content is written to a temp file in
    /// the same directory and renamed into place, so a reader never observes
    /// a partially written file.
    pub fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Serialize {
            name: name.to_string(),
            source,
        })?;
        atomic_write(&self.path(name), &bytes)
    }
}

/// Write `bytes` to `path` via a temp file and rename.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let write = || -> std::io::Result<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    };
    write().map_err(|source| {
        StoreError::Write {
            path: path.display().to_string(),
            source,
        }
        .into()
    })
}
