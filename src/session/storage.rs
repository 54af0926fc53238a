//! Durable key/value medium behind the session store.
//!
//! SYSTEM CONTEXT
//! ==============
//! The browser client kept its session in `localStorage`, the mobile client
//! in `AsyncStorage`. Here the medium is a trait so the store can run against
//! a file on disk (CLI, desktop) or memory (tests, short-lived embedders).
//!
//! ERROR HANDLING
//! ==============
//! Storage calls return typed errors, but the store only logs them: a failed
//! write must never block the in-memory session mutation.

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Fixed key under which the session record is persisted.
pub const STORAGE_KEY: &str = "auth-storage";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("session record encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A string-valued persistence medium.
pub trait SessionStorage: Send + Sync {
    /// Read the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error when the medium cannot be read.
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error when the medium cannot be written.
    fn save(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Removing a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error when the medium cannot be modified.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Whether calls block the thread on I/O. The store then moves them off
    /// the async worker when it runs on a multi-thread runtime.
    fn is_blocking(&self) -> bool {
        false
    }
}

// =============================================================================
// FILE STORAGE
// =============================================================================

/// One JSON file per key inside a directory.
///
/// Reads and writes are synchronous `std::fs` calls made while the session
/// store holds its write lock. Under a multi-thread tokio runtime the store
/// wraps them in `block_in_place`; on a current-thread runtime they block
/// the only worker for the duration of one small write.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `key`.
    #[must_use]
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io { path: path.to_path_buf(), source }
}

impl SessionStorage for FileStorage {
    fn is_blocking(&self) -> bool {
        true
    }

    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path)(e)),
        }
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.dir).map_err(io_error(&self.dir))?;
        let path = self.path_for(key);
        // Write-then-rename so a crash never leaves a truncated record.
        let staging = self.dir.join(format!(".{key}.json.tmp"));
        std::fs::write(&staging, value).map_err(io_error(&staging))?;
        std::fs::rename(&staging, &path).map_err(io_error(&path))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(io_error(&path)(e)),
            _ => Ok(()),
        }
    }
}

// =============================================================================
// MEMORY STORAGE
// =============================================================================

/// Process-local storage; contents vanish with the value.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }
}

impl SessionStorage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(items.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.remove(key);
        Ok(())
    }
}
