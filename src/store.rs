//! Persisted key-value storage for client state.
//!
//! SYSTEM CONTEXT
//! ==============
//! The session token lives in a single `userToken` entry. Nothing reaches the
//! storage except through `TokenStore`, so tests substitute `MemoryStore` while
//! the CLI uses the JSON-file backed `FileStore`.
//!
//! TRADE-OFFS
//! ==========
//! `FileStore` opens and re-reads the whole file on every call. The file holds a
//! handful of entries, and per-call handles mean nothing stays open between
//! commands. Writes land in a temporary sibling first and are renamed into
//! place, so a crash mid-write never leaves a truncated file behind. A file
//! that does not parse reads as empty and is replaced on the next write.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use tokio::sync::Mutex;
use uuid::Uuid;

/// Storage key holding the raw bearer token.
pub const TOKEN_KEY: &str = "userToken";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage io failed for {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("storage file is not a JSON object of strings: {0}")]
    Json(#[from] serde_json::Error),
}

/// Minimal get/set/delete contract over a string key-value store.
#[async_trait::async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

// =============================================================================
// MEMORY STORE
// =============================================================================

/// In-process store. Contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with one entry.
    #[must_use]
    pub fn with_entry(key: &str, value: &str) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(key.to_owned(), value.to_owned());
        Self { entries: Mutex::new(entries) }
    }
}

#[async_trait::async_trait]
impl TokenStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .await
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

// =============================================================================
// FILE STORE
// =============================================================================

/// Store backed by a single JSON object on disk. A missing file reads as empty.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io { path: self.path.clone(), source }
    }

    async fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(error) => return Err(self.io_error(error)),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// `load`, except a file that does not parse reads as empty. The flag
    /// reports whether the file was discarded and needs rewriting.
    async fn load_or_reset(&self) -> Result<(BTreeMap<String, String>, bool), StoreError> {
        match self.load().await {
            Ok(entries) => Ok((entries, false)),
            Err(StoreError::Json(error)) => {
                tracing::warn!(path = %self.path.display(), %error, "storage file unreadable; treating as empty");
                Ok((BTreeMap::new(), true))
            }
            Err(error) => Err(error),
        }
    }

    async fn save(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.io_error(e))?;
            }
        }

        let rendered = serde_json::to_vec_pretty(entries)?;
        let tmp = self
            .path
            .with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, rendered)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl TokenStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.load_or_reset().await?.0.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let (mut entries, _) = self.load_or_reset().await?;
        entries.insert(key.to_owned(), value.to_owned());
        self.save(&entries).await?;
        tracing::debug!(path = %self.path.display(), key, "storage entry written");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let (mut entries, reset) = self.load_or_reset().await?;
        if entries.remove(key).is_none() && !reset {
            return Ok(());
        }
        self.save(&entries).await?;
        tracing::debug!(path = %self.path.display(), key, "storage entry deleted");
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
