//! Credential Store: process-wide holder of the session credential pair.
//!
//! # Concurrency
//!
//! Stores are last-write-wins and make no ordering promise across concurrent
//! writers. During renewal the refresh coordinator is the only writer, which
//! is what keeps two renewal results from overwriting each other.
//!
//! # Usage
//!
//! ```rust,ignore
//! use ride_store::{CredentialStore, FileCredentialStore};
//!
//! let store = FileCredentialStore::new("/var/lib/rided/credentials.json");
//! store.set(pair).await?;
//! let current = store.get().await?;
//! ```

use async_trait::async_trait;
use ride_domain::CredentialPair;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

use crate::error::StoreError;

// =============================================================================
// Credential Store Trait
// =============================================================================

/// Storage for the single credential pair of a session.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Current pair, if the session is authenticated.
    async fn get(&self) -> Result<Option<CredentialPair>, StoreError>;

    /// Replace the stored pair as a whole.
    async fn set(&self, pair: CredentialPair) -> Result<(), StoreError>;

    /// Forget the stored pair.
    async fn clear(&self) -> Result<(), StoreError>;
}

// =============================================================================
// In-Memory Implementation
// =============================================================================

/// In-memory credential store.
pub struct MemoryCredentialStore {
    pair: RwLock<Option<CredentialPair>>,
}

impl MemoryCredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            pair: RwLock::new(None),
        }
    }

    /// Create a store already holding a pair.
    pub fn with_pair(pair: CredentialPair) -> Self {
        Self {
            pair: RwLock::new(Some(pair)),
        }
    }
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self) -> Result<Option<CredentialPair>, StoreError> {
        let pair = self.pair.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(pair.clone())
    }

    async fn set(&self, pair: CredentialPair) -> Result<(), StoreError> {
        let mut slot = self.pair.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(pair);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut slot = self.pair.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = None;
        Ok(())
    }
}

// =============================================================================
// File Implementation
// =============================================================================

/// JSON-file credential store.
///
/// The pair is written to a sibling temp file and renamed into place, so a
/// reader never observes a half-written pair.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Create a store backed by the file at `path`.
    ///
    /// The file does not need to exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self) -> Result<Option<CredentialPair>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let pair = serde_json::from_slice(&bytes)?;
        Ok(Some(pair))
    }

    async fn set(&self, pair: CredentialPair) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let bytes = serde_json::to_vec(&pair)?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, &bytes).await?;
        tokio::fs::rename(&temp, &self.path).await?;

        debug!(path = %self.path.display(), "Credential pair persisted");
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "Credential file removed");
                Ok(())
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
