//! Token persistence
//!
//! The host decides where credentials live; [`TokenStore`] is the seam. Two
//! stores ship with the crate: a JSON file in the platform config directory
//! and an in-memory store.

use super::token::TokenSet;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Errors that can occur during token storage operations
#[derive(Debug, Error)]
pub enum TokenError {
    /// I/O error during storage operations
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persistence collaborator for the current [`TokenSet`]
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Load the persisted tokens, `None` if nothing was saved
    async fn load(&self) -> Result<Option<TokenSet>, TokenError>;

    /// Durably replace the persisted tokens
    async fn save(&self, tokens: &TokenSet) -> Result<(), TokenError>;

    /// Remove the persisted tokens
    async fn clear(&self) -> Result<(), TokenError>;
}

/// Token store backed by a JSON file
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    storage_path: PathBuf,
}

impl Default for FileTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FileTokenStore {
    /// Create token storage with default path (platform-specific config directory)
    #[must_use]
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mstodo");

        Self {
            storage_path: config_dir.join("tokens.json"),
        }
    }

    /// Create token storage with custom path
    #[must_use]
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            storage_path: path.into(),
        }
    }

    /// Get the storage path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.storage_path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .storage_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.storage_path.with_file_name(name)
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> Result<Option<TokenSet>, TokenError> {
        let content = match tokio::fs::read_to_string(&self.storage_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let tokens: TokenSet = serde_json::from_str(&content)?;
        Ok((!tokens.is_empty()).then_some(tokens))
    }

    async fn save(&self, tokens: &TokenSet) -> Result<(), TokenError> {
        if let Some(parent) = self.storage_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(tokens)?;

        // Write beside the target and rename so readers never see a torn file
        let temp_path = self.temp_path();
        match tokio::fs::remove_file(&temp_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create_new(true);
        // Owner-only from creation, never briefly world-readable
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&temp_path).await?;
        file.write_all(content.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&temp_path, &self.storage_path).await?;
        tracing::debug!(path = %self.storage_path.display(), "Persisted OAuth tokens");
        Ok(())
    }

    async fn clear(&self) -> Result<(), TokenError> {
        match tokio::fs::remove_file(&self.storage_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Token store that keeps credentials in process memory only
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<Option<TokenSet>>,
}

impl MemoryTokenStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `tokens`
    #[must_use]
    pub fn with_tokens(tokens: TokenSet) -> Self {
        Self {
            tokens: Mutex::new(Some(tokens)),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> Result<Option<TokenSet>, TokenError> {
        Ok(self.tokens.lock().await.clone())
    }

    async fn save(&self, tokens: &TokenSet) -> Result<(), TokenError> {
        *self.tokens.lock().await = Some(tokens.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), TokenError> {
        *self.tokens.lock().await = None;
        Ok(())
    }
}
