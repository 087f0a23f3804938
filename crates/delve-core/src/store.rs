//! Workspace artifact store
//!
//! Intermediate artifacts (brief, compressed research, raw notes, report,
//! healing history) are written as plain text under per-agent prefixes:
//! `supervisor/brief.md`, `researcher_<id>/compressed.md`, ...
//!
//! Persistence never fails a stage; use [`persist`] to write and log.

use crate::error::StoreError;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

/// Key for the research brief
pub const BRIEF_KEY: &str = "supervisor/brief.md";

/// Key for the final report
pub const FINAL_REPORT_KEY: &str = "supervisor/final_report.md";

/// Key for a worker artifact
#[must_use]
pub fn researcher_key(agent: &str, file: &str) -> String {
    format!("researcher_{agent}/{file}")
}

/// Opaque key/value blob store addressed by path
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Write `text` under `key`, replacing any previous value
    async fn write(&self, key: &str, text: &str) -> Result<(), StoreError>;

    /// Read the value under `key`
    async fn read(&self, key: &str) -> Result<Option<String>, StoreError>;
}

/// Write an artifact, logging instead of failing
pub async fn persist(store: &dyn ArtifactStore, key: &str, text: &str) {
    match store.write(key, text).await {
        Ok(()) => tracing::debug!(key, bytes = text.len(), "artifact written"),
        Err(err) => tracing::warn!(key, error = %err, "failed to write artifact"),
    }
}

/// Store that discards writes
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStore;

#[async_trait]
impl ArtifactStore for NullStore {
    async fn write(&self, _key: &str, _text: &str) -> Result<(), StoreError> {
        Ok(())
    }

    async fn read(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Ok(None)
    }
}

/// Store rooted at a workspace directory
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Create store rooted at `root` (created lazily)
    #[inline]
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Workspace root
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(key);
        let is_plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if key.is_empty() || !is_plain {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn write(&self, key: &str, text: &str) -> Result<(), StoreError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, text).await?;
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.resolve(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}
