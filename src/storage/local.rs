//! Local filesystem storage implementation.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! └── {source file}.json    # { "timestamp": ..., "records": [...] }
//! ```
//!
//! Writes go to a `.tmp` sibling first and are renamed into place, so a
//! reader never observes a half-written snapshot.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{Snapshot, SourceConfig};
use crate::storage::SnapshotStore;

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Full path of a source's snapshot file.
    pub fn path_for(&self, source: &SourceConfig) -> PathBuf {
        self.root_dir.join(source.storage_file_name())
    }

    /// Create the storage directory if it does not exist yet.
    pub async fn ensure_root(&self) -> Result<()> {
        if !tokio::fs::try_exists(&self.root_dir).await? {
            tokio::fs::create_dir_all(&self.root_dir).await?;
            log::info!("Created storage directory: {}", self.root_dir.display());
        }
        Ok(())
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        self.ensure_dir(path).await?;

        let tmp = path.with_extension("json.tmp");
        let written = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(bytes).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp, path).await
        }
        .await;

        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(AppError::Io(e));
        }
        Ok(())
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Strict read: `Ok(None)` when no snapshot exists yet, `Err` when the
    /// file is unreadable or not a snapshot.
    pub async fn read_snapshot(&self, source: &SourceConfig) -> Result<Option<Snapshot>> {
        let path = self.path_for(source);
        match self.read_bytes(&path).await {
            Ok(Some(bytes)) => Snapshot::from_json(&bytes)
                .map(Some)
                .map_err(|e| AppError::storage_read(path.display(), e)),
            Ok(None) => Ok(None),
            Err(e) => Err(AppError::storage_read(path.display(), e)),
        }
    }
}

#[async_trait]
impl SnapshotStore for LocalStorage {
    async fn load(&self, source: &SourceConfig) -> Snapshot {
        match self.read_snapshot(source).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                log::debug!("[{}] No snapshot yet, starting empty", source.name);
                Snapshot::default()
            }
            Err(e) => {
                log::warn!("[{}] {}. Treating previous state as empty", source.name, e);
                Snapshot::default()
            }
        }
    }

    async fn save(&self, source: &SourceConfig, snapshot: &Snapshot) -> Result<()> {
        let path = self.path_for(source);
        let bytes = snapshot
            .to_json()
            .map_err(|e| AppError::storage_write(path.display(), e))?;

        self.write_bytes(&path, &bytes)
            .await
            .map_err(|e| AppError::storage_write(path.display(), e))?;

        log::debug!(
            "[{}] Snapshot with {} records written to {}",
            source.name,
            snapshot.len(),
            path.display()
        );
        Ok(())
    }
}
