// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Filesystem-backed bucket

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use super::{ScanStorage, StoredObject};
use crate::config::StorageConfig;
use crate::{OculareError, Result};

/// Bucket stored as a directory tree: `<root>/<bucket>/<userId>/<filename>`
#[derive(Debug, Clone)]
pub struct LocalStorage {
    bucket_dir: PathBuf,
}

impl LocalStorage {
    /// Use `dir` as the bucket directory
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            bucket_dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(Path::new(&config.root).join(&config.bucket))
    }

    pub fn bucket_dir(&self) -> &Path {
        &self.bucket_dir
    }

    /// Map a storage key onto the bucket, refusing anything that escapes it
    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));

        if key.is_empty() || escapes {
            return Err(OculareError::Storage(format!("Invalid object key: {}", key)));
        }
        Ok(self.bucket_dir.join(relative))
    }
}

#[async_trait]
impl ScanStorage for LocalStorage {
    async fn list(&self, user_id: &str) -> Result<Vec<StoredObject>> {
        let dir = self.resolve(user_id)?;

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No storage directory for user {}", user_id);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut objects = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let created = metadata.created().or_else(|_| metadata.modified())?;
            objects.push(StoredObject {
                name: entry.file_name().to_string_lossy().to_string(),
                created_at: DateTime::<Utc>::from(created),
            });
        }

        objects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(objects)
    }

    async fn upload(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(OculareError::StorageConflict(path.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        write_or_discard(file, &target, bytes).await?;
        info!("Stored {} ({} bytes)", path, bytes.len());
        Ok(())
    }

    async fn remove(&self, paths: &[String]) -> Result<()> {
        let targets = paths
            .iter()
            .map(|p| self.resolve(p))
            .collect::<Result<Vec<_>>>()?;

        for (path, target) in paths.iter().zip(targets) {
            match tokio::fs::remove_file(&target).await {
                Ok(()) => debug!("Removed {}", path),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!("Already gone: {}", path);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn image_ref(&self, path: &str) -> Result<String> {
        let target = self.resolve(path)?;
        let absolute = tokio::fs::canonicalize(&target)
            .await
            .map_err(|e| OculareError::Storage(format!("Cannot resolve {}: {}", path, e)))?;
        Ok(format!("file://{}", absolute.display()))
    }
}

/// Write `bytes` and close the writer; an incomplete write removes `target`
async fn write_or_discard<W>(mut writer: W, target: &Path, bytes: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let written = async {
        writer.write_all(bytes).await?;
        writer.flush().await
    }
    .await;
    drop(writer);

    if let Err(e) = written {
        if let Err(cleanup) = tokio::fs::remove_file(target).await {
            warn!("Could not discard partial object {:?}: {}", target, cleanup);
        }
        return Err(e.into());
    }
    Ok(())
}
