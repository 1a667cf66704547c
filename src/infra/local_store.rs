use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::app::ports::ObjectStorePort;
use crate::error::{IngestError, Result};

/// Filesystem object store: bucket `b`, key `k` lives at `<root>/b/k`
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf> {
        check_relative(bucket)?;
        Ok(self.root.join(bucket))
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        check_relative(key)?;
        Ok(self.bucket_dir(bucket)?.join(key))
    }

    fn map_not_found(e: std::io::Error, bucket: &str, key: &str) -> IngestError {
        if e.kind() == ErrorKind::NotFound {
            IngestError::ObjectNotFound {
                bucket: bucket.to_string(),
                name: key.to_string(),
            }
        } else {
            IngestError::Io(e)
        }
    }
}

/// Keys must stay inside their bucket directory
fn check_relative(name: &str) -> Result<()> {
    let path = Path::new(name);
    let ok = !name.is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)));
    if ok {
        Ok(())
    } else {
        Err(IngestError::InvalidLocation(name.to_string()))
    }
}

#[async_trait]
impl ObjectStorePort for LocalObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let path = self.object_path(bucket, key)?;
        fs::read(&path).await.map_err(|e| Self::map_not_found(e, bucket, key))
    }

    async fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<()> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, bytes).await?;
        debug!(path = %path.display(), "Wrote object");
        Ok(())
    }

    async fn list(&self, bucket: &str) -> Result<Vec<String>> {
        let dir = self.bucket_dir(bucket)?;
        let mut keys = Vec::new();
        let mut pending = vec![dir.clone()];
        while let Some(current) = pending.pop() {
            let mut entries = match fs::read_dir(&current).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                } else if let Ok(relative) = path.strip_prefix(&dir) {
                    let key: Vec<_> = relative.components().map(|c| c.as_os_str().to_string_lossy()).collect();
                    keys.push(key.join("/"));
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        let path = self.object_path(bucket, key)?;
        fs::remove_file(&path).await.map_err(|e| Self::map_not_found(e, bucket, key))?;
        debug!(path = %path.display(), "Deleted object");
        Ok(())
    }

    async fn promote(&self, bucket: &str, from: &str, to: &str) -> Result<()> {
        let source = self.object_path(bucket, from)?;
        let dest = self.object_path(bucket, to)?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        // rename replaces the destination in one step on the same filesystem
        fs::rename(&source, &dest).await.map_err(|e| Self::map_not_found(e, bucket, from))
    }
}
