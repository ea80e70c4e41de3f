// ai
//! 📁 Local disk as object storage. A bucket is a directory, a key is a relative path.
//!
//! Useful for staging exports on a mounted volume, and for poking at the engine without
//! cloud credentials. Keys always use `/`, even on platforms that disagree. Timestamps are
//! file mtimes, which are exactly as trustworthy as whoever last ran `touch`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::io::AsyncWrite;
use walkdir::WalkDir;

use super::object_storage::{ObjectStorageConfig, PlatformBinding};
use crate::error::AckError;

/// 📋 `[reader.Local]`
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LocalReaderConfig {
    /// 🏠 Directory whose sub-directories are the buckets.
    pub root: PathBuf,
    #[serde(flatten)]
    pub storage: ObjectStorageConfig,
}

#[derive(Debug)]
pub(crate) struct LocalObject {
    key: String,
    path: PathBuf,
    modified: DateTime<Utc>,
}

#[derive(Debug)]
pub(crate) struct LocalBinding {
    root: PathBuf,
}

impl LocalBinding {
    pub(crate) fn new(config: &LocalReaderConfig) -> Self {
        Self {
            root: config.root.clone(),
        }
    }
}

/// 🗝️ `bucket/a/b.csv` → `a/b.csv`, joined with `/` regardless of OS.
fn relative_key(bucket: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(bucket).ok()?;
    let parts: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
    Some(parts?.join("/"))
}

#[async_trait]
impl PlatformBinding for LocalBinding {
    type Client = PathBuf;
    type Bucket = PathBuf;
    type RawObject = LocalObject;
    type Object = LocalObject;

    fn platform(&self) -> &'static str {
        "Local"
    }

    async fn create_client(&self) -> Result<PathBuf> {
        let is_dir = tokio::fs::metadata(&self.root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(AckError::configuration(format!(
                "local root '{}' is not a readable directory",
                self.root.display()
            ))
            .into());
        }
        Ok(self.root.clone())
    }

    async fn create_bucket(&self, root: &PathBuf, name: &str) -> Result<PathBuf> {
        let bucket = root.join(name);
        if tokio::fs::metadata(&bucket).await.is_ok_and(|m| m.is_dir()) {
            return Ok(bucket);
        }

        let mut available = Vec::new();
        let mut entries = tokio::fs::read_dir(root)
            .await
            .with_context(|| format!("💀 could not list '{}'", root.display()))?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                available.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        available.sort();
        Err(AckError::BucketNotFound {
            bucket: name.to_string(),
            available,
        }
        .into())
    }

    async fn list_objects(&self, bucket: &PathBuf, prefix: &str) -> Result<Vec<LocalObject>> {
        let bucket = bucket.clone();
        let prefix = prefix.to_string();
        // -- walkdir is blocking, so the walk gets its own thread
        tokio::task::spawn_blocking(move || {
            let mut objects = Vec::new();
            for entry in WalkDir::new(&bucket).follow_links(false) {
                let entry = entry.with_context(|| format!("💀 could not walk '{}'", bucket.display()))?;
                // 🔗 symlinks are neither files nor objects
                if !entry.file_type().is_file() {
                    continue;
                }
                let Some(key) = relative_key(&bucket, entry.path()) else {
                    continue;
                };
                if !key.starts_with(&prefix) {
                    continue;
                }
                let modified = entry
                    .metadata()
                    .with_context(|| format!("💀 could not stat '{}'", entry.path().display()))?
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_default();
                objects.push(LocalObject {
                    key,
                    path: entry.into_path(),
                    modified,
                });
            }
            // -- directory order is arbitrary; object stores list lexicographically
            objects.sort_by(|a, b| a.key.cmp(&b.key));
            Ok::<_, anyhow::Error>(objects)
        })
        .await
        .context("💀 the local listing thread fell over")?
    }

    fn get_timestamp(&self, raw: &LocalObject) -> DateTime<Utc> {
        raw.modified
    }

    fn get_key(&self, raw: &LocalObject) -> String {
        raw.key.clone()
    }

    fn to_object(&self, _bucket: &PathBuf, raw: LocalObject) -> LocalObject {
        raw
    }

    async fn download_object_to_file(
        &self,
        _bucket: &PathBuf,
        object: &LocalObject,
        dest: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64> {
        let mut file = tokio::fs::File::open(&object.path)
            .await
            .with_context(|| format!("💀 could not open '{}'", object.path.display()))?;
        let copied = tokio::io::copy(&mut file, dest).await?;
        Ok(copied)
    }
}
