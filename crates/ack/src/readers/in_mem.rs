// ai
//! # Previously, on ack...
//!
//! 🎬 The buckets lived in the cloud. The cloud cost money. The tests did not want to
//! pay. So someone built a bucket out of a `BTreeMap` and a dream.
//!
//! [`InMemoryBinding`] is a [`PlatformBinding`] that never leaves the heap. Objects keep
//! their insertion order as listing order, so tests can stage ties and overlaps precisely.
//! A shared [`CallCounts`] tallies every client, listing and download, so "nothing was
//! downloaded yet" is an assertion, not a hope.
//!
//! ✅ No network. No disk. No invoice.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::object_storage::{ObjectStorageConfig, PlatformBinding};
use crate::error::AckError;

/// 📋 `[reader.InMemory]`: a bucket defined inline in the config file. Dry runs and demos.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct InMemoryReaderConfig {
    #[serde(flatten)]
    pub storage: ObjectStorageConfig,
    #[serde(default)]
    pub objects: Vec<InMemoryObjectConfig>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct InMemoryObjectConfig {
    pub key: String,
    /// ⏰ Seconds since the Unix epoch.
    pub timestamp: i64,
    pub body: String,
}

#[derive(Debug, Clone)]
pub(crate) struct InMemoryObject {
    key: String,
    timestamp: DateTime<Utc>,
    body: Arc<Vec<u8>>,
}

/// 🧮 How many times each backend operation ran.
#[derive(Debug, Default)]
pub(crate) struct CallCounts {
    pub(crate) clients: AtomicUsize,
    pub(crate) listings: AtomicUsize,
    pub(crate) downloads: AtomicUsize,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct InMemoryBinding {
    buckets: BTreeMap<String, Vec<InMemoryObject>>,
    counts: Arc<CallCounts>,
}

impl InMemoryBinding {
    pub(crate) fn from_config(config: &InMemoryReaderConfig) -> Self {
        config.objects.iter().fold(
            Self::default().with_bucket(&config.storage.bucket),
            |binding, object| {
                binding.with_object(
                    &config.storage.bucket,
                    &object.key,
                    object.timestamp,
                    &object.body,
                )
            },
        )
    }

    pub(crate) fn with_bucket(mut self, bucket: &str) -> Self {
        self.buckets.entry(bucket.to_string()).or_default();
        self
    }

    pub(crate) fn with_object(self, bucket: &str, key: &str, timestamp: i64, body: &str) -> Self {
        self.with_object_bytes(bucket, key, timestamp, body.as_bytes().to_vec())
    }

    pub(crate) fn with_object_bytes(
        mut self,
        bucket: &str,
        key: &str,
        timestamp: i64,
        body: Vec<u8>,
    ) -> Self {
        self.buckets
            .entry(bucket.to_string())
            .or_default()
            .push(InMemoryObject {
                key: key.to_string(),
                timestamp: DateTime::<Utc>::from_timestamp(timestamp, 0).unwrap_or_default(),
                body: Arc::new(body),
            });
        self
    }

    #[cfg(test)]
    pub(crate) fn counts(&self) -> Arc<CallCounts> {
        Arc::clone(&self.counts)
    }
}

#[async_trait]
impl PlatformBinding for InMemoryBinding {
    type Client = ();
    type Bucket = String;
    type RawObject = InMemoryObject;
    type Object = InMemoryObject;

    fn platform(&self) -> &'static str {
        "InMemory"
    }

    async fn create_client(&self) -> Result<()> {
        self.counts.clients.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn create_bucket(&self, _client: &(), name: &str) -> Result<String> {
        if self.buckets.contains_key(name) {
            return Ok(name.to_string());
        }
        Err(AckError::BucketNotFound {
            bucket: name.to_string(),
            available: self.buckets.keys().cloned().collect(),
        }
        .into())
    }

    async fn list_objects(&self, bucket: &String, prefix: &str) -> Result<Vec<InMemoryObject>> {
        self.counts.listings.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .buckets
            .get(bucket)
            .map(|objects| {
                objects
                    .iter()
                    .filter(|object| object.key.starts_with(prefix))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn get_timestamp(&self, raw: &InMemoryObject) -> DateTime<Utc> {
        raw.timestamp
    }

    fn get_key(&self, raw: &InMemoryObject) -> String {
        raw.key.clone()
    }

    fn to_object(&self, _bucket: &String, raw: InMemoryObject) -> InMemoryObject {
        raw
    }

    async fn download_object_to_file(
        &self,
        _bucket: &String,
        object: &InMemoryObject,
        dest: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64> {
        self.counts.downloads.fetch_add(1, Ordering::SeqCst);
        dest.write_all(&object.body).await?;
        Ok(object.body.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn the_one_where_the_config_bucket_exists_even_when_empty() {
        let config: InMemoryReaderConfig = toml::from_str(
            r#"
            bucket = "demo"
            prefix = [""]
            format = "csv"
            "#,
        )
        .expect("💀 minimal in-memory config should parse");
        let binding = InMemoryBinding::from_config(&config);
        assert_eq!(binding.create_bucket(&(), "demo").await.unwrap(), "demo");
        assert!(binding.list_objects(&"demo".to_string(), "").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn the_one_where_listing_respects_prefix_and_insertion_order() {
        let binding = InMemoryBinding::default()
            .with_object("b", "z/2.csv", 1, "")
            .with_object("b", "a/1.csv", 1, "")
            .with_object("b", "z/1.csv", 1, "");
        let keys: Vec<String> = binding
            .list_objects(&"b".to_string(), "z/")
            .await
            .unwrap()
            .iter()
            .map(|o| binding.get_key(o))
            .collect();
        assert_eq!(keys, vec!["z/2.csv", "z/1.csv"]);
        assert_eq!(binding.counts().listings.load(Ordering::SeqCst), 1);
    }
}
