// ai
//! 📖 Readers: where records come from.
//!
//! 🎭 Every cloud gets a [`PlatformBinding`](object_storage::PlatformBinding), and every binding
//! gets the same engine. [`ReaderBackend`] is the casting agency that picks one from config,
//! so the pipeline never learns whether it is talking to S3, GCS, Azure, a directory, or RAM.
//!
//! Pattern, as elsewhere: trait → concrete impls → backend enum → `impl Reader for ReaderBackend`.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use crate::streams::RecordStream;

pub(crate) mod azure;
pub(crate) mod gcs;
pub(crate) mod in_mem;
mod key_split;
pub(crate) mod local;
pub(crate) mod object_storage;
pub(crate) mod s3;

pub use azure::AzureReaderConfig;
pub use gcs::GcsReaderConfig;
pub use in_mem::{InMemoryObjectConfig, InMemoryReaderConfig};
pub use local::LocalReaderConfig;
pub use object_storage::ObjectStorageConfig;
pub use s3::S3ReaderConfig;

use object_storage::ObjectStorageReader;

/// 🚰 A source of record streams.
///
/// # Contract 📜
/// - `Ok(Some(stream))` while streams remain, `Ok(None)` once every prefix is done.
/// - Streams are handed out undownloaded. Pulling records is the caller's business.
#[async_trait]
pub(crate) trait Reader: std::fmt::Debug {
    async fn next_stream(&mut self) -> Result<Option<RecordStream>>;
}

/// 📋 Which reader to build. Externally tagged: `[reader.S3]`, `[reader.Gcs]`, ...
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub enum ReaderConfig {
    S3(S3ReaderConfig),
    Gcs(GcsReaderConfig),
    Azure(AzureReaderConfig),
    Local(LocalReaderConfig),
    InMemory(InMemoryReaderConfig),
}

impl ReaderConfig {
    /// 🪣 The shared object-storage knobs, whatever the backend.
    pub fn storage(&self) -> &ObjectStorageConfig {
        match self {
            ReaderConfig::S3(c) => &c.storage,
            ReaderConfig::Gcs(c) => &c.storage,
            ReaderConfig::Azure(c) => &c.storage,
            ReaderConfig::Local(c) => &c.storage,
            ReaderConfig::InMemory(c) => &c.storage,
        }
    }
}

/// 🎭 The many faces of a Reader. One engine, five costumes.
#[derive(Debug)]
pub(crate) enum ReaderBackend {
    S3(ObjectStorageReader<s3::S3Binding>),
    Gcs(ObjectStorageReader<gcs::GcsBinding>),
    Azure(ObjectStorageReader<azure::AzureBinding>),
    Local(ObjectStorageReader<local::LocalBinding>),
    InMemory(ObjectStorageReader<in_mem::InMemoryBinding>),
}

impl ReaderBackend {
    /// 🏗️ Build the configured reader. Validates config, connects, and checks the bucket exists.
    pub(crate) async fn from_config(config: &ReaderConfig) -> Result<Self> {
        let storage = config.storage();
        Ok(match config {
            ReaderConfig::S3(c) => {
                ReaderBackend::S3(ObjectStorageReader::new(s3::S3Binding::new(c.clone()), storage).await?)
            }
            ReaderConfig::Gcs(c) => ReaderBackend::Gcs(
                ObjectStorageReader::new(gcs::GcsBinding::new(c.clone()), storage).await?,
            ),
            ReaderConfig::Azure(c) => ReaderBackend::Azure(
                ObjectStorageReader::new(azure::AzureBinding::new(c.clone()), storage).await?,
            ),
            ReaderConfig::Local(c) => ReaderBackend::Local(
                ObjectStorageReader::new(local::LocalBinding::new(c), storage).await?,
            ),
            ReaderConfig::InMemory(c) => ReaderBackend::InMemory(
                ObjectStorageReader::new(in_mem::InMemoryBinding::from_config(c), storage).await?,
            ),
        })
    }
}

#[async_trait]
impl Reader for ReaderBackend {
    async fn next_stream(&mut self) -> Result<Option<RecordStream>> {
        match self {
            ReaderBackend::S3(r) => r.next_stream().await,
            ReaderBackend::Gcs(r) => r.next_stream().await,
            ReaderBackend::Azure(r) => r.next_stream().await,
            ReaderBackend::Local(r) => r.next_stream().await,
            ReaderBackend::InMemory(r) => r.next_stream().await,
        }
    }
}
