// ai
//! 🪣 The object-storage engine: list, filter, pick the newest, stream it.
//!
//! 🎬 COLD OPEN. INT. ENGINE ROOM, CONTINUOUS
//!
//! Three clouds walk into a bar. S3 says "I have continuation tokens." GCS says "I have
//! page tokens." Azure says "I have a Pageable that yields Responses that contain Blobs
//! that contain Properties." The bartender says "I don't care. Give me a key and a timestamp."
//!
//! That bartender is [`ObjectStorageReader`]. It is written ONCE and is generic over
//! [`PlatformBinding`]. It never asks which cloud it is talking to.
//!
//! 🧠 Knowledge graph:
//! - Construction resolves `FileFormat` + `KeySplit` FIRST (pure, no I/O), THEN calls
//!   `create_client` and `create_bucket`. Bad config never costs a network round trip.
//! - `next_stream()` lists prefixes lazily, one at a time, in configured order.
//! - Per prefix: filter by extension, group by key split, keep the newest per group.
//! - Overlapping prefixes are NOT deduplicated. Two prefixes matching the same object
//!   produce two streams. Working as intended; the config said so twice.
//! - Each selected object becomes a pending [`RecordStream`]. The body is fetched on first pull.

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::io::AsyncWrite;
use tracing::{debug, info};

use super::key_split::{KeySplit, select_most_recent};
use crate::common::StorageObjectRef;
use crate::formats::FileFormat;
use crate::streams::{ObjectFetch, RecordStream};

/// 🔌 Everything the engine needs from a storage backend, and nothing more.
///
/// # Contract 📜
/// - `list_objects` drains every page before returning. The engine sees one flat `Vec`.
/// - `to_object` is side-effect free. No network. It only turns a listing entry into a fetchable handle.
/// - `download_object_to_file` copies the body chunk by chunk. It never buffers the whole thing.
/// - Typed failures (`Authentication`, `BucketNotFound`) are raised as [`crate::error::AckError`].
#[async_trait]
pub(crate) trait PlatformBinding: Send + Sync + 'static {
    type Client: Send + Sync;
    type Bucket: Send + Sync + 'static;
    type RawObject: Send;
    type Object: Send + Sync + 'static;

    /// 🏷️ Human name for logs and error messages: "S3", "GCS", ...
    fn platform(&self) -> &'static str;

    async fn create_client(&self) -> Result<Self::Client>;

    /// 🪣 Resolve the bucket, or fail with `BucketNotFound` listing what does exist.
    async fn create_bucket(&self, client: &Self::Client, name: &str) -> Result<Self::Bucket>;

    async fn list_objects(&self, bucket: &Self::Bucket, prefix: &str) -> Result<Vec<Self::RawObject>>;

    fn get_timestamp(&self, raw: &Self::RawObject) -> DateTime<Utc>;

    fn get_key(&self, raw: &Self::RawObject) -> String;

    fn to_object(&self, bucket: &Self::Bucket, raw: Self::RawObject) -> Self::Object;

    async fn download_object_to_file(
        &self,
        bucket: &Self::Bucket,
        object: &Self::Object,
        dest: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64>;
}

/// 📋 What every object-storage reader needs, regardless of cloud. Flattened into each backend's config.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ObjectStorageConfig {
    pub bucket: String,
    /// 🗂️ Listed in order. Overlaps are kept, not deduplicated.
    pub prefix: Vec<String>,
    /// 📄 `csv`, `gz` or `njson`.
    pub format: String,
    #[serde(default = "default_dest_key_split")]
    pub dest_key_split: i64,
    #[serde(default = "default_csv_delimiter")]
    pub csv_delimiter: String,
    /// 🏷️ JSON list of names, e.g. `'["id", "name"]'`. Makes the first row data.
    #[serde(default)]
    pub csv_fieldnames: Option<String>,
    /// 🫁 Inner format when `format = "gz"`. Defaults to csv.
    #[serde(default)]
    pub compressed_format: Option<String>,
}

fn default_dest_key_split() -> i64 {
    -1
}

fn default_csv_delimiter() -> String {
    ",".to_string()
}

impl ObjectStorageConfig {
    pub(crate) fn file_format(&self) -> Result<FileFormat> {
        FileFormat::from_parts(
            &self.format,
            &self.csv_delimiter,
            self.csv_fieldnames.as_deref(),
            self.compressed_format.as_deref(),
        )
    }
}

/// 🚚 A selected object waiting to be fetched. Holds just enough to download it later.
struct PendingObject<P: PlatformBinding> {
    binding: Arc<P>,
    bucket: Arc<P::Bucket>,
    object: P::Object,
    key: String,
}

#[async_trait]
impl<P: PlatformBinding> ObjectFetch for PendingObject<P> {
    fn key(&self) -> &str {
        &self.key
    }

    async fn fetch_into(&self, dest: &mut (dyn AsyncWrite + Send + Unpin)) -> Result<u64> {
        self.binding
            .download_object_to_file(&self.bucket, &self.object, dest)
            .await
    }
}

/// 🔁 The incremental read engine. One instance, one client, one bucket, many prefixes.
pub(crate) struct ObjectStorageReader<P: PlatformBinding> {
    binding: Arc<P>,
    bucket: Arc<P::Bucket>,
    bucket_name: String,
    format: FileFormat,
    key_split: KeySplit,
    /// 🗂️ Prefixes not yet listed.
    prefixes: VecDeque<String>,
    /// 🌊 Streams selected from the current prefix, not yet handed out.
    selected: VecDeque<RecordStream>,
}

impl<P: PlatformBinding> std::fmt::Debug for ObjectStorageReader<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStorageReader")
            .field("platform", &self.binding.platform())
            .field("bucket", &self.bucket_name)
            .field("format", &self.format)
            .field("key_split", &self.key_split)
            .field("prefixes_left", &self.prefixes)
            .field("streams_ready", &self.selected.len())
            .finish()
    }
}

impl<P: PlatformBinding> ObjectStorageReader<P> {
    /// 🚀 Validate config, then connect. In that order, always.
    pub(crate) async fn new(binding: P, config: &ObjectStorageConfig) -> Result<Self> {
        let format = config.file_format()?;
        let key_split = KeySplit::from_config(config.dest_key_split)?;

        let client = binding.create_client().await?;
        let bucket = binding.create_bucket(&client, &config.bucket).await?;
        info!(
            "🪣 {} reader ready: bucket '{}', {} prefix(es), format '{}'",
            binding.platform(),
            config.bucket,
            config.prefix.len(),
            format.extension()
        );

        Ok(Self {
            binding: Arc::new(binding),
            bucket: Arc::new(bucket),
            bucket_name: config.bucket.clone(),
            format,
            key_split,
            prefixes: config.prefix.iter().cloned().collect(),
            selected: VecDeque::new(),
        })
    }

    /// 🌊 The next selected stream, listing the next prefix only when the current one runs dry.
    pub(crate) async fn next_stream(&mut self) -> Result<Option<RecordStream>> {
        loop {
            if let Some(stream) = self.selected.pop_front() {
                return Ok(Some(stream));
            }
            let Some(prefix) = self.prefixes.pop_front() else {
                return Ok(None);
            };
            self.selected = self.select_streams(&prefix).await?;
        }
    }

    async fn select_streams(&mut self, prefix: &str) -> Result<VecDeque<RecordStream>> {
        let platform = self.binding.platform();
        let listing = self.binding.list_objects(&self.bucket, prefix).await?;

        let mut candidates = Vec::with_capacity(listing.len());
        for raw in listing {
            let key = self.binding.get_key(&raw);
            if !self.format.matches_key(&key) {
                debug!("⏭️ wrong extension, skipping {} file {}", platform, key);
                continue;
            }
            info!("🔎 found {} file {}", platform, key);
            let timestamp = self.binding.get_timestamp(&raw);
            candidates.push(StorageObjectRef::new(key, timestamp, raw));
        }

        let winners = select_most_recent(candidates, self.key_split);
        if winners.is_empty() {
            info!("🫙 no {} objects under prefix '{}'", self.format.extension(), prefix);
        }

        let streams = winners
            .into_iter()
            .map(|winner| {
                info!(
                    "🏆 selected {} for group '{}' (last modified {})",
                    winner.object.key, winner.group, winner.object.timestamp
                );
                let name = self.format.strip_suffix(&winner.name).to_string();
                let fetch = PendingObject {
                    binding: Arc::clone(&self.binding),
                    bucket: Arc::clone(&self.bucket),
                    object: self.binding.to_object(&self.bucket, winner.object.raw),
                    key: winner.object.key,
                };
                RecordStream::pending(name, Box::new(fetch), self.format.clone())
            })
            .collect();
        Ok(streams)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AckError;
    use crate::formats::tests::gzip;
    use crate::readers::in_mem::InMemoryBinding;
    use serde_json::json;
    use std::sync::atomic::Ordering;

    fn config(prefix: &[&str], format: &str) -> ObjectStorageConfig {
        ObjectStorageConfig {
            bucket: "bucket".to_string(),
            prefix: prefix.iter().map(|p| p.to_string()).collect(),
            format: format.to_string(),
            dest_key_split: -1,
            csv_delimiter: ",".to_string(),
            csv_fieldnames: None,
            compressed_format: None,
        }
    }

    async fn drain_names(reader: &mut ObjectStorageReader<InMemoryBinding>) -> Vec<String> {
        let mut names = Vec::new();
        while let Some(stream) = reader.next_stream().await.unwrap() {
            names.push(stream.name().to_string());
        }
        names
    }

    #[tokio::test]
    async fn the_one_where_csv_beats_a_newer_njson_because_we_asked_for_csv() {
        let binding = InMemoryBinding::default()
            .with_object("bucket", "a.csv", 100, "a,b\n1,2\n3,4\n")
            .with_object("bucket", "a.njson", 200, "{\"a\":1}\n");
        let mut reader = ObjectStorageReader::new(binding, &config(&[""], "csv"))
            .await
            .unwrap();

        let mut stream = reader.next_stream().await.unwrap().expect("💀 one stream expected");
        assert_eq!(stream.name(), "a");
        assert_eq!(
            stream.collect_records().await.unwrap(),
            vec![
                json!({"a": "1", "b": "2"}).as_object().unwrap().clone(),
                json!({"a": "3", "b": "4"}).as_object().unwrap().clone(),
            ]
        );
        assert!(reader.next_stream().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn the_one_where_the_same_listing_always_picks_the_same_object() {
        let build = || {
            InMemoryBinding::default()
                .with_object("bucket", "d/old.csv", 100, "v\nold\n")
                .with_object("bucket", "d/new.csv", 300, "v\nnew\n")
                .with_object("bucket", "d/mid.csv", 200, "v\nmid\n")
        };
        for _ in 0..2 {
            let mut reader = ObjectStorageReader::new(build(), &config(&["d"], "csv"))
                .await
                .unwrap();
            let mut stream = reader.next_stream().await.unwrap().unwrap();
            assert_eq!(stream.name(), "new");
            assert_eq!(stream.next_record().await.unwrap().unwrap()["v"], "new");
            assert!(reader.next_stream().await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn the_one_where_wrong_extensions_are_ignored_even_when_newer() {
        let binding = InMemoryBinding::default()
            .with_object("bucket", "x.njson", 100, "{\"x\":1}\n")
            .with_object("bucket", "x.csv", 900, "x\n1\n")
            .with_object("bucket", "x.njson.bak", 999, "nope");
        let mut reader = ObjectStorageReader::new(binding, &config(&[""], "njson"))
            .await
            .unwrap();
        let mut stream = reader.next_stream().await.unwrap().unwrap();
        assert_eq!(stream.name(), "x");
        assert_eq!(stream.collect_records().await.unwrap()[0]["x"], 1);
        assert!(reader.next_stream().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn the_one_where_overlapping_prefixes_see_double() {
        let binding = InMemoryBinding::default().with_object("bucket", "a/b/f.csv", 1, "h\n1\n");
        let mut reader = ObjectStorageReader::new(binding, &config(&["a", "a/b"], "csv"))
            .await
            .unwrap();
        assert_eq!(drain_names(&mut reader).await, vec!["f", "f"]);
    }

    #[tokio::test]
    async fn the_one_where_nothing_is_downloaded_until_a_record_is_pulled() {
        let binding = InMemoryBinding::default()
            .with_object("bucket", "p/one.csv", 1, "h\n1\n")
            .with_object("bucket", "q/two.csv", 1, "h\n2\n");
        let counts = binding.counts();
        let mut reader = ObjectStorageReader::new(binding, &config(&["p", "q"], "csv"))
            .await
            .unwrap();
        assert_eq!(counts.listings.load(Ordering::SeqCst), 0);

        let mut first = reader.next_stream().await.unwrap().unwrap();
        assert_eq!(counts.listings.load(Ordering::SeqCst), 1, "💀 second prefix listed early");
        assert_eq!(counts.downloads.load(Ordering::SeqCst), 0);

        first.next_record().await.unwrap();
        assert_eq!(counts.downloads.load(Ordering::SeqCst), 1);

        let _second = reader.next_stream().await.unwrap().unwrap();
        assert_eq!(counts.listings.load(Ordering::SeqCst), 2);
        assert_eq!(counts.downloads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn the_one_where_an_empty_prefix_is_not_an_error() {
        let binding = InMemoryBinding::default()
            .with_object("bucket", "full/a.csv", 1, "h\n1\n")
            .with_bucket("bucket");
        let mut reader = ObjectStorageReader::new(binding, &config(&["empty", "full"], "csv"))
            .await
            .unwrap();
        assert_eq!(drain_names(&mut reader).await, vec!["a"]);
    }

    #[tokio::test]
    async fn the_one_where_a_missing_bucket_names_the_ones_that_exist() {
        let binding = InMemoryBinding::default()
            .with_bucket("alpha")
            .with_bucket("beta");
        let err = ObjectStorageReader::new(binding, &config(&[""], "csv"))
            .await
            .unwrap_err();
        match err.downcast_ref::<AckError>() {
            Some(AckError::BucketNotFound { bucket, available }) => {
                assert_eq!(bucket, "bucket");
                assert_eq!(available, &vec!["alpha".to_string(), "beta".to_string()]);
            }
            other => panic!("💀 expected BucketNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn the_one_where_bad_config_never_touches_the_backend() {
        for (format, dest_key_split) in [("txt", -1), ("csv", -7)] {
            let binding = InMemoryBinding::default().with_bucket("bucket");
            let counts = binding.counts();
            let mut cfg = config(&[""], format);
            cfg.dest_key_split = dest_key_split;

            let err = ObjectStorageReader::new(binding, &cfg).await.unwrap_err();
            assert!(matches!(
                err.downcast_ref::<AckError>(),
                Some(AckError::Configuration(_))
            ));
            assert_eq!(counts.clients.load(Ordering::SeqCst), 0);
            assert_eq!(counts.listings.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn the_one_where_segments_make_one_stream_per_folder() {
        let binding = InMemoryBinding::default()
            .with_object("bucket", "exports/eu/day1.csv", 100, "r\neu1\n")
            .with_object("bucket", "exports/us/day1.csv", 100, "r\nus1\n")
            .with_object("bucket", "exports/eu/day2.csv", 200, "r\neu2\n");
        let mut cfg = config(&["exports"], "csv");
        cfg.dest_key_split = 2;
        let mut reader = ObjectStorageReader::new(binding, &cfg).await.unwrap();

        let mut eu = reader.next_stream().await.unwrap().unwrap();
        assert_eq!(eu.name(), "day2");
        assert_eq!(eu.next_record().await.unwrap().unwrap()["r"], "eu2");
        let us = reader.next_stream().await.unwrap().unwrap();
        assert_eq!(us.name(), "day1");
        assert!(reader.next_stream().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn the_one_where_gzipped_csv_comes_out_clean() {
        let body = gzip(b"a;b\n1;2\n");
        let binding = InMemoryBinding::default().with_object_bytes("bucket", "z/data.csv.gz", 5, body);
        let mut cfg = config(&["z"], "gz");
        cfg.csv_delimiter = ";".to_string();
        let mut reader = ObjectStorageReader::new(binding, &cfg).await.unwrap();

        let mut stream = reader.next_stream().await.unwrap().unwrap();
        assert_eq!(stream.name(), "data");
        assert_eq!(
            stream.collect_records().await.unwrap(),
            vec![json!({"a": "1", "b": "2"}).as_object().unwrap().clone()]
        );
    }
}
