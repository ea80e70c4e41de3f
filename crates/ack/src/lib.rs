// ai
//! 🪣 ack: read the newest object per group out of a bucket, decode it, hand the records to writers.
//!
//! 🎬 *[narrator voice]* "Forty files went into the bucket. One came out. Nobody asked the other thirty-nine."
//!
//! 🧠 Knowledge graph:
//! - [`app_config`]: figment-loaded [`AppConfig`](app_config::AppConfig) (reader, writers, runtime knobs).
//! - `readers`: one listing/selection engine, generic over a platform binding (S3, GCS, Azure, local, RAM).
//! - [`formats`]: csv, gzip and NDJSON decoders behind one pull-based trait.
//! - [`streams`]: [`RecordStream`](streams::RecordStream), lazy and single-pass.
//! - `writers`: where records land (files, stdout, RAM).
//! - `pipeline`: the loop that connects the two ends, one record at a time.

use anyhow::{Context, Result};
use tracing::info;

pub mod app_config;
pub mod common;
pub mod error;
pub mod formats;
pub mod streams;

mod pipeline;
mod progress;
mod readers;
mod transforms;
mod writers;

pub use common::Record;
pub use progress::{RunSummary, StreamOutcome, StreamStatus};

use app_config::AppConfig;
use error::AckError;
use readers::ReaderBackend;
use writers::WriterBackend;

/// 🚀 Build the configured reader and writers, then drain every stream.
///
/// 💀 Fails before touching the network when no writer is configured or the reader config is malformed.
pub async fn run(app_config: AppConfig) -> Result<RunSummary> {
    if app_config.writers.is_empty() {
        return Err(AckError::configuration("at least one [[writers]] entry is required").into());
    }

    let mut reader = ReaderBackend::from_config(&app_config.reader)
        .await
        .context("💀 could not set up the reader")?;
    let mut writers: Vec<WriterBackend> = app_config.writers.iter().map(WriterBackend::from_config).collect();
    info!("🚰 {:?} feeding {} writer(s)", reader, writers.len());

    pipeline::run_pipeline(&mut reader, &mut writers, &app_config.runtime).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::{
        InMemoryObjectConfig, InMemoryReaderConfig, InMemoryWriterConfig, ObjectStorageConfig, ReaderConfig,
        RuntimeConfig, WriterConfig,
    };

    fn in_memory_app(writers: Vec<WriterConfig>, format: &str) -> AppConfig {
        AppConfig {
            reader: ReaderConfig::InMemory(InMemoryReaderConfig {
                storage: ObjectStorageConfig {
                    bucket: "demo".to_string(),
                    prefix: vec!["exports/".to_string()],
                    format: format.to_string(),
                    dest_key_split: -1,
                    csv_delimiter: ",".to_string(),
                    csv_fieldnames: None,
                    compressed_format: None,
                },
                objects: vec![
                    InMemoryObjectConfig {
                        key: "exports/a.csv".to_string(),
                        timestamp: 100,
                        body: "id,name\n1,x\n2,y\n".to_string(),
                    },
                    InMemoryObjectConfig {
                        key: "exports/a.njson".to_string(),
                        timestamp: 200,
                        body: "{\"id\": 9}\n".to_string(),
                    },
                ],
            }),
            writers,
            runtime: RuntimeConfig {
                show_progress: false,
                ..RuntimeConfig::default()
            },
        }
    }

    #[tokio::test]
    async fn the_one_where_the_newer_njson_does_not_fool_the_csv_reader() {
        let summary = run(in_memory_app(vec![WriterConfig::InMemory(InMemoryWriterConfig {})], "csv"))
            .await
            .unwrap();
        assert_eq!(summary.streams.len(), 1);
        assert_eq!(summary.streams[0].name, "a");
        assert_eq!(summary.streams[0].records, 2);
        assert_eq!(summary.streams[0].status, StreamStatus::Completed);
    }

    #[tokio::test]
    async fn the_one_where_nobody_is_listening() {
        let err = run(in_memory_app(vec![], "csv")).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AckError>(),
            Some(AckError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn the_one_where_an_unknown_format_fails_before_any_listing() {
        let err = run(in_memory_app(vec![WriterConfig::InMemory(InMemoryWriterConfig {})], "parquet"))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AckError>(),
            Some(AckError::Configuration(_))
        ));
    }
}
