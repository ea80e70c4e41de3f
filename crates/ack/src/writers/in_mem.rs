// ai
//! 📦 InMemoryWriter: a writer that never forgets. For tests, and for dry runs that only want counts.
//!
//! 🔒 `Arc<Mutex<Vec<..>>>` so a test can keep a clone, hand the writer to the pipeline,
//! and inspect what arrived afterwards.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::info;

use super::Writer;
use crate::common::Record;

/// 📋 `[[writers]] InMemory = {}`
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct InMemoryWriterConfig {}

/// 🗂️ Every stream the writer saw, in order: `(name, records)`.
pub(crate) type WrittenStreams = Arc<Mutex<Vec<(String, Vec<Record>)>>>;

#[derive(Debug, Clone, Default)]
pub(crate) struct InMemoryWriter {
    pub(crate) written: WrittenStreams,
}

impl InMemoryWriter {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Writer for InMemoryWriter {
    async fn open_stream(&mut self, name: &str) -> Result<()> {
        self.written.lock().await.push((name.to_string(), Vec::new()));
        Ok(())
    }

    async fn write_record(&mut self, record: &Record) -> Result<()> {
        let mut written = self.written.lock().await;
        let Some((_, records)) = written.last_mut() else {
            anyhow::bail!("💀 in-memory writer got a record with no open stream");
        };
        records.push(record.clone());
        Ok(())
    }

    async fn close_stream(&mut self) -> Result<()> {
        if let Some((name, records)) = self.written.lock().await.last() {
            info!("🧠 kept {} records of '{}' in memory", records.len(), name);
        }
        Ok(())
    }
}
