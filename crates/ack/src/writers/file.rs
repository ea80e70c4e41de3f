// ai
//! 📁 FileWriter: one NDJSON file per stream, or every stream into one fixed file.
//!
//! Stream names can contain slashes (`dest_key_split` keeps folders in the name), so parent
//! directories are created on demand. A path is truncated the first time this writer opens
//! it during a run and appended to after that, so two streams that land on the same file
//! both survive.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{info, trace};

use super::{Writer, to_ndjson_line};
use crate::common::Record;

/// 📋 `[[writers]] File = { directory = "out" }`
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct FileWriterConfig {
    pub directory: PathBuf,
    /// 🏷️ Fixed output file name. When unset, each stream writes `{name}.njson`.
    #[serde(default)]
    pub file_name: Option<String>,
}

#[derive(Debug)]
struct OpenFile {
    path: PathBuf,
    buf: BufWriter<File>,
    records: u64,
}

#[derive(Debug)]
pub(crate) struct FileWriter {
    config: FileWriterConfig,
    current: Option<OpenFile>,
    /// 🗂️ Paths already truncated during this run.
    touched: HashSet<PathBuf>,
}

impl FileWriter {
    pub(crate) fn new(config: FileWriterConfig) -> Self {
        Self {
            config,
            current: None,
            touched: HashSet::new(),
        }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        match &self.config.file_name {
            Some(fixed) => self.config.directory.join(fixed),
            None => self.config.directory.join(format!("{}.njson", name)),
        }
    }
}

#[async_trait]
impl Writer for FileWriter {
    async fn open_stream(&mut self, name: &str) -> Result<()> {
        if self.current.is_some() {
            self.close_stream().await?;
        }
        let path = self.path_for(name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("💀 could not create output directory '{}'", parent.display()))?;
        }

        let first_visit = self.touched.insert(path.clone());
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(first_visit)
            .append(!first_visit)
            .open(&path)
            .await
            .with_context(|| format!("💀 the output file '{}' could not be opened", path.display()))?;

        trace!("📂 stream '{}' → {}", name, path.display());
        self.current = Some(OpenFile {
            path,
            buf: BufWriter::new(file),
            records: 0,
        });
        Ok(())
    }

    async fn write_record(&mut self, record: &Record) -> Result<()> {
        let Some(open) = self.current.as_mut() else {
            anyhow::bail!("💀 file writer got a record with no open stream");
        };
        open.buf.write_all(&to_ndjson_line(record)?).await?;
        open.records += 1;
        Ok(())
    }

    async fn close_stream(&mut self) -> Result<()> {
        let Some(mut open) = self.current.take() else {
            return Ok(());
        };
        open.buf
            .flush()
            .await
            .with_context(|| format!("💀 flushing '{}' failed", open.path.display()))?;
        info!("💾 wrote {} records to {}", open.records, open.path.display());
        Ok(())
    }
}
