// ai
//! 📺 StdoutWriter: NDJSON straight to the terminal, or to whatever `|` is pointing at.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncWriteExt, BufWriter, Stdout};
use tracing::debug;

use super::{Writer, to_ndjson_line};
use crate::common::Record;

/// 📋 `[[writers]] Stdout = {}`. Nothing to configure. Blissful.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct StdoutWriterConfig {}

#[derive(Debug)]
pub(crate) struct StdoutWriter {
    out: BufWriter<Stdout>,
    stream: Option<String>,
}

impl StdoutWriter {
    pub(crate) fn new() -> Self {
        Self {
            out: BufWriter::new(tokio::io::stdout()),
            stream: None,
        }
    }
}

#[async_trait]
impl Writer for StdoutWriter {
    async fn open_stream(&mut self, name: &str) -> Result<()> {
        debug!("📺 streaming '{}' to stdout", name);
        self.stream = Some(name.to_string());
        Ok(())
    }

    async fn write_record(&mut self, record: &Record) -> Result<()> {
        self.out.write_all(&to_ndjson_line(record)?).await?;
        Ok(())
    }

    async fn close_stream(&mut self) -> Result<()> {
        self.out.flush().await?;
        self.stream = None;
        Ok(())
    }
}
