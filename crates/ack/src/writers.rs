// ai
//! 🕳️ Writers: where records go to live their second life.
//!
//! The yin to the reader's yang. A writer is told when a stream opens, receives that stream's
//! records one at a time, and is told when it closes. What it does in between is its own business:
//! a file per stream, NDJSON on stdout, or a `Vec` in RAM for tests to poke at.
//!
//! # Contract 📜
//! - `open_stream` → `write_record`* → `close_stream`, strictly in that order, one stream at a time.
//! - `close_stream` MUST flush. Skipping it is a bug. Also rude.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use crate::common::Record;

pub(crate) mod file;
pub(crate) mod in_mem;
pub(crate) mod stdout;

pub use file::FileWriterConfig;
pub use in_mem::InMemoryWriterConfig;
pub use stdout::StdoutWriterConfig;

#[async_trait]
pub(crate) trait Writer: std::fmt::Debug + Send {
    /// 🚪 A new stream begins. `name` is the stream's output-facing name.
    async fn open_stream(&mut self, name: &str) -> Result<()>;
    /// 📥 One record of the currently open stream.
    async fn write_record(&mut self, record: &Record) -> Result<()>;
    /// 🗑️ The current stream is done. Flush, finalize, release.
    async fn close_stream(&mut self) -> Result<()>;
}

/// 📋 One entry of `[[writers]]`. Externally tagged, like the reader config.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub enum WriterConfig {
    File(FileWriterConfig),
    Stdout(StdoutWriterConfig),
    InMemory(InMemoryWriterConfig),
}

/// 🎭 The many faces of a Writer. Mirrors `ReaderBackend` on the other end of the pipe.
#[derive(Debug)]
pub(crate) enum WriterBackend {
    File(file::FileWriter),
    Stdout(stdout::StdoutWriter),
    InMemory(in_mem::InMemoryWriter),
}

impl WriterBackend {
    pub(crate) fn from_config(config: &WriterConfig) -> Self {
        match config {
            WriterConfig::File(c) => WriterBackend::File(file::FileWriter::new(c.clone())),
            WriterConfig::Stdout(_) => WriterBackend::Stdout(stdout::StdoutWriter::new()),
            WriterConfig::InMemory(_) => WriterBackend::InMemory(in_mem::InMemoryWriter::new()),
        }
    }
}

#[async_trait]
impl Writer for WriterBackend {
    async fn open_stream(&mut self, name: &str) -> Result<()> {
        match self {
            WriterBackend::File(w) => w.open_stream(name).await,
            WriterBackend::Stdout(w) => w.open_stream(name).await,
            WriterBackend::InMemory(w) => w.open_stream(name).await,
        }
    }

    async fn write_record(&mut self, record: &Record) -> Result<()> {
        match self {
            WriterBackend::File(w) => w.write_record(record).await,
            WriterBackend::Stdout(w) => w.write_record(record).await,
            WriterBackend::InMemory(w) => w.write_record(record).await,
        }
    }

    async fn close_stream(&mut self) -> Result<()> {
        match self {
            WriterBackend::File(w) => w.close_stream().await,
            WriterBackend::Stdout(w) => w.close_stream().await,
            WriterBackend::InMemory(w) => w.close_stream().await,
        }
    }
}

/// 📡 A record as one NDJSON line, newline included.
pub(crate) fn to_ndjson_line(record: &Record) -> Result<Vec<u8>> {
    let mut line = serde_json::to_vec(record)?;
    line.push(b'\n');
    Ok(line)
}
