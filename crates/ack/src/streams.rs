// ai
//! 🌊 RecordStream: one selected object, decoded lazily, consumed once.
//!
//! 🎬 *[a record stream is born. it has a name. it has a destiny. it has not downloaded anything yet.]*
//!
//! 🧠 Knowledge graph:
//! - A stream starts `Pending`: it knows its object and its format, nothing more.
//! - First `next_record()` spools the object into an anonymous temp file, rewinds it,
//!   and swaps in a [`RecordDecoder`]. The temp file is unlinked on creation, so it
//!   vanishes when the decoder drops, crash or no crash.
//! - Decoders are synchronous (std reads, gzip inflate, csv parsing). They run on the blocking
//!   pool, `DECODE_BATCH` records per hop, so the async workers only ever pop from a queue.
//! - `Ok(None)` is returned exactly once. After that, or after any error, the stream
//!   is `Exhausted` and every call is `AckError::StreamExhausted`.
//! - The stream is never shared. `&mut self` all the way down. 🦆

use std::collections::VecDeque;
use std::io::{BufReader, Seek, SeekFrom};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::common::Record;
use crate::error::AckError;
use crate::formats::{FileFormat, RecordDecoder};

/// 📥 The deferred download behind a pending stream. Implemented once per engine, not per backend.
#[async_trait]
pub(crate) trait ObjectFetch: Send + Sync {
    /// 🗝️ Key of the object this fetch will pull.
    fn key(&self) -> &str;
    /// 🚚 Copy the full object body into `dest`. Returns bytes written.
    async fn fetch_into(&self, dest: &mut (dyn AsyncWrite + Send + Unpin)) -> Result<u64>;
}

/// 📦 Records decoded per trip to the blocking pool.
const DECODE_BATCH: usize = 1024;

/// 🔚 What the decoder did after filling (or failing to fill) a batch.
enum BatchTail {
    More(Box<dyn RecordDecoder>),
    End,
    Failed(anyhow::Error),
}

enum StreamState {
    Pending {
        fetch: Box<dyn ObjectFetch>,
        format: FileFormat,
    },
    Decoding {
        ready: VecDeque<Record>,
        tail: BatchTail,
    },
    Buffered(VecDeque<Record>),
    Exhausted,
}

/// 🌊 A named, single-pass sequence of records from one object.
pub struct RecordStream {
    name: String,
    state: StreamState,
}

impl std::fmt::Debug for RecordStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- decoders hold file handles and csv state, none of which debug-prints nicely
        let state = match &self.state {
            StreamState::Pending { .. } => "pending",
            StreamState::Decoding { .. } => "decoding",
            StreamState::Buffered(_) => "buffered",
            StreamState::Exhausted => "exhausted",
        };
        f.debug_struct("RecordStream")
            .field("name", &self.name)
            .field("state", &state)
            .finish()
    }
}

impl RecordStream {
    pub(crate) fn pending(name: String, fetch: Box<dyn ObjectFetch>, format: FileFormat) -> Self {
        Self {
            name,
            state: StreamState::Pending { fetch, format },
        }
    }

    /// 📦 A stream over records that already live in memory. No download, same single-pass rules.
    pub fn from_records(name: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            name: name.into(),
            state: StreamState::Buffered(records.into()),
        }
    }

    /// 🏷️ Output-facing name: the key remainder after the group prefix, suffix stripped.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 📄 Pull the next record. Downloads the object on the very first call.
    pub async fn next_record(&mut self) -> Result<Option<Record>> {
        let mut state = std::mem::replace(&mut self.state, StreamState::Exhausted);
        loop {
            state = match state {
                StreamState::Exhausted => {
                    return Err(AckError::StreamExhausted(self.name.clone()).into());
                }
                StreamState::Buffered(mut records) => {
                    let next = records.pop_front();
                    if next.is_some() {
                        self.state = StreamState::Buffered(records);
                    }
                    return Ok(next);
                }
                // -- a failed download leaves the stream Exhausted, no retry
                StreamState::Pending { fetch, format } => StreamState::Decoding {
                    ready: VecDeque::new(),
                    tail: BatchTail::More(open_decoder(fetch, &format).await?),
                },
                StreamState::Decoding { mut ready, tail } => {
                    if let Some(record) = ready.pop_front() {
                        self.state = StreamState::Decoding { ready, tail };
                        return Ok(Some(record));
                    }
                    // -- records decoded before a failure are handed out first
                    match tail {
                        BatchTail::More(decoder) => {
                            let (ready, tail) = decode_batch(decoder).await?;
                            StreamState::Decoding { ready, tail }
                        }
                        BatchTail::End => return Ok(None),
                        BatchTail::Failed(err) => return Err(err),
                    }
                }
            };
        }
    }

    /// 🧺 Drain every remaining record. Handy for tests, deadly for 40GB objects.
    pub async fn collect_records(&mut self) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        while let Some(record) = self.next_record().await? {
            records.push(record);
        }
        Ok(records)
    }
}

/// 🚚 Spool the object to an unlinked temp file, rewind, and hand the bytes to a decoder.
async fn open_decoder(
    fetch: Box<dyn ObjectFetch>,
    format: &FileFormat,
) -> Result<Box<dyn RecordDecoder>> {
    let spool = tempfile::tempfile().context("💀 could not create a temp file to spool the object into")?;
    let mut spool = tokio::fs::File::from_std(spool);

    let bytes = fetch
        .fetch_into(&mut spool)
        .await
        .with_context(|| format!("💀 failed to download '{}'", fetch.key()))?;
    spool.flush().await?;

    let mut spool = spool.into_std().await;
    spool
        .seek(SeekFrom::Start(0))
        .context("💀 could not rewind the spooled object")?;
    trace!("📥 spooled {} bytes of '{}'", bytes, fetch.key());

    Ok(format.decoder(fetch.key(), Box::new(BufReader::new(spool))))
}

/// 🧵 Decode up to `DECODE_BATCH` records on the blocking pool.
async fn decode_batch(mut decoder: Box<dyn RecordDecoder>) -> Result<(VecDeque<Record>, BatchTail)> {
    tokio::task::spawn_blocking(move || {
        let mut records = VecDeque::with_capacity(DECODE_BATCH);
        while records.len() < DECODE_BATCH {
            match decoder.next_record() {
                Ok(Some(record)) => records.push_back(record),
                Ok(None) => return (records, BatchTail::End),
                Err(err) => return (records, BatchTail::Failed(err)),
            }
        }
        (records, BatchTail::More(decoder))
    })
    .await
    .context("💀 the decoding thread fell over")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 🧪 A fetch that serves fixed bytes and counts how often it was asked.
    pub(crate) struct CannedFetch {
        pub(crate) key: String,
        pub(crate) body: Vec<u8>,
        pub(crate) calls: Arc<AtomicUsize>,
        pub(crate) fail: bool,
    }

    #[async_trait]
    impl ObjectFetch for CannedFetch {
        fn key(&self) -> &str {
            &self.key
        }

        async fn fetch_into(&self, dest: &mut (dyn AsyncWrite + Send + Unpin)) -> Result<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("connection reset by a very tired peer");
            }
            dest.write_all(&self.body).await?;
            Ok(self.body.len() as u64)
        }
    }

    fn canned(body: &str, fail: bool) -> (RecordStream, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetch = CannedFetch {
            key: "dir/a.csv".to_string(),
            body: body.as_bytes().to_vec(),
            calls: calls.clone(),
            fail,
        };
        let format = FileFormat::Csv {
            delimiter: b',',
            fieldnames: None,
        };
        (
            RecordStream::pending("a".to_string(), Box::new(fetch), format),
            calls,
        )
    }

    #[tokio::test]
    async fn the_one_where_nothing_downloads_until_someone_asks() {
        let (mut stream, calls) = canned("k\nv1\nv2\n", false);
        assert_eq!(stream.name(), "a");
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let first = stream.next_record().await.unwrap();
        assert_eq!(first, Some(json!({"k": "v1"}).as_object().unwrap().clone()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        stream.next_record().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1, "💀 downloaded twice. the egress bill remembers.");
    }

    #[tokio::test]
    async fn the_one_where_the_end_is_announced_once_then_the_stream_is_exhausted() {
        let (mut stream, _) = canned("k\nv1\n", false);
        assert_eq!(stream.collect_records().await.unwrap().len(), 1);

        let err = stream.next_record().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AckError>(),
            Some(AckError::StreamExhausted(name)) if name == "a"
        ));
    }

    #[tokio::test]
    async fn the_one_where_a_failed_download_exhausts_the_stream() {
        let (mut stream, calls) = canned("k\nv1\n", true);
        let err = stream.next_record().await.unwrap_err();
        assert!(format!("{:#}", err).contains("dir/a.csv"));

        let again = stream.next_record().await.unwrap_err();
        assert!(matches!(
            again.downcast_ref::<AckError>(),
            Some(AckError::StreamExhausted(_))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn the_one_where_a_decode_error_ends_only_this_stream() {
        let (mut stream, _) = canned("a\nok\n1,2\n", false);
        assert!(stream.next_record().await.unwrap().is_some());
        let err = stream.next_record().await.unwrap_err();
        assert!(matches!(err.downcast_ref::<AckError>(), Some(AckError::Decode { .. })));
        assert!(stream.next_record().await.is_err());
    }

    #[tokio::test]
    async fn the_one_where_buffered_streams_play_by_the_same_rules() {
        let record = json!({"x": 1}).as_object().unwrap().clone();
        let mut stream = RecordStream::from_records("mem", vec![record.clone()]);
        assert_eq!(stream.next_record().await.unwrap(), Some(record));
        assert_eq!(stream.next_record().await.unwrap(), None);
        assert!(stream.next_record().await.is_err());
    }

    #[tokio::test]
    async fn the_one_where_the_rows_outnumber_a_single_batch() {
        let rows = DECODE_BATCH * 2 + 3;
        let body: String = std::iter::once("n\n".to_string())
            .chain((0..rows).map(|i| format!("{}\n", i)))
            .collect();
        let (mut stream, calls) = canned(&body, false);

        let records = stream.collect_records().await.unwrap();
        assert_eq!(records.len(), rows);
        assert_eq!(records[DECODE_BATCH]["n"], DECODE_BATCH.to_string());
        assert_eq!(records[rows - 1]["n"], (rows - 1).to_string());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(stream.next_record().await.is_err());
    }
}
