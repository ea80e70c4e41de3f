// ai
//! 🚰 The pipeline: one reader in, every writer out, one record at a time.
//!
//! 🎬 *[the reader hands over a stream. the stream hands over a record. the record is copied]*
//! *[to every writer. nobody moves on until everybody has it. this is called backpressure,]*
//! *[and also called "being polite".]*
//!
//! 🧠 Knowledge graph:
//! - Streams are processed strictly in the order the reader yields them.
//! - For each stream: `open_stream` on every writer, pump records, `close_stream` on every writer.
//! - A failed stream aborts the run, unless `skip_failed_streams` is on. Then it is logged,
//!   the writers are closed, it shows up as failed in the summary, and the next stream gets its turn.

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::app_config::RuntimeConfig;
use crate::progress::{RunSummary, StreamOutcome, StreamProgress, StreamStatus};
use crate::readers::Reader;
use crate::streams::RecordStream;
use crate::transforms::normalize_keys;
use crate::writers::Writer;

/// 🚀 Drain `reader` into `writers`. Returns what happened, per stream.
pub(crate) async fn run_pipeline<R, W>(
    reader: &mut R,
    writers: &mut [W],
    runtime: &RuntimeConfig,
) -> Result<RunSummary>
where
    R: Reader + Send,
    W: Writer,
{
    let mut summary = RunSummary::default();

    while let Some(mut stream) = reader.next_stream().await? {
        let name = stream.name().to_string();
        info!("🌊 reading stream '{}'", name);
        let mut progress = StreamProgress::new(&name, runtime.show_progress);

        let pumped = pump_stream(&mut stream, writers, runtime.normalize_keys, &mut progress).await;
        progress.finish();

        let status = match pumped {
            Ok(()) => {
                info!("✅ stream '{}' done: {} records", name, progress.records());
                StreamStatus::Completed
            }
            Err(err) if runtime.skip_failed_streams => {
                warn!("💀 stream '{}' failed, skipping it: {:#}", name, err);
                for writer in writers.iter_mut() {
                    if let Err(close_err) = writer.close_stream().await {
                        error!("💀 closing '{}' after a failure also failed: {:#}", name, close_err);
                    }
                }
                StreamStatus::Failed(format!("{:#}", err))
            }
            Err(err) => {
                return Err(err.context(format!(
                    "💀 stream '{}' failed after {} records",
                    name,
                    progress.records()
                )));
            }
        };

        summary.streams.push(StreamOutcome {
            name,
            records: progress.records(),
            elapsed: progress.elapsed(),
            status,
        });
    }

    Ok(summary)
}

async fn pump_stream<W: Writer>(
    stream: &mut RecordStream,
    writers: &mut [W],
    normalize: bool,
    progress: &mut StreamProgress,
) -> Result<()> {
    for writer in writers.iter_mut() {
        writer.open_stream(stream.name()).await?;
    }

    while let Some(record) = stream.next_record().await? {
        let record = if normalize { normalize_keys(record) } else { record };
        for writer in writers.iter_mut() {
            writer
                .write_record(&record)
                .await
                .with_context(|| format!("💀 {:?} rejected a record", writer))?;
        }
        progress.record();
    }

    for writer in writers.iter_mut() {
        writer.close_stream().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Record;
    use crate::error::AckError;
    use crate::writers::in_mem::InMemoryWriter;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;

    /// 🧪 A reader that hands out prepared streams.
    #[derive(Debug)]
    struct ScriptedReader {
        streams: VecDeque<RecordStream>,
    }

    #[async_trait]
    impl Reader for ScriptedReader {
        async fn next_stream(&mut self) -> Result<Option<RecordStream>> {
            Ok(self.streams.pop_front())
        }
    }

    fn record(value: serde_json::Value) -> Record {
        value.as_object().expect("💀 test records are objects").clone()
    }

    fn runtime(normalize_keys: bool, skip_failed_streams: bool) -> RuntimeConfig {
        RuntimeConfig {
            normalize_keys,
            skip_failed_streams,
            show_progress: false,
        }
    }

    /// 🧪 A stream that has already been drained, so its next pull fails.
    async fn spent_stream(name: &str) -> RecordStream {
        let mut spent = RecordStream::from_records(name, vec![]);
        spent.next_record().await.unwrap();
        spent
    }

    #[tokio::test]
    async fn the_one_where_every_writer_gets_the_same_records() {
        let mut reader = ScriptedReader {
            streams: VecDeque::from(vec![
                RecordStream::from_records("a", vec![record(json!({"x": 1})), record(json!({"x": 2}))]),
                RecordStream::from_records("b", vec![record(json!({"y": 3}))]),
            ]),
        };
        let left = InMemoryWriter::new();
        let right = InMemoryWriter::new();
        let mut writers = vec![left.clone(), right.clone()];

        let summary = run_pipeline(&mut reader, &mut writers, &runtime(false, false))
            .await
            .unwrap();

        assert_eq!(summary.total_records(), 3);
        assert_eq!(summary.failed(), 0);
        let left = left.written.lock().await.clone();
        let right = right.written.lock().await.clone();
        assert_eq!(left, right);
        assert_eq!(left.len(), 2);
        assert_eq!(left[0].0, "a");
        assert_eq!(left[0].1, vec![record(json!({"x": 1})), record(json!({"x": 2}))]);
        assert_eq!(left[1].0, "b");
    }

    #[tokio::test]
    async fn the_one_where_keys_are_normalized_on_the_way_out() {
        let mut reader = ScriptedReader {
            streams: VecDeque::from(vec![RecordStream::from_records(
                "n",
                vec![record(json!({"Cost (USD)": null}))],
            )]),
        };
        let sink = InMemoryWriter::new();
        let mut writers = vec![sink.clone()];
        run_pipeline(&mut reader, &mut writers, &runtime(true, false))
            .await
            .unwrap();
        assert_eq!(
            sink.written.lock().await[0].1,
            vec![record(json!({"Cost__USD": ""}))]
        );
    }

    #[tokio::test]
    async fn the_one_where_a_broken_stream_stops_the_show() {
        let mut reader = ScriptedReader {
            streams: VecDeque::from(vec![
                spent_stream("broken").await,
                RecordStream::from_records("never", vec![record(json!({"z": 1}))]),
            ]),
        };
        let sink = InMemoryWriter::new();
        let mut writers = vec![sink.clone()];
        let err = run_pipeline(&mut reader, &mut writers, &runtime(false, false))
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("broken"));
        assert!(matches!(
            err.downcast_ref::<AckError>(),
            Some(AckError::StreamExhausted(_))
        ));
        assert_eq!(sink.written.lock().await.len(), 1, "💀 the second stream should never open");
    }

    #[tokio::test]
    async fn the_one_where_skip_failed_streams_lets_the_show_go_on() {
        let mut reader = ScriptedReader {
            streams: VecDeque::from(vec![
                spent_stream("broken").await,
                RecordStream::from_records("fine", vec![record(json!({"z": 1}))]),
            ]),
        };
        let sink = InMemoryWriter::new();
        let mut writers = vec![sink.clone()];
        let summary = run_pipeline(&mut reader, &mut writers, &runtime(false, true))
            .await
            .unwrap();

        assert_eq!(summary.streams.len(), 2);
        assert!(matches!(summary.streams[0].status, StreamStatus::Failed(_)));
        assert_eq!(summary.streams[1].status, StreamStatus::Completed);
        assert_eq!(summary.streams[1].records, 1);
        let written = sink.written.lock().await;
        assert_eq!(written[1], ("fine".to_string(), vec![record(json!({"z": 1}))]));
    }
}
