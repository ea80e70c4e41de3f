// AI
//! 📊 progress.rs: "Are we there yet?" asked once per stream.
//!
//! 🚀 Two things live here: a per-stream spinner so you can watch records fly by, and a
//! [`RunSummary`] table at the end so you can screenshot it for the standup.
//!
//! ⚠️ The spinner draws on stderr and indicatif hides it when stderr is not a terminal.
//! CI logs stay clean. Your terminal gets the show.

use std::fmt;
use std::time::{Duration, Instant};

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use indicatif::{ProgressBar, ProgressStyle};

/// 🔢 "1000000" → "1,000,000". Eyes, you're welcome.
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// ⏱️ MM:SS, or HH:MM:SS for the long hauls.
fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// 🌀 A spinner for one stream: name, records so far, records per second.
pub(crate) struct StreamProgress {
    bar: ProgressBar,
    records: u64,
    started: Instant,
}

impl fmt::Debug for StreamProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // -- ProgressBar does not derive Debug, and printing a terminal widget is a choice
        f.debug_struct("StreamProgress")
            .field("records", &self.records)
            .finish()
    }
}

impl StreamProgress {
    pub(crate) fn new(stream_name: &str, enabled: bool) -> Self {
        let bar = if enabled {
            ProgressBar::new_spinner()
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) =
            ProgressStyle::with_template("{spinner:.cyan} {msg} | {pos} records | {per_sec} | {elapsed}")
        {
            bar.set_style(style);
        }
        bar.set_message(stream_name.to_string());
        if enabled {
            bar.enable_steady_tick(Duration::from_millis(120));
        }
        Self {
            bar,
            records: 0,
            started: Instant::now(),
        }
    }

    pub(crate) fn record(&mut self) {
        self.records += 1;
        self.bar.inc(1);
    }

    pub(crate) fn records(&self) -> u64 {
        self.records
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// ✅ Stop spinning and leave nothing behind. The summary table tells the story.
    pub(crate) fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// 🏁 How one stream ended.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamStatus {
    Completed,
    /// 💀 Skipped after a failure. Carries the rendered error chain.
    Failed(String),
}

/// 📄 One row of the run summary.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamOutcome {
    pub name: String,
    pub records: u64,
    pub elapsed: Duration,
    pub status: StreamStatus,
}

/// 📊 What a run did, stream by stream. `Display` renders it as a table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub streams: Vec<StreamOutcome>,
}

impl RunSummary {
    pub fn total_records(&self) -> u64 {
        self.streams.iter().map(|s| s.records).sum()
    }

    pub fn failed(&self) -> usize {
        self.streams
            .iter()
            .filter(|s| matches!(s.status, StreamStatus::Failed(_)))
            .count()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["stream", "records", "elapsed", "status"]);

        for stream in &self.streams {
            let status = match &stream.status {
                StreamStatus::Completed => "✅ ok".to_string(),
                StreamStatus::Failed(reason) => format!("💀 {}", reason),
            };
            table.add_row(vec![
                Cell::new(&stream.name),
                Cell::new(format_number(stream.records)).set_alignment(CellAlignment::Right),
                Cell::new(format_duration(stream.elapsed)).set_alignment(CellAlignment::Right),
                Cell::new(status),
            ]);
        }
        table.add_row(vec![
            Cell::new(format!("{} stream(s)", self.streams.len())),
            Cell::new(format_number(self.total_records())).set_alignment(CellAlignment::Right),
            Cell::new(""),
            Cell::new(format!("{} failed", self.failed())),
        ]);
        write!(f, "{}", table)
    }
}
