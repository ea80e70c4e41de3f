// ai
//! 🔧 App Configuration: one TOML file, a few env vars, and a struct that pretends it was always one thing.
//!
//! 📡 "Which bucket? Which prefix? Which writers?" The config knows. The config always knows.
//!
//! 🧠 Knowledge graph:
//! - `ACK_*` env vars are the base layer, nested keys split on `__`
//!   (`ACK_RUNTIME__SKIP_FAILED_STREAMS=true`). Figment lowercases env keys, so backend
//!   tables like `[reader.S3]` have to come from the file.
//! - The TOML file, when given, is merged on top. TOML wins on conflicts.
//! - `[reader.<Backend>]` picks exactly one reader. `[[writers]]` lists one or more writers.
//! - `[runtime]` is optional. Its defaults are conservative: no key rewriting, abort on first failure.

use std::path::Path;

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;

pub use crate::readers::{
    AzureReaderConfig, GcsReaderConfig, InMemoryObjectConfig, InMemoryReaderConfig, LocalReaderConfig,
    ObjectStorageConfig, ReaderConfig, S3ReaderConfig,
};
pub use crate::writers::{FileWriterConfig, InMemoryWriterConfig, StdoutWriterConfig, WriterConfig};

/// 📦 Everything a run needs to know about itself.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    pub reader: ReaderConfig,
    pub writers: Vec<WriterConfig>,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// 🎛️ Knobs for the pipeline runner, not for any particular backend.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// 🧹 Rewrite keys into warehouse-safe column names, nulls into `""`.
    #[serde(default)]
    pub normalize_keys: bool,
    /// 🦘 Log a failed stream and carry on, instead of aborting the run.
    #[serde(default)]
    pub skip_failed_streams: bool,
    /// 🌀 Per-stream spinner on stderr.
    #[serde(default = "default_show_progress")]
    pub show_progress: bool,
}

fn default_show_progress() -> bool {
    true
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            normalize_keys: false,
            skip_failed_streams: false,
            show_progress: default_show_progress(),
        }
    }
}

/// 🚀 Load the config from `ACK_*` env vars, plus the TOML file when one is given.
///
/// 💀 Fails with the figment error wrapped in a message naming where we looked.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new().merge(Env::prefixed("ACK_").split("__"));
    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (ACK_*). \
             Check that it has exactly one [reader.<Backend>] table and at least one [[writers]] entry.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (ACK_*). \
                 No file was provided, so the env had to carry the whole thing. It could not."
            .to_string(),
    };

    config.extract().context(context_msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_test_config(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("ack.toml");
        // 🧪 Figment reads TOML from disk, so the test does too.
        fs::write(&path, contents).expect("💀 Failed to write test config. The disk said no.");
        path
    }

    #[test]
    fn the_one_where_an_s3_reader_feeds_two_writers() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_config(
            &dir,
            r#"
            [reader.S3]
            bucket = "reports"
            prefix = ["adobe/daily/", "adobe/weekly/"]
            format = "csv"
            dest_key_split = 2
            csv_delimiter = "tab"
            region = "eu-west-1"

            [[writers]]
            File = { directory = "out" }

            [[writers]]
            Stdout = {}

            [runtime]
            normalize_keys = true
            skip_failed_streams = true
            show_progress = false
            "#,
        );

        let app_config = load_config(Some(path.as_path()))
            .expect("💀 A complete S3 config should parse. Serde is having a day otherwise.");

        let ReaderConfig::S3(s3) = &app_config.reader else {
            panic!("💀 Expected an S3 reader, serde delivered {:?}", app_config.reader);
        };
        assert_eq!(s3.region, "eu-west-1");
        assert_eq!(s3.storage.bucket, "reports");
        assert_eq!(s3.storage.prefix.len(), 2);
        assert_eq!(s3.storage.dest_key_split, 2);
        assert_eq!(s3.storage.csv_delimiter, "tab");

        assert_eq!(app_config.writers.len(), 2);
        assert_eq!(
            app_config.writers[0],
            WriterConfig::File(FileWriterConfig {
                directory: PathBuf::from("out"),
                file_name: None,
            })
        );
        assert!(matches!(app_config.writers[1], WriterConfig::Stdout(_)));
        assert_eq!(
            app_config.runtime,
            RuntimeConfig {
                normalize_keys: true,
                skip_failed_streams: true,
                show_progress: false,
            }
        );
    }

    #[test]
    fn the_one_where_the_defaults_fill_in_the_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_config(
            &dir,
            r#"
            [reader.Local]
            root = "/data"
            bucket = "landing"
            prefix = ["in/"]
            format = "njson"

            [[writers]]
            InMemory = {}
            "#,
        );

        let app_config = load_config(Some(path.as_path())).unwrap();
        assert_eq!(app_config.runtime, RuntimeConfig::default());
        assert!(app_config.runtime.show_progress);

        let storage = app_config.reader.storage();
        assert_eq!(storage.dest_key_split, -1);
        assert_eq!(storage.csv_delimiter, ",");
        assert_eq!(storage.csv_fieldnames, None);
        assert_eq!(storage.compressed_format, None);
    }

    #[test]
    fn the_one_where_a_config_without_a_reader_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_config(
            &dir,
            r#"
            [[writers]]
            Stdout = {}
            "#,
        );

        let err = load_config(Some(path.as_path())).unwrap_err();
        assert!(err.to_string().contains("ack.toml"));
    }
}
