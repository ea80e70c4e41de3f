// ai
//! 🔤 Formats: bytes in, records out.
//!
//! 🎬 *[a gzip file walks into a bar. the bartender asks what it's having.]*
//! *["I'll tell you once you decompress me," it says.]*
//!
//! 🧠 Knowledge graph:
//! - [`FileFormat`] is a closed enum resolved ONCE at reader construction. No per-object
//!   string sniffing, no dynamic dispatch on file extensions.
//! - [`RecordDecoder`] is the pull-based contract: one `next_record()` call, one record.
//!   Decoders read from a `BufRead`, so a 40GB object costs one buffer of RAM, not 40GB.
//! - `Gzip(inner)` wraps the byte source in a `MultiGzDecoder` and hands off to `inner`.
//!   `gz` alone means gzip-compressed CSV, unless `compressed_format` says otherwise.
//! - Pattern: enum → `decoder()` factory → `Box<dyn RecordDecoder>`, same shape as the
//!   backend enums. The compiler is the QA team. 🧪

mod csv_decoder;
mod ndjson_decoder;

use std::io::{BufRead, BufReader};

use anyhow::Result;
use flate2::bufread::MultiGzDecoder;

use crate::common::Record;
use crate::error::AckError;

pub(crate) use csv_decoder::CsvDecoder;
pub(crate) use ndjson_decoder::NdJsonDecoder;

/// 📜 The formats a reader can be configured with. Anything else is a `ConfigurationError`.
pub const SUPPORTED_FORMATS: [&str; 3] = ["csv", "gz", "njson"];

/// 📄 A pull-based decoder over one object's bytes.
///
/// # Contract 📜
/// - `Ok(Some(record))` while rows remain.
/// - `Ok(None)` at end of input.
/// - `Err(AckError::Decode { .. })` when a row is corrupt. Callers must not keep pulling after that.
pub trait RecordDecoder: Send {
    /// 📦 Decode the next record, reading only as many bytes as that takes.
    fn next_record(&mut self) -> Result<Option<Record>>;
}

/// 🎭 The many faces of an object's content.
#[derive(Debug, Clone, PartialEq)]
pub enum FileFormat {
    /// 📑 Delimited text. Header row supplies field names unless `fieldnames` is set.
    Csv {
        delimiter: u8,
        fieldnames: Option<Vec<String>>,
    },
    /// 🫁 Gzip around another format. Never around another gzip.
    Gzip(Box<FileFormat>),
    /// 📡 One JSON object per line.
    NdJson,
}

impl FileFormat {
    /// 🔧 Resolve the configured format and its CSV knobs into a [`FileFormat`].
    ///
    /// Pure function. Touches no network, no disk, no feelings.
    /// 💀 `AckError::Configuration` for unknown formats, bad delimiters, or fieldnames that aren't a JSON list.
    pub fn from_parts(
        format: &str,
        csv_delimiter: &str,
        csv_fieldnames: Option<&str>,
        compressed_format: Option<&str>,
    ) -> Result<Self> {
        match format {
            "csv" => Ok(FileFormat::Csv {
                delimiter: parse_csv_delimiter(csv_delimiter)?,
                fieldnames: csv_fieldnames.map(parse_csv_fieldnames).transpose()?,
            }),
            "njson" => Ok(FileFormat::NdJson),
            "gz" => {
                let inner = compressed_format.unwrap_or("csv");
                if inner == "gz" {
                    return Err(AckError::configuration(
                        "compressed_format cannot be 'gz'; gzip inside gzip is a cry for help",
                    )
                    .into());
                }
                let inner = FileFormat::from_parts(inner, csv_delimiter, csv_fieldnames, None)?;
                Ok(FileFormat::Gzip(Box::new(inner)))
            }
            other => Err(AckError::configuration(format!(
                "unsupported format '{}', expected one of {:?}",
                other, SUPPORTED_FORMATS
            ))
            .into()),
        }
    }

    /// 🏷️ The file extension an object must carry to be a candidate.
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Csv { .. } => "csv",
            FileFormat::Gzip(_) => "gz",
            FileFormat::NdJson => "njson",
        }
    }

    /// 🔍 Does this key end in `.{extension}`? Case-sensitive, no mercy.
    pub fn matches_key(&self, key: &str) -> bool {
        key.strip_suffix(self.extension())
            .is_some_and(|stem| stem.ends_with('.'))
    }

    /// ✂️ Peel the format suffix off a name: `a.csv` → `a`, `a.csv.gz` → `a`, `a.gz` → `a`.
    pub fn strip_suffix<'a>(&self, name: &'a str) -> &'a str {
        let Some(stem) = name
            .strip_suffix(self.extension())
            .and_then(|stem| stem.strip_suffix('.'))
        else {
            return name;
        };
        match self {
            FileFormat::Gzip(inner) => inner.strip_suffix(stem),
            _ => stem,
        }
    }

    /// 🏭 Build a decoder over `reader`. `object` only shows up in error messages.
    pub fn decoder(&self, object: &str, reader: Box<dyn BufRead + Send>) -> Box<dyn RecordDecoder> {
        match self {
            FileFormat::Csv {
                delimiter,
                fieldnames,
            } => Box::new(CsvDecoder::new(
                object,
                reader,
                *delimiter,
                fieldnames.clone(),
            )),
            FileFormat::NdJson => Box::new(NdJsonDecoder::new(object, reader)),
            FileFormat::Gzip(inner) => {
                let inflated = BufReader::new(MultiGzDecoder::new(reader));
                inner.decoder(object, Box::new(inflated))
            }
        }
    }
}

/// 🔧 `","` stays `,`. `"tab"` becomes `\t`. `"\\t"` also becomes `\t`. Multi-byte delimiters get a 💀.
fn parse_csv_delimiter(raw: &str) -> Result<u8> {
    let unescaped = match raw {
        "tab" => "\t".to_string(),
        "newline" => "\n".to_string(),
        other => unescape(other)?,
    };
    match unescaped.as_bytes() {
        [single] if single.is_ascii() => Ok(*single),
        _ => Err(AckError::configuration(format!(
            "csv_delimiter must be a single ASCII character, got {:?}",
            raw
        ))
        .into()),
    }
}

/// 🧵 Minimal backslash-escape decoding for delimiters typed into TOML or env vars.
fn unescape(raw: &str) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                let byte = u8::from_str_radix(&hex, 16).map_err(|_| {
                    AckError::configuration(format!("bad \\x escape in csv_delimiter {:?}", raw))
                })?;
                out.push(char::from(byte));
            }
            other => {
                return Err(AckError::configuration(format!(
                    "unknown escape \\{} in csv_delimiter {:?}",
                    other.map(String::from).unwrap_or_default(),
                    raw
                ))
                .into());
            }
        }
    }
    Ok(out)
}

/// 📋 `csv_fieldnames` arrives as a JSON list in a string, e.g. `'["a", "b"]'`.
fn parse_csv_fieldnames(raw: &str) -> Result<Vec<String>> {
    serde_json::from_str::<Vec<String>>(raw).map_err(|e| {
        AckError::configuration(format!(
            "csv_fieldnames must be a JSON list of strings, got {:?}: {}",
            raw, e
        ))
        .into()
    })
}
