// ai
//! 📑 CSV → Record. The header row names the fields, every row after it becomes a map.
//!
//! Rows are pulled one at a time through `csv::Reader::read_byte_record`, so memory stays
//! flat no matter how many rows the marketing team exported. Fields are UTF-8 checked
//! individually; one bad byte poisons one row, and the error says which line.
//!
//! ⚠️ Short rows get `null` for the missing trailing fields. Long rows are a decode error,
//! because silently dropping data is how incident retros get scheduled.

use std::io::BufRead;

use anyhow::Result;
use csv::{ByteRecord, ReaderBuilder};
use serde_json::Value;

use super::RecordDecoder;
use crate::common::Record;
use crate::error::AckError;

pub(crate) struct CsvDecoder {
    object: String,
    reader: csv::Reader<Box<dyn BufRead + Send>>,
    /// 🏷️ `None` until the first pull when names come from the header row.
    fieldnames: Option<Vec<String>>,
    row: ByteRecord,
}

impl CsvDecoder {
    pub(crate) fn new(
        object: &str,
        source: Box<dyn BufRead + Send>,
        delimiter: u8,
        fieldnames: Option<Vec<String>>,
    ) -> Self {
        let reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(fieldnames.is_none())
            .flexible(true)
            .from_reader(source);
        Self {
            object: object.to_string(),
            reader,
            fieldnames,
            row: ByteRecord::new(),
        }
    }

    fn decode_error(&self, line: u64, reason: impl Into<String>, raw: String) -> anyhow::Error {
        AckError::Decode {
            object: self.object.clone(),
            line,
            reason: reason.into(),
            raw,
        }
        .into()
    }

    fn csv_error(&self, err: csv::Error) -> anyhow::Error {
        let line = err.position().map(|p| p.line()).unwrap_or(0);
        self.decode_error(line, err.to_string(), String::new())
    }

    /// 🏷️ Read the header row on first use. Lazy, so construction never touches the bytes.
    fn resolve_fieldnames(&mut self) -> Result<Vec<String>> {
        if let Some(names) = &self.fieldnames {
            return Ok(names.clone());
        }
        let headers = self.reader.byte_headers().cloned();
        let headers = match headers {
            Ok(headers) => headers,
            Err(err) => return Err(self.csv_error(err)),
        };
        let mut names = Vec::with_capacity(headers.len());
        for field in headers.iter() {
            match std::str::from_utf8(field) {
                Ok(name) => names.push(name.to_string()),
                Err(err) => {
                    return Err(self.decode_error(
                        1,
                        format!("header is not valid UTF-8: {}", err),
                        String::from_utf8_lossy(field).into_owned(),
                    ));
                }
            }
        }
        self.fieldnames = Some(names.clone());
        Ok(names)
    }
}

impl RecordDecoder for CsvDecoder {
    fn next_record(&mut self) -> Result<Option<Record>> {
        let fieldnames = self.resolve_fieldnames()?;

        let mut row = std::mem::take(&mut self.row);
        let more = self.reader.read_byte_record(&mut row);
        self.row = row;
        match more {
            Ok(true) => {}
            Ok(false) => return Ok(None),
            Err(err) => return Err(self.csv_error(err)),
        }

        let line = self.row.position().map(|p| p.line()).unwrap_or(0);
        if self.row.len() > fieldnames.len() {
            let raw = String::from_utf8_lossy(self.row.as_slice()).into_owned();
            return Err(self.decode_error(
                line,
                format!(
                    "row has {} fields but only {} field names",
                    self.row.len(),
                    fieldnames.len()
                ),
                raw,
            ));
        }

        let mut record = Record::new();
        for (idx, name) in fieldnames.iter().enumerate() {
            let value = match self.row.get(idx) {
                None => Value::Null,
                Some(bytes) => match std::str::from_utf8(bytes) {
                    Ok(text) => Value::String(text.to_string()),
                    Err(err) => {
                        return Err(self.decode_error(
                            line,
                            format!("field '{}' is not valid UTF-8: {}", name, err),
                            String::from_utf8_lossy(bytes).into_owned(),
                        ));
                    }
                },
            };
            record.insert(name.clone(), value);
        }
        Ok(Some(record))
    }
}
