// ai
//! 📡 NDJSON → Record. One line, one JSON object, one record. Blank lines are ignored.
//!
//! Anything that parses as JSON but isn't an object (a bare number, an array, a lonely
//! `null`) is a decode error. Records are maps. That's the deal.

use std::io::BufRead;

use anyhow::Result;
use serde_json::Value;

use super::RecordDecoder;
use crate::common::Record;
use crate::error::AckError;

pub(crate) struct NdJsonDecoder {
    object: String,
    reader: Box<dyn BufRead + Send>,
    line: u64,
    buf: Vec<u8>,
}

impl NdJsonDecoder {
    pub(crate) fn new(object: &str, reader: Box<dyn BufRead + Send>) -> Self {
        Self {
            object: object.to_string(),
            reader,
            line: 0,
            buf: Vec::with_capacity(4096),
        }
    }

    fn decode_error(&self, reason: impl Into<String>, raw: &[u8]) -> anyhow::Error {
        AckError::Decode {
            object: self.object.clone(),
            line: self.line,
            reason: reason.into(),
            raw: String::from_utf8_lossy(raw).into_owned(),
        }
        .into()
    }
}

impl RecordDecoder for NdJsonDecoder {
    fn next_record(&mut self) -> Result<Option<Record>> {
        loop {
            self.buf.clear();
            let read = match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(read) => read,
                Err(err) => return Err(self.decode_error(err.to_string(), &[])),
            };
            if read == 0 {
                return Ok(None);
            }
            self.line += 1;

            let line = self.buf.trim_ascii();
            if line.is_empty() {
                continue;
            }
            return match serde_json::from_slice::<Value>(line) {
                Ok(Value::Object(record)) => Ok(Some(record)),
                Ok(other) => Err(self.decode_error(
                    format!("expected a JSON object, got {}", json_kind(&other)),
                    line,
                )),
                Err(err) => Err(self.decode_error(err.to_string(), line)),
            };
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
