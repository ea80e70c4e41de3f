// ai
//! 💀 The five horsemen of the object-storage apocalypse.
//!
//! Everything in ack returns `anyhow::Result`, because life is short and `?` is shorter.
//! But some failures deserve a name tag, so callers (and tests) can tell a missing bucket
//! from a malformed CSV without grepping error strings at 3am.
//!
//! 🧠 Knowledge graph:
//! - Raised bare, never wrapped in `.context(...)`, so `err.downcast_ref::<AckError>()` finds them.
//! - `Configuration` fires before any network call. Fail fast, fail cheap.
//! - `Decode` is scoped to ONE stream. Sibling streams keep living their best lives.
//! - `StreamExhausted` is what you get for iterating a single-pass stream twice. Greedy.

use thiserror::Error;

/// 🏷️ Classified failures. Everything else is an untyped `anyhow::Error` with context attached.
#[derive(Debug, Error)]
pub enum AckError {
    /// 🔒 The backend looked at our credentials and said "who are you?"
    #[error("💀 {platform} rejected the credentials: {reason}")]
    Authentication { platform: &'static str, reason: String },

    /// 🪣 We went looking for a bucket and found only the buckets we did not ask for.
    #[error("💀 {bucket} bucket does not exist. available buckets are {available:?}")]
    BucketNotFound {
        bucket: String,
        available: Vec<String>,
    },

    /// 🔧 The config is wrong. No network was harmed in the making of this error.
    #[error("💀 configuration error: {0}")]
    Configuration(String),

    /// 📄 One line of one object refused to become a record.
    #[error("💀 failed to decode '{object}' at line {line}: {reason} (raw: {raw:?})")]
    Decode {
        object: String,
        line: u64,
        reason: String,
        raw: String,
    },

    /// 🏁 Single-pass means single-pass. The stream is done. Let it rest.
    #[error("💀 record stream '{0}' is exhausted; record streams can only be consumed once")]
    StreamExhausted(String),
}

impl AckError {
    /// 🔧 Shorthand for the most common complaint in this crate.
    pub(crate) fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration(reason.into())
    }
}
