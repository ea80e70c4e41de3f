// ai
//! 📦 Common data structures: the building blocks of ack
//!
//! 🎬 COLD OPEN. INT. CLOUD BUCKET, 3:47 AM
//!
//! Somewhere in `s3://marketing-exports/daily/`, forty CSV files sit side by side.
//! Thirty-nine of them are yesterday's news. One of them is the newest. The engine
//! only wants that one. The other thirty-nine will never know they were listed.
//!
//! This module holds the two humble structs that carry that story: a [`StorageObjectRef`]
//! (what the listing told us) and a [`Record`] (what the bytes turned into).
//!
//! 🦆 The duck has read every CSV in the bucket. The duck is tired.

use chrono::{DateTime, Utc};

/// 📄 One decoded row. CSV rows are `field -> string`, NDJSON rows are whatever JSON dreamt up.
///
/// A plain `serde_json::Map` so writers can serialize it without knowing where it came from.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// 🪣 One object as seen by a listing call: its key, when it was last written, and the
/// backend's own raw handle riding along in the sidecar.
///
/// Discovered fresh on every listing. Never mutated, never cached. Like a mayfly, but with metadata.
#[derive(Debug, Clone)]
pub(crate) struct StorageObjectRef<R> {
    /// 🗝️ Backend-native path, unique within its bucket.
    pub key: String,
    /// ⏰ Last-modified instant. Used for ordering only.
    pub timestamp: DateTime<Utc>,
    /// 📦 Whatever the backend handed us. The engine never opens this box.
    pub raw: R,
}

impl<R> StorageObjectRef<R> {
    pub(crate) fn new(key: String, timestamp: DateTime<Utc>, raw: R) -> Self {
        Self {
            key,
            timestamp,
            raw,
        }
    }
}
