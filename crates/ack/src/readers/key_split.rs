// ai
//! ✂️ Key splitting and newest-object selection.
//!
//! `dest_key_split` decides two things from a key: which GROUP it belongs to, and what its
//! stream is CALLED. Each group sends exactly one object downstream, the newest one.
//!
//! ```text
//!   key = "exports/2024/01/report.csv"
//!   -1  → group ""                , name "report.csv"
//!    0  → group ""                , name "exports/2024/01/report.csv"
//!    1  → group "exports"         , name "2024/01/report.csv"
//!    2  → group "exports/2024"    , name "01/report.csv"
//!    9  → group "exports/2024/01" , name "report.csv"      (ran out of slashes)
//! ```

use std::collections::HashMap;

use anyhow::Result;

use crate::common::StorageObjectRef;
use crate::error::AckError;

/// 🔪 How keys are carved into (group, stream name). Resolved once from `dest_key_split`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeySplit {
    /// `-1`: one group per prefix, named by base name.
    WholePrefix,
    /// `n >= 0`: the first `n` segments are the group, the rest is the name.
    Segments(usize),
}

impl KeySplit {
    pub(crate) fn from_config(dest_key_split: i64) -> Result<Self> {
        match dest_key_split {
            -1 => Ok(KeySplit::WholePrefix),
            n if n >= 0 => Ok(KeySplit::Segments(n as usize)),
            n => Err(AckError::configuration(format!(
                "dest_key_split must be -1 or a non-negative number of segments, got {}",
                n
            ))
            .into()),
        }
    }

    /// 🔪 `(group, name)` for a key. The name still carries its file suffix.
    pub(crate) fn split<'a>(&self, key: &'a str) -> (&'a str, &'a str) {
        let by_last_slash = || key.rsplit_once('/').unwrap_or(("", key));
        match *self {
            KeySplit::WholePrefix => ("", by_last_slash().1),
            KeySplit::Segments(0) => ("", key),
            KeySplit::Segments(n) => match key.match_indices('/').nth(n - 1) {
                Some((idx, _)) => (&key[..idx], &key[idx + 1..]),
                None => by_last_slash(),
            },
        }
    }
}

/// 🏆 A group's winner, plus the name its stream will go by.
#[derive(Debug)]
pub(crate) struct SelectedObject<R> {
    pub(crate) group: String,
    pub(crate) name: String,
    pub(crate) object: StorageObjectRef<R>,
}

/// 🏆 Keep only the newest object per group. Groups come back in first-appearance order.
///
/// Ties go to whichever object the listing showed LAST. `candidates` must already be
/// filtered to the right extension; the returned name is not yet suffix-stripped.
pub(crate) fn select_most_recent<R>(
    candidates: Vec<StorageObjectRef<R>>,
    split: KeySplit,
) -> Vec<SelectedObject<R>> {
    let mut winners: Vec<SelectedObject<R>> = Vec::new();
    let mut slot_by_group: HashMap<String, usize> = HashMap::new();

    for object in candidates {
        let (group, name) = split.split(&object.key);
        let (group, name) = (group.to_string(), name.to_string());
        match slot_by_group.get(&group) {
            Some(&slot) => {
                if object.timestamp >= winners[slot].object.timestamp {
                    winners[slot].name = name;
                    winners[slot].object = object;
                }
            }
            None => {
                slot_by_group.insert(group.clone(), winners.len());
                winners.push(SelectedObject {
                    group,
                    name,
                    object,
                });
            }
        }
    }
    winners
}
