// ai
//! 🔄 Transforms: what happens to a record between the decoder and the writers.
//!
//! 🎬 COLD OPEN. INT. DATA WAREHOUSE, LOADING DOCK
//!
//! A CSV header arrives: `"Click-Through Rate (%)"`. The warehouse takes one look and
//! refuses delivery. Column names with parentheses, percent signs and spaces are how
//! SQL engines develop trust issues.
//!
//! [`normalize_keys`] is the bouncer. It rewrites every key, at every depth, into
//! something a column name can survive: `Click_Through_Rate__per`. It also turns `null`
//! into `""`, because the loaders downstream never learned what null means.
//!
//! 🧠 Replacements run in order. `][` is handled before `[` and `]` so `a][b` becomes
//! `a_b`, not `a__b`.

use serde_json::Value;

use crate::common::Record;

/// 🔁 Ordered `(from, to)` rewrite rules for keys, applied after trimming whitespace.
const KEY_REWRITES: [(&str, &str); 12] = [
    (" ", "_"),
    ("-", "_"),
    ("(", "_"),
    (")", ""),
    (":", "_"),
    ("/", "_"),
    ("\\", "_"),
    ("][", "_"),
    ("[", "_"),
    ("]", "_"),
    (".", "_"),
    ("%", "per"),
];

/// 🏷️ One key, normalized.
pub(crate) fn normalize_key(key: &str) -> String {
    let rewritten = KEY_REWRITES
        .iter()
        .fold(key.trim().to_string(), |acc, (from, to)| acc.replace(from, to));
    rewritten.trim_matches('_').to_string()
}

fn normalize_value(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(normalize_keys(map)),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_value).collect()),
        Value::Null => Value::String(String::new()),
        other => other,
    }
}

/// 🧹 Normalize every key at every depth, and replace nulls with empty strings.
///
/// Two keys that normalize to the same name collide; the later one wins, as it would in
/// any map built in iteration order.
pub(crate) fn normalize_keys(record: Record) -> Record {
    record
        .into_iter()
        .map(|(key, value)| (normalize_key(&key), normalize_value(value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn the_one_where_marketing_column_names_get_sanitized() {
        assert_eq!(normalize_key("  Click-Through Rate (%) "), "Click_Through_Rate__per");
        assert_eq!(normalize_key("cost/conv."), "cost_conv");
        assert_eq!(normalize_key("a][b"), "a_b");
        assert_eq!(normalize_key("metrics[0]"), "metrics_0");
        assert_eq!(normalize_key("ga:sessions"), "ga_sessions");
        assert_eq!(normalize_key("back\\slash"), "back_slash");
        assert_eq!(normalize_key("_already_fine_"), "already_fine");
    }

    #[test]
    fn the_one_where_nested_keys_and_nulls_are_normalized_too() {
        let record = json!({
            "Ad Group": {"Max CPC": null, "labels": [{"Label Name": "x"}, null]},
            "Spend ($)": 12.5
        })
        .as_object()
        .unwrap()
        .clone();

        let normalized = normalize_keys(record);
        assert_eq!(
            Value::Object(normalized),
            json!({
                "Ad_Group": {"Max_CPC": "", "labels": [{"Label_Name": "x"}, ""]},
                "Spend__$": 12.5
            })
        );
    }
}
