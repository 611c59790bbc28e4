use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::collaborator::RawEntry;
use crate::models::{status_text, EntryStatus, IdentifierType, QueueEntry};

/// Convert a raw collaborator record into a `QueueEntry`.
///
/// Key spelling varies across deployments (`ERROR_TEXT`, `errorText`,
/// `error-text`), so keys are compared after folding case and dropping
/// separators. Display fields are derived here rather than taken from the wire.
/// Returns `None` when the record carries no usable id.
pub fn normalize_entry(raw: &RawEntry) -> Option<QueueEntry> {
    let fields: HashMap<String, &Value> = raw
        .iter()
        .map(|(key, value)| (canonical_key(key), value))
        .collect();
    let field = |name: &str| fields.get(name).copied().filter(|v| !v.is_null());

    let id = field("id").and_then(as_text)?;

    let status = field("status").and_then(as_status);
    let total = field("total").and_then(as_i64);
    let mut processed = field("processed").and_then(as_i64);

    if let (Some(done), Some(total)) = (processed, total)
        && done > total
    {
        tracing::warn!("Queue entry {id} reports {done} processed of {total}; clamping");
        processed = Some(total);
    }

    let elapsed_ms = field("elapsed").and_then(as_i64);

    Some(QueueEntry {
        submitted: field("submitted").and_then(as_timestamp),
        completed: field("completed").and_then(as_timestamp),
        elapsed_text: elapsed_ms.map(format_elapsed),
        elapsed_ms,
        total,
        processed,
        error_text: field("errortext").and_then(as_text),
        status_text: status_text(status),
        status,
        identifier_type: field("identifiertype")
            .and_then(as_text)
            .and_then(|t| IdentifierType::from_name(&t)),
        id,
    })
}

/// Render a millisecond count as long-form text, e.g. `1 hour 2 minutes 5 seconds`.
/// Zero-valued units are omitted; anything under a second renders as empty.
pub fn format_elapsed(ms: i64) -> String {
    let total_secs = ms.max(0) / 1000;
    let units = [
        (total_secs / 86_400, "day"),
        ((total_secs % 86_400) / 3_600, "hour"),
        ((total_secs % 3_600) / 60, "minute"),
        (total_secs % 60, "second"),
    ];

    units
        .iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, unit)| {
            if *n == 1 {
                format!("{n} {unit}")
            } else {
                format!("{n} {unit}s")
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn canonical_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn as_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_status(value: &Value) -> Option<EntryStatus> {
    match value {
        Value::String(s) => match s.trim().parse::<i64>() {
            Ok(ordinal) => EntryStatus::from_ordinal(ordinal),
            Err(_) => EntryStatus::from_name(s),
        },
        other => as_i64(other).and_then(EntryStatus::from_ordinal),
    }
}

fn as_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    if let Some(ms) = as_i64(value) {
        return DateTime::from_timestamp_millis(ms);
    }
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
