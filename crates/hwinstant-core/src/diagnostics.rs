// ── Diagnostics ──
//
// A JSON dump of an entry and its latest snapshot, safe to paste into a
// bug report: every identifying value is replaced before it leaves here.

use hwinstant_api::CombinedModels;
use serde_json::{Map, Value, json};

use crate::config::ConfigEntry;

/// Keys whose values never appear in diagnostics.
pub const TO_REDACT: &[&str] = &[
    "ip_address",
    "gas_unique_id",
    "id",
    "serial",
    "token",
    "unique_id",
    "unique_meter_id",
    "wifi_ssid",
];

pub const REDACTED: &str = "**REDACTED**";

/// Diagnostics for one entry.
///
/// `data` is the coordinator's last snapshot, or `None` if it never
/// fetched one.
pub fn config_entry_diagnostics(entry: &ConfigEntry, data: Option<&CombinedModels>) -> Value {
    let snapshot = data
        .and_then(|d| serde_json::to_value(d).ok())
        .unwrap_or(Value::Null);

    let raw = json!({
        "entry": {
            "data": entry.data,
            "options": entry.options,
            "title": entry.title,
            "unique_id": entry.unique_id,
        },
        "data": snapshot,
    });
    redact(raw, TO_REDACT)
}

/// Replace the value of every key in `keys`, at any depth.
///
/// Nulls and empty strings are kept so a reader can still tell a field
/// was absent.
pub fn redact(value: Value, keys: &[&str]) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| {
                    let v = if keys.contains(&k.as_str()) {
                        redact_value(v)
                    } else {
                        redact(v, keys)
                    };
                    (k, v)
                })
                .collect::<Map<_, _>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(|v| redact(v, keys)).collect()),
        other => other,
    }
}

fn redact_value(value: Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::String(s) if s.is_empty() => Value::String(s),
        _ => Value::String(REDACTED.to_owned()),
    }
}
