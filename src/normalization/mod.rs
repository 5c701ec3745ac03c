//! Field mapping between stored documents and the canonical entity shapes.
//!
//! Stored documents come in two layouts: the legacy layout (snake_case and
//! differently named keys, which is also what new writes persist) and the
//! canonical layout (the external camelCase names). Reads accept either and
//! always produce the canonical structs; when both a canonical key and its
//! legacy alias are present the canonical key wins. Nothing outside this
//! module knows about the legacy key names.

pub mod item;
pub mod review;
pub mod timestamp;

use serde::Serialize;
use serde_json::{Map, Value};

pub use item::{has_release_year, item_from_record, item_to_storage, items_from_records};
pub use review::{review_from_record, review_to_storage, reviews_from_records};
pub use timestamp::{format_timestamp, normalize_timestamp, now_timestamp, parse_timestamp};

/// `(canonical, legacy)` key pair for one field.
pub(crate) type FieldAlias = (&'static str, &'static str);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Item,
    Review,
}

impl EntityKind {
    fn aliases(self) -> &'static [FieldAlias] {
        match self {
            EntityKind::Item => &item::FIELDS,
            EntityKind::Review => &review::FIELDS,
        }
    }
}

/// Which layout a stored document uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Shape {
    Canonical,
    Legacy,
    /// Carries keys from both layouts.
    Mixed,
    /// Not an object, or no recognised keys at all.
    Malformed,
}

pub fn detect_shape(record: &Value, kind: EntityKind) -> Shape {
    let Some(obj) = record.as_object() else {
        return Shape::Malformed;
    };
    let aliases = kind.aliases();
    let canonical = aliases.iter().filter(|(c, _)| obj.contains_key(*c)).count();
    let legacy = aliases.iter().filter(|(_, l)| obj.contains_key(*l)).count();
    match (canonical > 0, legacy > 0) {
        (true, true) => Shape::Mixed,
        (true, false) => Shape::Canonical,
        (false, true) => Shape::Legacy,
        (false, false) => Shape::Malformed,
    }
}

/// Canonical name of a storage key, for user-facing messages.
pub fn canonical_name(kind: EntityKind, storage_key: &str) -> &'static str {
    kind.aliases()
        .iter()
        .find(|(_, legacy)| *legacy == storage_key)
        .map(|(canonical, _)| *canonical)
        .unwrap_or("unknown")
}

/// Canonical key first, legacy alias second; JSON `null` counts as absent.
pub(crate) fn pick<'a>(obj: &'a Map<String, Value>, alias: FieldAlias) -> Option<&'a Value> {
    let (canonical, legacy) = alias;
    obj.get(canonical)
        .filter(|v| !v.is_null())
        .or_else(|| obj.get(legacy).filter(|v| !v.is_null()))
}

pub(crate) fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub(crate) fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|f| f.is_finite())
}

pub(crate) fn as_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

pub(crate) fn as_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(obj) => obj.get("$oid").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

/// Copy writable canonical fields into their storage keys.
///
/// Required keys are always emitted (as `null` when missing) so validation can
/// report them; optional keys are only emitted when they carry a value.
pub(crate) fn copy_writable(
    payload: &Value,
    writable: &[FieldAlias],
    required: &[&str],
) -> Map<String, Value> {
    let source = payload.as_object();
    let mut out = Map::new();
    for &(canonical, legacy) in writable {
        let value = source
            .and_then(|obj| obj.get(canonical))
            .filter(|v| !v.is_null());
        match value {
            Some(Value::String(s)) => {
                out.insert(legacy.to_string(), Value::String(s.trim().to_string()));
            }
            Some(v) => {
                out.insert(legacy.to_string(), v.clone());
            }
            None if required.contains(&canonical) => {
                out.insert(legacy.to_string(), Value::Null);
            }
            None => {}
        }
    }
    out
}
