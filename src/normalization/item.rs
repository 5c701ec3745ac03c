use serde_json::{Map, Value};
use tracing::warn;

use super::{as_flag, as_id, as_number, as_text, copy_writable, normalize_timestamp, pick, FieldAlias};
use crate::model::{canonical_category, current_year, Item};

const ID: FieldAlias = ("id", "_id");
const TITLE: FieldAlias = ("title", "name");
const RELEASE_YEAR: FieldAlias = ("releaseYear", "year");
const CATEGORY: FieldAlias = ("category", "genre");
const PLATFORM: FieldAlias = ("platform", "console");
const COVER_URL: FieldAlias = ("coverUrl", "cover_image");
const NOTE: FieldAlias = ("note", "description");
const DEVELOPER: FieldAlias = ("developer", "studio");
const SOURCE: FieldAlias = ("source", "purchased_from");
const COMPLETED: FieldAlias = ("completed", "finished");
const HOURS_PLAYED: FieldAlias = ("hoursPlayed", "playtime");
const CREATED_AT: FieldAlias = ("createdAt", "created_at");
const UPDATED_AT: FieldAlias = ("updatedAt", "updated_at");

pub(crate) const FIELDS: [FieldAlias; 13] = [
    ID,
    TITLE,
    RELEASE_YEAR,
    CATEGORY,
    PLATFORM,
    COVER_URL,
    NOTE,
    DEVELOPER,
    SOURCE,
    COMPLETED,
    HOURS_PLAYED,
    CREATED_AT,
    UPDATED_AT,
];

/// Fields a caller may write; ids and timestamps are owned by the orchestrator.
const WRITABLE: [FieldAlias; 10] = [
    TITLE,
    RELEASE_YEAR,
    CATEGORY,
    PLATFORM,
    COVER_URL,
    NOTE,
    DEVELOPER,
    SOURCE,
    COMPLETED,
    HOURS_PLAYED,
];

const REQUIRED: [&str; 3] = ["title", "category", "platform"];

pub const STORAGE_ID: &str = ID.1;
pub const STORAGE_TITLE: &str = TITLE.1;
pub const STORAGE_CREATED_AT: &str = CREATED_AT.1;
pub const STORAGE_UPDATED_AT: &str = UPDATED_AT.1;

/// Map a stored item in either layout to the canonical shape.
///
/// Returns `None` only for non-object input; every missing field falls back to
/// its default so one damaged record never fails a listing.
pub fn item_from_record(record: &Value) -> Option<Item> {
    let obj = record.as_object()?;
    let text = |alias| pick(obj, alias).and_then(as_text).unwrap_or_default();

    let release_year = pick(obj, RELEASE_YEAR)
        .and_then(as_number)
        .map(f64::trunc)
        .filter(|y| *y >= f64::from(i32::MIN) && *y <= f64::from(i32::MAX))
        .map(|y| y as i32)
        .unwrap_or_else(current_year);

    Some(Item {
        id: pick(obj, ID).and_then(as_id).unwrap_or_default(),
        title: text(TITLE),
        release_year,
        cover_url: text(COVER_URL),
        note: text(NOTE),
        category: canonical_category(&text(CATEGORY)),
        platform: text(PLATFORM),
        source: text(SOURCE),
        developer: text(DEVELOPER),
        completed: pick(obj, COMPLETED).and_then(as_flag).unwrap_or(false),
        hours_played: pick(obj, HOURS_PLAYED)
            .and_then(as_number)
            .map(|h| h.max(0.0))
            .unwrap_or(0.0),
        created_at: normalize_timestamp(pick(obj, CREATED_AT)),
        updated_at: normalize_timestamp(pick(obj, UPDATED_AT)),
    })
}

/// Whether the stored record carries a readable release year of its own.
pub fn has_release_year(record: &Value) -> bool {
    record
        .as_object()
        .and_then(|obj| pick(obj, RELEASE_YEAR))
        .and_then(as_number)
        .is_some()
}

pub fn items_from_records(records: &[Value]) -> Vec<Item> {
    let items: Vec<Item> = records.iter().filter_map(item_from_record).collect();
    if items.len() < records.len() {
        warn!(
            dropped = records.len() - items.len(),
            "skipped malformed item records"
        );
    }
    items
}

/// Translate a canonical item payload into the storage layout.
pub fn item_to_storage(payload: &Value) -> Map<String, Value> {
    let mut out = copy_writable(payload, &WRITABLE, &REQUIRED);
    let display = out
        .get(CATEGORY.1)
        .and_then(Value::as_str)
        .map(canonical_category);
    if let Some(display) = display {
        out.insert(CATEGORY.1.to_string(), Value::String(display));
    }
    out
}
