use serde_json::{Map, Value};
use tracing::warn;

use super::{as_flag, as_id, as_number, as_text, copy_writable, normalize_timestamp, pick, FieldAlias};
use crate::model::{Difficulty, Review, ANONYMOUS_AUTHOR, MAX_RATING, MIN_RATING};

const ID: FieldAlias = ("id", "_id");
const ITEM_ID: FieldAlias = ("itemId", "game_id");
const BODY: FieldAlias = ("body", "text");
const RATING: FieldAlias = ("rating", "score");
const AUTHOR: FieldAlias = ("author", "reviewer");
const DIFFICULTY: FieldAlias = ("difficulty", "difficulty_level");
const RECOMMENDS: FieldAlias = ("recommends", "would_recommend");
const HOURS_PLAYED: FieldAlias = ("hoursPlayed", "hours_at_review");
const CREATED_AT: FieldAlias = ("createdAt", "created_at");
const UPDATED_AT: FieldAlias = ("updatedAt", "updated_at");

pub(crate) const FIELDS: [FieldAlias; 10] = [
    ID,
    ITEM_ID,
    BODY,
    RATING,
    AUTHOR,
    DIFFICULTY,
    RECOMMENDS,
    HOURS_PLAYED,
    CREATED_AT,
    UPDATED_AT,
];

const WRITABLE: [FieldAlias; 7] = [
    ITEM_ID,
    BODY,
    RATING,
    AUTHOR,
    DIFFICULTY,
    RECOMMENDS,
    HOURS_PLAYED,
];

const REQUIRED: [&str; 3] = ["itemId", "rating", "body"];

pub const STORAGE_ID: &str = ID.1;
pub const STORAGE_ITEM_ID: &str = ITEM_ID.1;
pub const STORAGE_AUTHOR: &str = AUTHOR.1;
pub const STORAGE_DIFFICULTY: &str = DIFFICULTY.1;
pub const STORAGE_CREATED_AT: &str = CREATED_AT.1;
pub const STORAGE_UPDATED_AT: &str = UPDATED_AT.1;

/// Known difficulties take their display casing; unknown legacy labels are kept.
fn canonical_difficulty(raw: &str) -> String {
    Difficulty::parse(raw)
        .map(|d| d.as_str().to_string())
        .unwrap_or_else(|| raw.trim().to_string())
}

fn clamp_rating(raw: Option<f64>, id: &str) -> u8 {
    match raw {
        Some(r) => r.round().clamp(f64::from(MIN_RATING), f64::from(MAX_RATING)) as u8,
        None => {
            warn!(review_id = %id, "review record without a readable rating");
            MIN_RATING
        }
    }
}

/// Map a stored review in either layout to the canonical shape.
pub fn review_from_record(record: &Value) -> Option<Review> {
    let obj = record.as_object()?;
    let text = |alias| pick(obj, alias).and_then(as_text).unwrap_or_default();

    let id = pick(obj, ID).and_then(as_id).unwrap_or_default();
    let author = text(AUTHOR);
    let difficulty = text(DIFFICULTY);
    let rating = clamp_rating(pick(obj, RATING).and_then(as_number), &id);

    Some(Review {
        item_id: pick(obj, ITEM_ID).and_then(as_id).unwrap_or_default(),
        body: text(BODY),
        rating,
        author: if author.is_empty() {
            ANONYMOUS_AUTHOR.to_string()
        } else {
            author
        },
        difficulty: if difficulty.is_empty() {
            Difficulty::default().as_str().to_string()
        } else {
            canonical_difficulty(&difficulty)
        },
        recommends: pick(obj, RECOMMENDS).and_then(as_flag).unwrap_or(false),
        hours_played: pick(obj, HOURS_PLAYED)
            .and_then(as_number)
            .map(|h| h.max(0.0))
            .unwrap_or(0.0),
        created_at: normalize_timestamp(pick(obj, CREATED_AT)),
        updated_at: normalize_timestamp(pick(obj, UPDATED_AT)),
        id,
        item_title: None,
        item_category: None,
    })
}

pub fn reviews_from_records(records: &[Value]) -> Vec<Review> {
    let reviews: Vec<Review> = records.iter().filter_map(review_from_record).collect();
    if reviews.len() < records.len() {
        warn!(
            dropped = records.len() - reviews.len(),
            "skipped malformed review records"
        );
    }
    reviews
}

/// Translate a canonical review payload into the storage layout.
pub fn review_to_storage(payload: &Value) -> Map<String, Value> {
    let mut out = copy_writable(payload, &WRITABLE, &REQUIRED);
    let display = out
        .get(DIFFICULTY.1)
        .and_then(Value::as_str)
        .and_then(Difficulty::parse);
    if let Some(display) = display {
        out.insert(DIFFICULTY.1.to_string(), Value::from(display.as_str()));
    }
    out
}
