// Structural checks over storage-shaped payloads. Every violation is collected
// before the payload is rejected; messages use canonical field names.

use serde_json::{Map, Value};
use url::Url;

use crate::error::{CatalogError, CatalogResult, FieldError};
use crate::model::{
    max_release_year, Difficulty, AUTHOR_MAX_CHARS, BODY_MAX_CHARS, BODY_MIN_CHARS,
    CREDIT_MAX_CHARS, LABEL_MAX_CHARS, MAX_HOURS_PLAYED, MAX_RATING, MIN_RATING, MIN_RELEASE_YEAR,
    NOTE_MAX_CHARS, TITLE_MAX_CHARS,
};
use crate::normalization::{canonical_name, EntityKind};

struct Checker<'a> {
    kind: EntityKind,
    doc: &'a Map<String, Value>,
    errors: Vec<FieldError>,
}

impl<'a> Checker<'a> {
    fn new(kind: EntityKind, doc: &'a Map<String, Value>) -> Self {
        Self {
            kind,
            doc,
            errors: Vec::new(),
        }
    }

    fn fail(&mut self, key: &str, message: String) {
        self.errors
            .push(FieldError::new(canonical_name(self.kind, key), message));
    }

    fn value(&self, key: &str) -> Option<&'a Value> {
        self.doc.get(key).filter(|v| !v.is_null())
    }

    fn text(&mut self, key: &str, required: bool, min: usize, max: usize) {
        let label = canonical_name(self.kind, key);
        match self.value(key) {
            None if required => self.fail(key, format!("{label} is required")),
            None => {}
            Some(Value::String(s)) => {
                let len = s.trim().chars().count();
                if required && len == 0 {
                    self.fail(key, format!("{label} must not be empty"));
                } else if len < min {
                    self.fail(key, format!("{label} must be at least {min} characters"));
                } else if len > max {
                    self.fail(key, format!("{label} must be at most {max} characters"));
                }
            }
            Some(_) => self.fail(key, format!("{label} must be a string")),
        }
    }

    fn integer(&mut self, key: &str, required: bool, min: i64, max: i64) {
        let label = canonical_name(self.kind, key);
        match self.value(key) {
            None if required => self.fail(key, format!("{label} is required")),
            None => {}
            Some(Value::Number(n)) => {
                let whole = n
                    .as_i64()
                    .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64));
                match whole {
                    Some(v) if (min..=max).contains(&v) => {}
                    Some(_) => self.fail(key, format!("{label} must be between {min} and {max}")),
                    None => self.fail(key, format!("{label} must be a whole number")),
                }
            }
            Some(_) => self.fail(key, format!("{label} must be a number")),
        }
    }

    fn number(&mut self, key: &str, min: f64, max: f64) {
        let label = canonical_name(self.kind, key);
        match self.value(key) {
            None => {}
            Some(Value::Number(n)) => match n.as_f64() {
                Some(v) if v >= min && v <= max => {}
                _ => self.fail(key, format!("{label} must be between {min} and {max}")),
            },
            Some(_) => self.fail(key, format!("{label} must be a number")),
        }
    }

    fn flag(&mut self, key: &str) {
        let label = canonical_name(self.kind, key);
        if let Some(v) = self.value(key) {
            if !v.is_boolean() {
                self.fail(key, format!("{label} must be true or false"));
            }
        }
    }

    fn http_url(&mut self, key: &str) {
        let label = canonical_name(self.kind, key);
        match self.value(key) {
            None => {}
            Some(Value::String(s)) if s.trim().is_empty() => {}
            Some(Value::String(s)) => match Url::parse(s.trim()) {
                Ok(u) if matches!(u.scheme(), "http" | "https") => {}
                _ => self.fail(key, format!("{label} must be an http(s) URL or empty")),
            },
            Some(_) => self.fail(key, format!("{label} must be a string")),
        }
    }

    fn difficulty(&mut self, key: &str) {
        let label = canonical_name(self.kind, key);
        match self.value(key) {
            None => {}
            Some(Value::String(s)) if Difficulty::parse(s).is_some() => {}
            Some(_) => {
                let allowed: Vec<&str> = Difficulty::ALL.iter().map(|d| d.as_str()).collect();
                self.fail(key, format!("{label} must be one of {}", allowed.join(", ")));
            }
        }
    }

    fn finish(self) -> CatalogResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(CatalogError::ValidationFailed(self.errors))
        }
    }
}

/// Validate a full item in storage layout.
pub fn validate_item(doc: &Map<String, Value>) -> CatalogResult<()> {
    let mut check = Checker::new(EntityKind::Item, doc);
    check.text("name", true, 1, TITLE_MAX_CHARS);
    check.text("genre", true, 1, LABEL_MAX_CHARS);
    check.text("console", true, 1, LABEL_MAX_CHARS);
    check.integer("year", false, MIN_RELEASE_YEAR, max_release_year());
    check.http_url("cover_image");
    check.text("description", false, 0, NOTE_MAX_CHARS);
    check.text("studio", false, 0, CREDIT_MAX_CHARS);
    check.text("purchased_from", false, 0, CREDIT_MAX_CHARS);
    check.flag("finished");
    check.number("playtime", 0.0, MAX_HOURS_PLAYED);
    check.finish()
}

/// Validate a full review in storage layout.
pub fn validate_review(doc: &Map<String, Value>) -> CatalogResult<()> {
    let mut check = Checker::new(EntityKind::Review, doc);
    check.text("game_id", true, 1, 64);
    check.integer("score", true, i64::from(MIN_RATING), i64::from(MAX_RATING));
    check.text("text", true, BODY_MIN_CHARS, BODY_MAX_CHARS);
    check.text("reviewer", false, 0, AUTHOR_MAX_CHARS);
    check.difficulty("difficulty_level");
    check.flag("would_recommend");
    check.number("hours_at_review", 0.0, MAX_HOURS_PLAYED);
    check.finish()
}
