use crate::model::{Item, Review};

/// Canonical fields that filters and sorts may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Developer,
    Source,
    Note,
    Category,
    Platform,
    Completed,
    ReleaseYear,
    HoursPlayed,
    CreatedAt,
    UpdatedAt,
    ItemId,
    Body,
    Author,
    Rating,
    Difficulty,
    Recommends,
}

impl Field {
    pub fn name(self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Developer => "developer",
            Field::Source => "source",
            Field::Note => "note",
            Field::Category => "category",
            Field::Platform => "platform",
            Field::Completed => "completed",
            Field::ReleaseYear => "releaseYear",
            Field::HoursPlayed => "hoursPlayed",
            Field::CreatedAt => "createdAt",
            Field::UpdatedAt => "updatedAt",
            Field::ItemId => "itemId",
            Field::Body => "body",
            Field::Author => "author",
            Field::Rating => "rating",
            Field::Difficulty => "difficulty",
            Field::Recommends => "recommends",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Number(f64),
    Flag(bool),
    /// Normalized timestamp text (or the unknown sentinel).
    Timestamp(&'a str),
    Missing,
}

/// Canonical records the predicate can be evaluated against.
pub trait Filterable {
    fn field(&self, field: Field) -> FieldValue<'_>;
}

impl Filterable for Item {
    fn field(&self, field: Field) -> FieldValue<'_> {
        match field {
            Field::Title => FieldValue::Text(&self.title),
            Field::Developer => FieldValue::Text(&self.developer),
            Field::Source => FieldValue::Text(&self.source),
            Field::Note => FieldValue::Text(&self.note),
            Field::Category => FieldValue::Text(&self.category),
            Field::Platform => FieldValue::Text(&self.platform),
            Field::Completed => FieldValue::Flag(self.completed),
            Field::ReleaseYear => FieldValue::Number(f64::from(self.release_year)),
            Field::HoursPlayed => FieldValue::Number(self.hours_played),
            Field::CreatedAt => FieldValue::Timestamp(&self.created_at),
            Field::UpdatedAt => FieldValue::Timestamp(&self.updated_at),
            _ => FieldValue::Missing,
        }
    }
}

impl Filterable for Review {
    fn field(&self, field: Field) -> FieldValue<'_> {
        match field {
            Field::ItemId => FieldValue::Text(&self.item_id),
            Field::Body => FieldValue::Text(&self.body),
            Field::Author => FieldValue::Text(&self.author),
            Field::Difficulty => FieldValue::Text(&self.difficulty),
            Field::Rating => FieldValue::Number(f64::from(self.rating)),
            Field::Recommends => FieldValue::Flag(self.recommends),
            Field::HoursPlayed => FieldValue::Number(self.hours_played),
            Field::CreatedAt => FieldValue::Timestamp(&self.created_at),
            Field::UpdatedAt => FieldValue::Timestamp(&self.updated_at),
            _ => FieldValue::Missing,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    All,
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    /// Case-insensitive substring; `needle` is stored lowercased.
    Contains { field: Field, needle: String },
    /// Exact text equality.
    Equals { field: Field, value: String },
    Flag { field: Field, value: bool },
    /// Inclusive numeric range; either bound may be open.
    Range {
        field: Field,
        min: Option<f64>,
        max: Option<f64>,
    },
}

impl Predicate {
    pub fn contains(field: Field, needle: &str) -> Self {
        Predicate::Contains {
            field,
            needle: needle.to_lowercase(),
        }
    }

    /// Conjunction that collapses trivial cases.
    pub fn all_of(mut parts: Vec<Predicate>) -> Self {
        match parts.len() {
            0 => Predicate::All,
            1 => parts.remove(0),
            _ => Predicate::And(parts),
        }
    }

    pub fn matches<T: Filterable>(&self, record: &T) -> bool {
        match self {
            Predicate::All => true,
            Predicate::And(parts) => parts.iter().all(|p| p.matches(record)),
            Predicate::Or(parts) => parts.iter().any(|p| p.matches(record)),
            Predicate::Contains { field, needle } => match record.field(*field) {
                FieldValue::Text(s) => s.to_lowercase().contains(needle.as_str()),
                _ => false,
            },
            Predicate::Equals { field, value } => match record.field(*field) {
                FieldValue::Text(s) => s == value,
                _ => false,
            },
            Predicate::Flag { field, value } => {
                matches!(record.field(*field), FieldValue::Flag(b) if b == *value)
            }
            Predicate::Range { field, min, max } => match record.field(*field) {
                FieldValue::Number(n) => {
                    min.map_or(true, |lo| n >= lo) && max.map_or(true, |hi| n <= hi)
                }
                _ => false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalization::item_from_record;
    use serde_json::json;

    fn item() -> Item {
        item_from_record(&json!({
            "id": "1",
            "title": "The Witcher 3",
            "developer": "CD Projekt Red",
            "category": "RPG",
            "platform": "PlayStation 4",
            "releaseYear": 2015,
            "completed": true
        }))
        .unwrap()
    }

    #[test]
    fn substring_match_ignores_case() {
        assert!(Predicate::contains(Field::Title, "WITCHER").matches(&item()));
        assert!(Predicate::contains(Field::Platform, "station").matches(&item()));
        assert!(!Predicate::contains(Field::Title, "zelda").matches(&item()));
    }

    #[test]
    fn or_matches_any_text_field() {
        let search = Predicate::Or(vec![
            Predicate::contains(Field::Title, "projekt"),
            Predicate::contains(Field::Developer, "projekt"),
        ]);
        assert!(search.matches(&item()));
    }

    #[test]
    fn open_ranges() {
        let from = Predicate::Range {
            field: Field::ReleaseYear,
            min: Some(2015.0),
            max: None,
        };
        let until = Predicate::Range {
            field: Field::ReleaseYear,
            min: None,
            max: Some(2014.0),
        };
        assert!(from.matches(&item()));
        assert!(!until.matches(&item()));
    }

    #[test]
    fn fields_of_the_other_entity_never_match() {
        let p = Predicate::Flag {
            field: Field::Recommends,
            value: true,
        };
        assert!(!p.matches(&item()));
        assert_eq!(Predicate::all_of(vec![]), Predicate::All);
    }
}
