use std::cmp::Ordering;

use strsim::jaro_winkler;

use super::predicate::{Field, FieldValue, Filterable};
use crate::error::{CatalogError, CatalogResult};
use crate::normalization::parse_timestamp;

/// Minimum similarity for suggesting a sortable field on a typo.
const SUGGESTION_SIMILARITY: f64 = 0.8;

pub const ITEM_SORT_FIELDS: [Field; 8] = [
    Field::Title,
    Field::ReleaseYear,
    Field::Category,
    Field::Platform,
    Field::HoursPlayed,
    Field::Completed,
    Field::CreatedAt,
    Field::UpdatedAt,
];

pub const REVIEW_SORT_FIELDS: [Field; 5] = [
    Field::Rating,
    Field::HoursPlayed,
    Field::Author,
    Field::CreatedAt,
    Field::UpdatedAt,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn parse(raw: &str) -> CatalogResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Direction::Asc),
            "desc" | "descending" => Ok(Direction::Desc),
            other => Err(CatalogError::InvalidArgument(format!(
                "order must be 'asc' or 'desc', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub field: Field,
    pub direction: Direction,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            field: Field::CreatedAt,
            direction: Direction::Desc,
        }
    }
}

impl SortSpec {
    /// Resolve a caller-supplied field name against an allow-list.
    pub fn resolve(name: &str, allowed: &[Field], direction: Direction) -> CatalogResult<Self> {
        let name = name.trim();
        if let Some(field) = allowed.iter().find(|f| f.name().eq_ignore_ascii_case(name)) {
            return Ok(Self {
                field: *field,
                direction,
            });
        }
        let suggestion = allowed
            .iter()
            .map(|f| (f.name(), jaro_winkler(&name.to_ascii_lowercase(), &f.name().to_ascii_lowercase())))
            .filter(|(_, score)| *score >= SUGGESTION_SIMILARITY)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(n, _)| format!(" (did you mean '{n}'?)"))
            .unwrap_or_default();
        Err(CatalogError::InvalidArgument(format!(
            "cannot sort by '{name}'{suggestion}"
        )))
    }

    pub fn compare<T: Filterable>(&self, a: &T, b: &T) -> Ordering {
        let ord = compare_values(a.field(self.field), b.field(self.field));
        match self.direction {
            Direction::Asc => ord,
            Direction::Desc => ord.reverse(),
        }
    }
}

fn compare_values(a: FieldValue<'_>, b: FieldValue<'_>) -> Ordering {
    match (a, b) {
        (FieldValue::Text(x), FieldValue::Text(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
        (FieldValue::Number(x), FieldValue::Number(y)) => x.total_cmp(&y),
        (FieldValue::Flag(x), FieldValue::Flag(y)) => x.cmp(&y),
        // Unknown timestamps parse to None and sort as the oldest value.
        (FieldValue::Timestamp(x), FieldValue::Timestamp(y)) => {
            parse_timestamp(x).cmp(&parse_timestamp(y))
        }
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_allowed_fields_case_insensitively() {
        let spec = SortSpec::resolve("releaseyear", &ITEM_SORT_FIELDS, Direction::Asc).unwrap();
        assert_eq!(spec.field, Field::ReleaseYear);
    }

    #[test]
    fn rejects_unlisted_fields_with_hint() {
        let err = SortSpec::resolve("titel", &ITEM_SORT_FIELDS, Direction::Asc).unwrap_err();
        assert!(err.to_string().contains("did you mean 'title'"));
        let err = SortSpec::resolve("note", &ITEM_SORT_FIELDS, Direction::Asc).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidArgument(_)));
    }

    #[test]
    fn unknown_timestamps_sort_oldest() {
        assert_eq!(
            compare_values(
                FieldValue::Timestamp("unknown"),
                FieldValue::Timestamp("2020-01-01T00:00:00.000Z")
            ),
            Ordering::Less
        );
    }

    #[test]
    fn direction_tokens() {
        assert_eq!(Direction::parse("DESC").unwrap(), Direction::Desc);
        assert!(Direction::parse("sideways").is_err());
    }
}
