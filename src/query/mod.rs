//! Turns flat, untrusted request criteria into a bounded query plan.

pub mod predicate;
pub mod sort;

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{CatalogError, CatalogResult};
use crate::model::{Difficulty, Page, MAX_RATING, MIN_RATING};
pub use predicate::{Field, FieldValue, Filterable, Predicate};
pub use sort::{Direction, SortSpec, ITEM_SORT_FIELDS, REVIEW_SORT_FIELDS};

/// Flat key/value criteria as received from a query string.
pub type Criteria = BTreeMap<String, String>;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

const ITEM_SEARCH_FIELDS: [Field; 4] = [Field::Title, Field::Developer, Field::Source, Field::Note];
const REVIEW_SEARCH_FIELDS: [Field; 2] = [Field::Body, Field::Author];

const PAGING_KEYS: [&str; 4] = ["page", "limit", "sortBy", "order"];
const ITEM_KEYS: [&str; 6] = ["search", "category", "platform", "completed", "yearFrom", "yearTo"];
const REVIEW_KEYS: [&str; 7] = [
    "search",
    "itemId",
    "rating",
    "minRating",
    "difficulty",
    "recommends",
    "author",
];

#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub predicate: Predicate,
    pub sort: SortSpec,
    pub page: u32,
    pub limit: u32,
    pub skip: u64,
}

impl QueryPlan {
    /// Filter, count, sort (stable) and slice one page out of `records`.
    pub fn apply<T: Filterable>(&self, records: Vec<T>) -> Page<T> {
        let mut matched: Vec<T> = records
            .into_iter()
            .filter(|r| self.predicate.matches(r))
            .collect();
        let total = matched.len() as u64;
        matched.sort_by(|a, b| self.sort.compare(a, b));
        let items: Vec<T> = matched
            .into_iter()
            .skip(usize::try_from(self.skip).unwrap_or(usize::MAX))
            .take(self.limit as usize)
            .collect();
        Page::new(items, total, self.page, self.limit)
    }
}

fn value<'a>(criteria: &'a Criteria, key: &str) -> Option<&'a str> {
    criteria
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn parse_bool_token(key: &str, raw: &str) -> CatalogResult<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(CatalogError::InvalidArgument(format!(
            "{key} must be 'true' or 'false', got '{raw}'"
        ))),
    }
}

fn parse_int(key: &str, raw: &str) -> CatalogResult<i64> {
    raw.parse::<i64>()
        .map_err(|_| CatalogError::InvalidArgument(format!("{key} must be an integer, got '{raw}'")))
}

fn warn_unknown_keys(criteria: &Criteria, known: &[&str]) {
    for key in criteria.keys() {
        if !known.contains(&key.as_str()) && !PAGING_KEYS.contains(&key.as_str()) {
            debug!(key = %key, "ignoring unknown filter criterion");
        }
    }
}

/// Page number, page size and skip offset. Oversized pages are clamped.
pub fn paginate(criteria: &Criteria) -> CatalogResult<(u32, u32, u64)> {
    let page = match value(criteria, "page") {
        None => 1,
        Some(raw) => {
            let n = parse_int("page", raw)?;
            if n < 1 {
                return Err(CatalogError::InvalidArgument(format!(
                    "page must be 1 or greater, got {n}"
                )));
            }
            u32::try_from(n)
                .map_err(|_| CatalogError::InvalidArgument(format!("page {n} is out of range")))?
        }
    };
    let limit = match value(criteria, "limit") {
        None => DEFAULT_PAGE_SIZE,
        Some(raw) => {
            let n = parse_int("limit", raw)?;
            if n < 1 {
                return Err(CatalogError::InvalidArgument(format!(
                    "limit must be 1 or greater, got {n}"
                )));
            }
            n.min(i64::from(MAX_PAGE_SIZE)) as u32
        }
    };
    let skip = u64::from(page - 1) * u64::from(limit);
    Ok((page, limit, skip))
}

fn parse_sort(criteria: &Criteria, allowed: &[Field]) -> CatalogResult<SortSpec> {
    let direction = value(criteria, "order")
        .map(Direction::parse)
        .transpose()?;
    match value(criteria, "sortBy") {
        Some(name) => SortSpec::resolve(name, allowed, direction.unwrap_or(Direction::Desc)),
        None => Ok(SortSpec {
            direction: direction.unwrap_or(Direction::Desc),
            ..SortSpec::default()
        }),
    }
}

fn plan(criteria: &Criteria, clauses: Vec<Predicate>, allowed: &[Field]) -> CatalogResult<QueryPlan> {
    let (page, limit, skip) = paginate(criteria)?;
    let sort = parse_sort(criteria, allowed)?;
    Ok(QueryPlan {
        predicate: Predicate::all_of(clauses),
        sort,
        page,
        limit,
        skip,
    })
}

fn search_clause(term: &str, fields: &[Field]) -> Predicate {
    Predicate::Or(
        fields
            .iter()
            .map(|f| Predicate::contains(*f, term))
            .collect(),
    )
}

pub fn build_item_query(criteria: &Criteria) -> CatalogResult<QueryPlan> {
    warn_unknown_keys(criteria, &ITEM_KEYS);
    let mut clauses = Vec::new();

    if let Some(term) = value(criteria, "search") {
        clauses.push(search_clause(term, &ITEM_SEARCH_FIELDS));
    }
    if let Some(category) = value(criteria, "category") {
        clauses.push(Predicate::contains(Field::Category, category));
    }
    if let Some(platform) = value(criteria, "platform") {
        clauses.push(Predicate::contains(Field::Platform, platform));
    }
    if let Some(raw) = value(criteria, "completed") {
        clauses.push(Predicate::Flag {
            field: Field::Completed,
            value: parse_bool_token("completed", raw)?,
        });
    }

    let from = value(criteria, "yearFrom")
        .map(|raw| parse_int("yearFrom", raw))
        .transpose()?;
    let to = value(criteria, "yearTo")
        .map(|raw| parse_int("yearTo", raw))
        .transpose()?;
    if let (Some(lo), Some(hi)) = (from, to) {
        if lo > hi {
            return Err(CatalogError::InvalidArgument(format!(
                "yearFrom ({lo}) is after yearTo ({hi})"
            )));
        }
    }
    if from.is_some() || to.is_some() {
        clauses.push(Predicate::Range {
            field: Field::ReleaseYear,
            min: from.map(|y| y as f64),
            max: to.map(|y| y as f64),
        });
    }

    plan(criteria, clauses, &ITEM_SORT_FIELDS)
}

fn parse_rating(key: &str, raw: &str) -> CatalogResult<f64> {
    let n = parse_int(key, raw)?;
    if !(i64::from(MIN_RATING)..=i64::from(MAX_RATING)).contains(&n) {
        return Err(CatalogError::InvalidArgument(format!(
            "{key} must be between {MIN_RATING} and {MAX_RATING}, got {n}"
        )));
    }
    Ok(n as f64)
}

pub fn build_review_query(criteria: &Criteria) -> CatalogResult<QueryPlan> {
    warn_unknown_keys(criteria, &REVIEW_KEYS);
    let mut clauses = Vec::new();

    if let Some(term) = value(criteria, "search") {
        clauses.push(search_clause(term, &REVIEW_SEARCH_FIELDS));
    }
    if let Some(item_id) = value(criteria, "itemId") {
        clauses.push(Predicate::Equals {
            field: Field::ItemId,
            value: item_id.to_string(),
        });
    }
    if let Some(author) = value(criteria, "author") {
        clauses.push(Predicate::contains(Field::Author, author));
    }
    if let Some(raw) = value(criteria, "rating") {
        let r = parse_rating("rating", raw)?;
        clauses.push(Predicate::Range {
            field: Field::Rating,
            min: Some(r),
            max: Some(r),
        });
    }
    if let Some(raw) = value(criteria, "minRating") {
        clauses.push(Predicate::Range {
            field: Field::Rating,
            min: Some(parse_rating("minRating", raw)?),
            max: None,
        });
    }
    if let Some(raw) = value(criteria, "difficulty") {
        let difficulty = Difficulty::parse(raw).ok_or_else(|| {
            CatalogError::InvalidArgument(format!("unknown difficulty '{raw}'"))
        })?;
        clauses.push(Predicate::Equals {
            field: Field::Difficulty,
            value: difficulty.as_str().to_string(),
        });
    }
    if let Some(raw) = value(criteria, "recommends") {
        clauses.push(Predicate::Flag {
            field: Field::Recommends,
            value: parse_bool_token("recommends", raw)?,
        });
    }

    plan(criteria, clauses, &REVIEW_SORT_FIELDS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Item;
    use crate::normalization::item_from_record;
    use serde_json::json;

    fn criteria(pairs: &[(&str, &str)]) -> Criteria {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn items(n: usize) -> Vec<Item> {
        (0..n)
            .map(|i| {
                item_from_record(&json!({
                    "id": format!("g{i}"),
                    "title": format!("Game {i:02}"),
                    "category": "Action",
                    "platform": "PC",
                    "createdAt": format!("2024-01-{:02}T00:00:00Z", i + 1)
                }))
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn defaults_are_first_page_newest_first() {
        let plan = build_item_query(&Criteria::new()).unwrap();
        assert_eq!(plan.predicate, Predicate::All);
        assert_eq!((plan.page, plan.limit, plan.skip), (1, DEFAULT_PAGE_SIZE, 0));
        assert_eq!(plan.sort, SortSpec::default());
    }

    #[test]
    fn limit_is_clamped_and_skip_computed() {
        let plan = build_item_query(&criteria(&[("page", "3"), ("limit", "500")])).unwrap();
        assert_eq!(plan.limit, MAX_PAGE_SIZE);
        assert_eq!(plan.skip, 200);
    }

    #[test]
    fn bad_pagination_is_invalid_argument() {
        for bad in [("page", "0"), ("page", "two"), ("limit", "-5"), ("page", "-1")] {
            let err = build_item_query(&criteria(&[bad])).unwrap_err();
            assert!(matches!(err, CatalogError::InvalidArgument(_)), "{bad:?}");
        }
    }

    #[test]
    fn filter_values_are_checked() {
        assert!(build_item_query(&criteria(&[("completed", "maybe")])).is_err());
        assert!(build_item_query(&criteria(&[("yearFrom", "2020"), ("yearTo", "2010")])).is_err());
        assert!(build_item_query(&criteria(&[("sortBy", "password")])).is_err());
        assert!(build_review_query(&criteria(&[("rating", "6")])).is_err());
        assert!(build_review_query(&criteria(&[("difficulty", "insane")])).is_err());
    }

    #[test]
    fn second_page_of_twenty_five() {
        let plan = build_item_query(&criteria(&[("page", "2"), ("limit", "10")])).unwrap();
        let page = plan.apply(items(25));
        assert_eq!(page.items.len(), 10);
        assert_eq!(page.total, 25);
        assert_eq!(page.total_pages, 3);

        let first = build_item_query(&criteria(&[("page", "1"), ("limit", "10")]))
            .unwrap()
            .apply(items(25));
        assert!(first
            .items
            .iter()
            .all(|a| page.items.iter().all(|b| a.id != b.id)));
        // newest first
        assert_eq!(first.items[0].id, "g24");
    }

    #[test]
    fn search_and_range_combine() {
        let plan = build_item_query(&criteria(&[
            ("search", "game 0"),
            ("completed", "FALSE"),
            ("yearFrom", "1990"),
            ("sortBy", "title"),
            ("order", "asc"),
        ]))
        .unwrap();
        let page = plan.apply(items(25));
        assert_eq!(page.total, 10);
        assert_eq!(page.items[0].title, "Game 00");
    }
}
