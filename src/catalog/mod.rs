//! Create/read/update/delete for items and reviews.
//!
//! Every write maps the caller's canonical payload to the storage layout,
//! validates the whole record, runs the uniqueness and reference checks and
//! only then touches the store. The store's unique index is the final word on
//! duplicates; the pre-checks only give earlier, friendlier errors.

mod items;
mod reviews;

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::Value;

use crate::error::{CatalogError, CatalogResult};
use crate::model::{Item, Review};
use crate::normalization::{items_from_records, reviews_from_records, item_from_record, review_from_record};
use crate::store::{Collection, DocumentStore};

static ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("id pattern is valid"));

/// Reject ids that could never have been issued by the store.
pub fn check_id<'a>(entity: &str, id: &'a str) -> CatalogResult<&'a str> {
    let id = id.trim();
    if ID_PATTERN.is_match(id) {
        Ok(id)
    } else {
        Err(CatalogError::InvalidArgument(format!("malformed {entity} id '{id}'")))
    }
}

#[derive(Clone)]
pub struct Catalog {
    store: Arc<dyn DocumentStore>,
}

impl Catalog {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub async fn health(&self) -> CatalogResult<()> {
        self.store.ping().await.map_err(CatalogError::from)
    }

    async fn load_items(&self) -> CatalogResult<Vec<Item>> {
        let records = self.store.scan(Collection::Items).await?;
        Ok(items_from_records(&records))
    }

    async fn load_reviews(&self) -> CatalogResult<Vec<Review>> {
        let records = self.store.scan(Collection::Reviews).await?;
        Ok(reviews_from_records(&records))
    }

    async fn find_item(&self, id: &str) -> CatalogResult<Option<Item>> {
        Ok(self.find_item_record(id).await?.map(|(item, _)| item))
    }

    /// The mapped item together with the document it was read from.
    async fn find_item_record(&self, id: &str) -> CatalogResult<Option<(Item, Value)>> {
        let Some(record) = self.store.get(Collection::Items, id).await? else {
            return Ok(None);
        };
        Ok(item_from_record(&record).map(|mut item| {
            // Canonical records may omit the id inside the body.
            if item.id.is_empty() {
                item.id = id.to_string();
            }
            (item, record)
        }))
    }

    async fn find_review(&self, id: &str) -> CatalogResult<Option<Review>> {
        let record = self.store.get(Collection::Reviews, id).await?;
        Ok(record.as_ref().and_then(review_from_record).map(|mut review| {
            if review.id.is_empty() {
                review.id = id.to_string();
            }
            review
        }))
    }

    async fn items_by_id(&self) -> CatalogResult<HashMap<String, Item>> {
        Ok(self
            .load_items()
            .await?
            .into_iter()
            .map(|item| (item.id.clone(), item))
            .collect())
    }
}

/// Overlay a caller patch on the canonical view of a stored record.
fn merge_patch(current: Value, patch: &Value) -> CatalogResult<Value> {
    let patch = patch.as_object().ok_or_else(|| {
        CatalogError::InvalidArgument("update payload must be a JSON object".into())
    })?;
    let mut merged = match current {
        Value::Object(map) => map,
        _ => return Err(CatalogError::Internal("canonical record is not an object".into())),
    };
    for (key, value) in patch {
        merged.insert(key.clone(), value.clone());
    }
    Ok(Value::Object(merged))
}
