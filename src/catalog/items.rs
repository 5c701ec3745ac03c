use serde_json::{Map, Value};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{check_id, merge_patch, Catalog};
use crate::error::{CatalogError, CatalogResult};
use crate::model::{title_key, Item, Page, UNKNOWN_TIMESTAMP};
use crate::normalization::item::{STORAGE_CREATED_AT, STORAGE_ID, STORAGE_TITLE, STORAGE_UPDATED_AT};
use crate::normalization::{has_release_year, item_from_record, item_to_storage, now_timestamp};
use crate::query::{build_item_query, Criteria};
use crate::store::{Collection, StoredDoc};
use crate::validation::validate_item;

fn stored_title(doc: &Map<String, Value>) -> String {
    doc.get(STORAGE_TITLE)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string()
}

fn to_item(doc: Map<String, Value>) -> CatalogResult<Item> {
    item_from_record(&Value::Object(doc))
        .ok_or_else(|| CatalogError::Internal("stored item did not map back".into()))
}

impl Catalog {
    #[instrument(skip(self))]
    pub async fn list_items(&self, criteria: &Criteria) -> CatalogResult<Page<Item>> {
        let plan = build_item_query(criteria)?;
        let items = self.load_items().await?;
        Ok(plan.apply(items))
    }

    pub async fn get_item(&self, id: &str) -> CatalogResult<Item> {
        let id = check_id("item", id)?;
        self.find_item(id)
            .await?
            .ok_or_else(|| CatalogError::not_found("item", id))
    }

    /// Fails with `DuplicateEntity` if another item (other than `except_id`) has the same title.
    async fn ensure_title_free(&self, title: &str, except_id: Option<&str>) -> CatalogResult<()> {
        let key = title_key(title);
        let taken = self
            .load_items()
            .await?
            .into_iter()
            .any(|item| item.title_key() == key && Some(item.id.as_str()) != except_id);
        if taken {
            return Err(CatalogError::duplicate(
                "item",
                format!("an item titled '{title}' already exists"),
            ));
        }
        Ok(())
    }

    #[instrument(skip(self, payload))]
    pub async fn create_item(&self, payload: &Value) -> CatalogResult<Item> {
        let mut doc = item_to_storage(payload);
        validate_item(&doc)?;

        let title = stored_title(&doc);
        self.ensure_title_free(&title, None).await?;

        let id = Uuid::new_v4().to_string();
        let now = now_timestamp();
        doc.insert(STORAGE_ID.into(), Value::from(id.as_str()));
        doc.insert(STORAGE_CREATED_AT.into(), Value::from(now.as_str()));
        doc.insert(STORAGE_UPDATED_AT.into(), Value::from(now));

        self.store
            .insert(
                Collection::Items,
                StoredDoc::new(&id, Some(title_key(&title)), Value::Object(doc.clone())),
            )
            .await
            .map_err(CatalogError::from)?;
        info!(item_id = %id, title = %title, "item created");
        to_item(doc)
    }

    #[instrument(skip(self, patch))]
    pub async fn update_item(&self, id: &str, patch: &Value) -> CatalogResult<Item> {
        let id = check_id("item", id)?;
        let (current, record) = self
            .find_item_record(id)
            .await?
            .ok_or_else(|| CatalogError::not_found("item", id))?;

        let mut base = serde_json::to_value(&current)?;
        if !has_release_year(&record) {
            // The mapped year is a display fallback; keep it out of storage.
            if let Some(obj) = base.as_object_mut() {
                obj.remove("releaseYear");
            }
        }
        let merged = merge_patch(base, patch)?;
        let mut doc = item_to_storage(&merged);
        validate_item(&doc)?;

        let title = stored_title(&doc);
        if title_key(&title) != current.title_key() {
            self.ensure_title_free(&title, Some(id)).await?;
        }

        doc.insert(STORAGE_ID.into(), Value::from(id));
        if current.created_at != UNKNOWN_TIMESTAMP {
            doc.insert(STORAGE_CREATED_AT.into(), Value::from(current.created_at.as_str()));
        }
        doc.insert(STORAGE_UPDATED_AT.into(), Value::from(now_timestamp()));

        let replaced = self
            .store
            .replace(
                Collection::Items,
                StoredDoc::new(id, Some(title_key(&title)), Value::Object(doc.clone())),
            )
            .await?;
        if !replaced {
            return Err(CatalogError::not_found("item", id));
        }
        info!(item_id = %id, "item updated");
        to_item(doc)
    }

    /// Hard delete. Reviews that reference the item are kept.
    #[instrument(skip(self))]
    pub async fn delete_item(&self, id: &str) -> CatalogResult<Item> {
        let id = check_id("item", id)?;
        let current = self
            .find_item(id)
            .await?
            .ok_or_else(|| CatalogError::not_found("item", id))?;
        if !self.store.delete(Collection::Items, id).await? {
            return Err(CatalogError::not_found("item", id));
        }
        info!(item_id = %id, "item deleted; reviews retained");
        Ok(current)
    }
}
