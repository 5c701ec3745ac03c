use serde_json::{Map, Value};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{check_id, merge_patch, Catalog};
use crate::error::{CatalogError, CatalogResult};
use crate::model::{is_anonymous, review_author_key, Difficulty, Page, Review, ANONYMOUS_AUTHOR, UNKNOWN_TIMESTAMP};
use crate::normalization::review::{
    STORAGE_AUTHOR, STORAGE_CREATED_AT, STORAGE_DIFFICULTY, STORAGE_ID, STORAGE_ITEM_ID,
    STORAGE_UPDATED_AT,
};
use crate::normalization::{now_timestamp, review_from_record, review_to_storage};
use crate::query::{build_review_query, Criteria, Direction, SortSpec};
use crate::store::{Collection, StoredDoc};
use crate::validation::validate_review;

fn stored_text(doc: &Map<String, Value>, key: &str) -> String {
    doc.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Fill in the author and difficulty defaults for a review about to be written.
fn apply_defaults(doc: &mut Map<String, Value>) {
    // Non-string authors are left alone so validation can report them.
    let anonymous = match doc.get(STORAGE_AUTHOR) {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => is_anonymous(s),
        Some(_) => false,
    };
    if anonymous {
        doc.insert(STORAGE_AUTHOR.into(), Value::from(ANONYMOUS_AUTHOR));
    }
    if !doc.contains_key(STORAGE_DIFFICULTY) {
        doc.insert(
            STORAGE_DIFFICULTY.into(),
            Value::from(Difficulty::default().as_str()),
        );
    }
}

fn to_review(doc: Map<String, Value>) -> CatalogResult<Review> {
    review_from_record(&Value::Object(doc))
        .ok_or_else(|| CatalogError::Internal("stored review did not map back".into()))
}

impl Catalog {
    #[instrument(skip(self))]
    pub async fn list_reviews(&self, criteria: &Criteria, enrich: bool) -> CatalogResult<Page<Review>> {
        let plan = build_review_query(criteria)?;
        let mut page = plan.apply(self.load_reviews().await?);
        if enrich {
            self.enrich_all(&mut page.items).await?;
        }
        Ok(page)
    }

    pub async fn get_review(&self, id: &str, enrich: bool) -> CatalogResult<Review> {
        let id = check_id("review", id)?;
        let mut review = self
            .find_review(id)
            .await?
            .ok_or_else(|| CatalogError::not_found("review", id))?;
        if enrich {
            if let Some(item) = self.find_item(&review.item_id).await? {
                review.enrich(&item);
            }
        }
        Ok(review)
    }

    /// Every review that references `item_id`, newest first. The item itself may be gone.
    pub async fn reviews_for_item(&self, item_id: &str, enrich: bool) -> CatalogResult<Vec<Review>> {
        let item_id = check_id("item", item_id)?;
        let newest_first = SortSpec {
            direction: Direction::Desc,
            ..SortSpec::default()
        };
        let mut reviews: Vec<Review> = self
            .load_reviews()
            .await?
            .into_iter()
            .filter(|r| r.item_id == item_id)
            .collect();
        reviews.sort_by(|a, b| newest_first.compare(a, b));
        if enrich {
            self.enrich_all(&mut reviews).await?;
        }
        Ok(reviews)
    }

    async fn enrich_all(&self, reviews: &mut [Review]) -> CatalogResult<()> {
        let items = self.items_by_id().await?;
        for review in reviews.iter_mut() {
            if let Some(item) = items.get(&review.item_id) {
                review.enrich(item);
            }
        }
        Ok(())
    }

    /// One review per named author per item; anonymous reviews are unrestricted.
    async fn ensure_author_free(
        &self,
        item_id: &str,
        author: &str,
        except_id: Option<&str>,
    ) -> CatalogResult<()> {
        let Some(key) = review_author_key(item_id, author) else {
            return Ok(());
        };
        let taken = self.load_reviews().await?.into_iter().any(|r| {
            review_author_key(&r.item_id, &r.author).as_deref() == Some(key.as_str())
                && Some(r.id.as_str()) != except_id
        });
        if taken {
            return Err(CatalogError::duplicate(
                "review",
                format!("'{}' has already reviewed item {item_id}", author.trim()),
            ));
        }
        Ok(())
    }

    async fn require_item(&self, item_id: &str) -> CatalogResult<()> {
        let item_id = check_id("item", item_id)?;
        match self.find_item(item_id).await? {
            Some(_) => Ok(()),
            None => Err(CatalogError::not_found("item", item_id)),
        }
    }

    #[instrument(skip(self, payload))]
    pub async fn create_review(&self, payload: &Value) -> CatalogResult<Review> {
        let mut doc = review_to_storage(payload);
        apply_defaults(&mut doc);
        validate_review(&doc)?;

        let item_id = stored_text(&doc, STORAGE_ITEM_ID);
        let author = stored_text(&doc, STORAGE_AUTHOR);
        self.require_item(&item_id).await?;
        self.ensure_author_free(&item_id, &author, None).await?;

        let id = Uuid::new_v4().to_string();
        let now = now_timestamp();
        doc.insert(STORAGE_ITEM_ID.into(), Value::from(item_id.as_str()));
        doc.insert(STORAGE_ID.into(), Value::from(id.as_str()));
        doc.insert(STORAGE_CREATED_AT.into(), Value::from(now.as_str()));
        doc.insert(STORAGE_UPDATED_AT.into(), Value::from(now));

        self.store
            .insert(
                Collection::Reviews,
                StoredDoc::new(&id, review_author_key(&item_id, &author), Value::Object(doc.clone())),
            )
            .await?;
        info!(review_id = %id, item_id = %item_id, "review created");
        to_review(doc)
    }

    #[instrument(skip(self, patch))]
    pub async fn update_review(&self, id: &str, patch: &Value) -> CatalogResult<Review> {
        let id = check_id("review", id)?;
        let current = self
            .find_review(id)
            .await?
            .ok_or_else(|| CatalogError::not_found("review", id))?;

        let merged = merge_patch(serde_json::to_value(&current)?, patch)?;
        let mut doc = review_to_storage(&merged);
        apply_defaults(&mut doc);
        validate_review(&doc)?;

        let item_id = stored_text(&doc, STORAGE_ITEM_ID);
        let author = stored_text(&doc, STORAGE_AUTHOR);
        if item_id != current.item_id {
            self.require_item(&item_id).await?;
        }
        if review_author_key(&item_id, &author) != review_author_key(&current.item_id, &current.author) {
            self.ensure_author_free(&item_id, &author, Some(id)).await?;
        }

        doc.insert(STORAGE_ITEM_ID.into(), Value::from(item_id.as_str()));
        doc.insert(STORAGE_ID.into(), Value::from(id));
        if current.created_at != UNKNOWN_TIMESTAMP {
            doc.insert(STORAGE_CREATED_AT.into(), Value::from(current.created_at.as_str()));
        }
        doc.insert(STORAGE_UPDATED_AT.into(), Value::from(now_timestamp()));

        let replaced = self
            .store
            .replace(
                Collection::Reviews,
                StoredDoc::new(id, review_author_key(&item_id, &author), Value::Object(doc.clone())),
            )
            .await?;
        if !replaced {
            return Err(CatalogError::not_found("review", id));
        }
        info!(review_id = %id, "review updated");
        to_review(doc)
    }

    #[instrument(skip(self))]
    pub async fn delete_review(&self, id: &str) -> CatalogResult<Review> {
        let id = check_id("review", id)?;
        let current = self
            .find_review(id)
            .await?
            .ok_or_else(|| CatalogError::not_found("review", id))?;
        if !self.store.delete(Collection::Reviews, id).await? {
            return Err(CatalogError::not_found("review", id));
        }
        info!(review_id = %id, "review deleted");
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::ErrorKind;
    use crate::model::Item;
    use crate::store::{DocumentStore, MemoryStore};
    use serde_json::json;

    async fn seeded() -> (Catalog, Item) {
        let catalog = Catalog::new(Arc::new(MemoryStore::new()));
        let item = catalog
            .create_item(&json!({"title": "Celeste", "category": "Platformer", "platform": "PC"}))
            .await
            .unwrap();
        (catalog, item)
    }

    fn review_for(item_id: &str, rating: u8, author: Option<&str>) -> Value {
        let mut body = json!({
            "itemId": item_id,
            "rating": rating,
            "body": "Precise controls and a kind story."
        });
        if let Some(author) = author {
            body["author"] = json!(author);
        }
        body
    }

    #[tokio::test]
    async fn defaults_author_and_difficulty() {
        let (catalog, item) = seeded().await;
        let review = catalog.create_review(&review_for(&item.id, 5, None)).await.unwrap();
        assert_eq!(review.author, ANONYMOUS_AUTHOR);
        assert_eq!(review.difficulty, "Normal");
        assert_eq!(review.item_id, item.id);
        assert!(review.item_title.is_none());
    }

    #[tokio::test]
    async fn unknown_item_is_not_found_and_not_persisted() {
        let (catalog, _) = seeded().await;
        let err = catalog
            .create_review(&review_for("no-such-item", 4, None))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(catalog.store().count(Collection::Reviews).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn one_review_per_named_author() {
        let (catalog, item) = seeded().await;
        catalog
            .create_review(&review_for(&item.id, 4, Some("Madeline")))
            .await
            .unwrap();
        let err = catalog
            .create_review(&review_for(&item.id, 2, Some("madeline ")))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateEntity);

        // Anonymous reviewers may post any number of times.
        for _ in 0..2 {
            catalog
                .create_review(&review_for(&item.id, 3, Some("anonymous")))
                .await
                .unwrap();
        }
        assert_eq!(catalog.reviews_for_item(&item.id, false).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn update_moving_to_missing_item_fails() {
        let (catalog, item) = seeded().await;
        let review = catalog.create_review(&review_for(&item.id, 4, None)).await.unwrap();
        let err = catalog
            .update_review(&review.id, &json!({"itemId": "gone"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let updated = catalog
            .update_review(&review.id, &json!({"rating": 2, "difficulty": "hard"}))
            .await
            .unwrap();
        assert_eq!(updated.rating, 2);
        assert_eq!(updated.difficulty, "Hard");
        assert_eq!(updated.created_at, review.created_at);
    }

    #[tokio::test]
    async fn deleting_item_keeps_reviews() {
        let (catalog, item) = seeded().await;
        let review = catalog.create_review(&review_for(&item.id, 5, None)).await.unwrap();
        catalog.delete_item(&item.id).await.unwrap();

        let orphan = catalog.get_review(&review.id, true).await.unwrap();
        assert_eq!(orphan.item_id, item.id);
        assert!(orphan.item_title.is_none());
        assert_eq!(catalog.reviews_for_item(&item.id, true).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn enriched_listing_joins_item_fields() {
        let (catalog, item) = seeded().await;
        catalog
            .create_review(&review_for(&item.id, 5, Some("Theo")))
            .await
            .unwrap();
        let criteria: Criteria = [("itemId".to_string(), item.id.clone())].into_iter().collect();
        let page = catalog.list_reviews(&criteria, true).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].item_title.as_deref(), Some("Celeste"));
        assert_eq!(page.items[0].item_category.as_deref(), Some("Platformer"));

        let plain = catalog.get_review(&page.items[0].id, false).await.unwrap();
        assert!(plain.item_title.is_none());
    }

    #[tokio::test]
    async fn validation_reports_all_review_fields() {
        let (catalog, _) = seeded().await;
        let err = catalog.create_review(&json!({"rating": 0})).await.unwrap_err();
        let fields: Vec<_> = err.fields().iter().map(|f| f.field.as_str()).collect();
        assert_eq!(fields, vec!["itemId", "rating", "body"]);
    }
}
