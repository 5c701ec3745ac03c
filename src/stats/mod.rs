//! Read-only reports over the whole collection.
//!
//! Stored documents go through the field mapper before they are counted, so
//! legacy and canonical records contribute alike. Every public report wraps
//! its failure with the report name.

mod audit;
mod dashboard;
pub mod items;
pub mod reviews;
pub mod round;

use std::sync::Arc;

use tracing::instrument;

use crate::catalog::check_id;
use crate::error::{CatalogError, CatalogResult};
use crate::model::{Item, Review};
use crate::normalization::{items_from_records, reviews_from_records};
use crate::store::{Collection, DocumentStore};

pub use audit::ShapeAudit;
pub use dashboard::Dashboard;
pub use items::{DimensionBucket, ItemTotals, RankedItem, TrendBucket};
pub use reviews::{RatedItem, ReviewStats};

pub const MAX_RANKING: usize = 50;
pub const DEFAULT_RANKING: usize = 5;

fn check_ranking(n: usize) -> CatalogResult<usize> {
    if (1..=MAX_RANKING).contains(&n) {
        Ok(n)
    } else {
        Err(CatalogError::InvalidArgument(format!(
            "ranking size must be between 1 and {MAX_RANKING}, got {n}"
        )))
    }
}

#[derive(Clone)]
pub struct Stats {
    store: Arc<dyn DocumentStore>,
}

impl Stats {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    async fn items(&self, operation: &'static str) -> CatalogResult<Vec<Item>> {
        self.store
            .scan(Collection::Items)
            .await
            .map(|records| items_from_records(&records))
            .map_err(|e| CatalogError::from(e).in_operation(operation))
    }

    async fn reviews(&self, operation: &'static str) -> CatalogResult<Vec<Review>> {
        self.store
            .scan(Collection::Reviews)
            .await
            .map(|records| reviews_from_records(&records))
            .map_err(|e| CatalogError::from(e).in_operation(operation))
    }

    #[instrument(skip(self))]
    pub async fn item_totals(&self) -> CatalogResult<ItemTotals> {
        let items = self.items("item_totals").await?;
        Ok(items::totals(&items))
    }

    #[instrument(skip(self))]
    pub async fn by_category(&self) -> CatalogResult<Vec<DimensionBucket>> {
        let items = self.items("by_category").await?;
        Ok(items::distribution(&items, |i| i.category.as_str()))
    }

    #[instrument(skip(self))]
    pub async fn by_platform(&self) -> CatalogResult<Vec<DimensionBucket>> {
        let items = self.items("by_platform").await?;
        Ok(items::distribution(&items, |i| i.platform.as_str()))
    }

    #[instrument(skip(self))]
    pub async fn monthly_trend(&self) -> CatalogResult<Vec<TrendBucket>> {
        let items = self.items("monthly_trend").await?;
        Ok(items::monthly_trend(&items))
    }

    #[instrument(skip(self))]
    pub async fn top_by_hours(&self, n: usize) -> CatalogResult<Vec<RankedItem>> {
        let n = check_ranking(n)?;
        let items = self.items("top_by_hours").await?;
        Ok(items::top_by_hours(&items, n))
    }

    #[instrument(skip(self))]
    pub async fn top_rated(&self, n: usize) -> CatalogResult<Vec<RatedItem>> {
        let n = check_ranking(n)?;
        let (items, reviews) =
            futures::try_join!(self.items("top_rated"), self.reviews("top_rated"))?;
        Ok(reviews::top_rated(&items, &reviews, n))
    }

    /// Rating summary for one item. An item without reviews, or one that does
    /// not exist, reports zero totals.
    #[instrument(skip(self))]
    pub async fn review_stats_for_item(&self, item_id: &str) -> CatalogResult<ReviewStats> {
        let item_id = check_id("item", item_id)?;
        let reviews: Vec<Review> = self
            .reviews("review_stats_for_item")
            .await?
            .into_iter()
            .filter(|r| r.item_id == item_id)
            .collect();
        Ok(reviews::summarize(&reviews))
    }

    #[instrument(skip(self))]
    pub async fn review_stats(&self) -> CatalogResult<ReviewStats> {
        let reviews = self.reviews("review_stats").await?;
        Ok(reviews::summarize(&reviews))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::error::ErrorKind;
    use crate::store::MemoryStore;
    use serde_json::json;

    async fn seeded() -> (Catalog, Stats) {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        (Catalog::new(store.clone()), Stats::new(store))
    }

    #[tokio::test]
    async fn top_by_hours_over_catalog() {
        let (catalog, stats) = seeded().await;
        for (title, hours) in [("Zero", 0), ("Five", 5), ("Ten", 10)] {
            catalog
                .create_item(&json!({"title": title, "category": "RPG", "platform": "PC", "hoursPlayed": hours}))
                .await
                .unwrap();
        }
        let top = stats.top_by_hours(2).await.unwrap();
        let titles: Vec<&str> = top.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Ten", "Five"]);

        let all = stats.top_by_hours(MAX_RANKING).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn ranking_size_is_bounded() {
        let (_, stats) = seeded().await;
        for n in [0, MAX_RANKING + 1] {
            let err = stats.top_rated(n).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        }
    }

    #[tokio::test]
    async fn item_review_stats_with_and_without_reviews() {
        let (catalog, stats) = seeded().await;
        let item = catalog
            .create_item(&json!({"title": "Celeste", "category": "Platformer", "platform": "PC"}))
            .await
            .unwrap();
        for (author, rating) in [("ana", 4), ("bo", 5)] {
            catalog
                .create_review(&json!({
                    "itemId": item.id,
                    "rating": rating,
                    "author": author,
                    "body": "Tight controls and a great soundtrack"
                }))
                .await
                .unwrap();
        }
        let summary = stats.review_stats_for_item(&item.id).await.unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.average_rating, 4.5);
        assert_eq!((summary.min_rating, summary.max_rating), (Some(4), Some(5)));

        let empty = stats.review_stats_for_item("no-such-item").await.unwrap();
        assert_eq!(empty.total, 0);
        assert_eq!(empty.average_rating, 0.0);
    }

    #[tokio::test]
    async fn store_failures_name_the_report() {
        let store = Arc::new(MemoryStore::new());
        store.close().await;
        let stats = Stats::new(store);
        let err = stats.by_platform().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DependencyUnavailable);
        assert!(err.to_string().starts_with("by_platform failed"));
    }
}
