use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::{
    DimensionBucket, ItemTotals, RankedItem, RatedItem, ReviewStats, Stats, TrendBucket,
    DEFAULT_RANKING,
};
use crate::error::CatalogResult;
use crate::normalization::now_timestamp;

/// Every report in one payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub generated_at: String,
    pub totals: ItemTotals,
    pub by_category: Vec<DimensionBucket>,
    pub by_platform: Vec<DimensionBucket>,
    pub monthly_trend: Vec<TrendBucket>,
    pub top_by_hours: Vec<RankedItem>,
    pub top_rated: Vec<RatedItem>,
    pub reviews: ReviewStats,
}

impl Stats {
    /// Runs the reports concurrently; the first failure fails the dashboard.
    #[instrument(skip(self))]
    pub async fn dashboard(&self) -> CatalogResult<Dashboard> {
        let (totals, by_category, by_platform, monthly_trend, top_by_hours, top_rated, reviews) =
            futures::try_join!(
                self.item_totals(),
                self.by_category(),
                self.by_platform(),
                self.monthly_trend(),
                self.top_by_hours(DEFAULT_RANKING),
                self.top_rated(DEFAULT_RANKING),
                self.review_stats(),
            )
            .map_err(|e| e.in_operation("dashboard"))?;

        info!(
            items = totals.total,
            reviews = reviews.total,
            "dashboard assembled"
        );
        Ok(Dashboard {
            generated_at: now_timestamp(),
            totals,
            by_category,
            by_platform,
            monthly_trend,
            top_by_hours,
            top_rated,
            reviews,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::catalog::Catalog;
    use crate::error::ErrorKind;
    use crate::store::{DocumentStore, MemoryStore};
    use serde_json::json;

    #[tokio::test]
    async fn empty_catalog_dashboard() {
        let stats = Stats::new(Arc::new(MemoryStore::new()));
        let dash = stats.dashboard().await.unwrap();
        assert_eq!(dash.totals.total, 0);
        assert_eq!(dash.totals.percentage_completed, 0.0);
        assert!(dash.by_category.is_empty());
        assert!(dash.top_rated.is_empty());
        assert_eq!(dash.reviews.histogram.len(), 5);
    }

    #[tokio::test]
    async fn dashboard_combines_reports() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let catalog = Catalog::new(store.clone());
        let item = catalog
            .create_item(&json!({"title": "Outer Wilds", "category": "Adventure", "platform": "PC", "completed": true, "hoursPlayed": 22}))
            .await
            .unwrap();
        catalog
            .create_review(&json!({"itemId": item.id, "rating": 5, "body": "A mystery worth every minute"}))
            .await
            .unwrap();

        let dash = Stats::new(store).dashboard().await.unwrap();
        assert_eq!(dash.totals.percentage_completed, 100.0);
        assert_eq!(dash.by_category[0].value, "Adventure");
        assert_eq!(dash.monthly_trend.len(), 1);
        assert_eq!(dash.top_by_hours[0].hours_played, 22.0);
        assert_eq!(dash.top_rated[0].average_rating, 5.0);
        assert_eq!(dash.reviews.total, 1);
    }

    #[tokio::test]
    async fn dashboard_fails_as_a_whole() {
        let store = Arc::new(MemoryStore::new());
        store.close().await;
        let err = Stats::new(store).dashboard().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DependencyUnavailable);
        assert!(err.to_string().starts_with("dashboard failed"));
    }
}
