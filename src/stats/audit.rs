use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::Stats;
use crate::error::{CatalogError, CatalogResult};
use crate::normalization::{detect_shape, EntityKind, Shape};
use crate::store::Collection;

/// How many documents of one collection use each layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeAudit {
    pub collection: String,
    pub total: u64,
    pub canonical: u64,
    pub legacy: u64,
    pub mixed: u64,
    pub malformed: u64,
}

impl ShapeAudit {
    fn record(&mut self, shape: Shape) {
        self.total += 1;
        match shape {
            Shape::Canonical => self.canonical += 1,
            Shape::Legacy => self.legacy += 1,
            Shape::Mixed => self.mixed += 1,
            Shape::Malformed => self.malformed += 1,
        }
    }
}

fn entity_kind(collection: Collection) -> EntityKind {
    match collection {
        Collection::Items => EntityKind::Item,
        Collection::Reviews => EntityKind::Review,
    }
}

impl Stats {
    #[instrument(skip(self))]
    pub async fn shape_audit(&self) -> CatalogResult<Vec<ShapeAudit>> {
        let mut audits = Vec::with_capacity(Collection::ALL.len());
        for collection in Collection::ALL {
            let records = self
                .store
                .scan(collection)
                .await
                .map_err(|e| CatalogError::from(e).in_operation("shape_audit"))?;
            let kind = entity_kind(collection);
            let mut audit = ShapeAudit {
                collection: collection.as_str().to_string(),
                ..ShapeAudit::default()
            };
            for record in &records {
                audit.record(detect_shape(record, kind));
            }
            if audit.mixed > 0 || audit.malformed > 0 {
                warn!(
                    collection = %audit.collection,
                    mixed = audit.mixed,
                    malformed = audit.malformed,
                    "documents need attention"
                );
            }
            info!(collection = %audit.collection, total = audit.total, legacy = audit.legacy, "audited");
            audits.push(audit);
        }
        Ok(audits)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::store::{DocumentStore, MemoryStore, StoredDoc};
    use serde_json::json;

    #[tokio::test]
    async fn counts_each_layout() {
        let store = Arc::new(MemoryStore::new());
        let docs = [
            ("a", json!({"_id": "a", "name": "Legacy", "genre": "RPG"})),
            ("b", json!({"id": "b", "title": "Canonical"})),
            ("c", json!({"id": "c", "name": "Both"})),
            ("d", json!({"unrelated": true})),
        ];
        for (id, body) in docs {
            store
                .insert(Collection::Items, StoredDoc::new(id, None, body))
                .await
                .unwrap();
        }
        let audits = Stats::new(store).shape_audit().await.unwrap();
        assert_eq!(audits.len(), 2);
        let items = &audits[0];
        assert_eq!(items.collection, Collection::Items.as_str());
        assert_eq!(
            (items.total, items.legacy, items.canonical, items.mixed, items.malformed),
            (4, 1, 1, 1, 1)
        );
        assert_eq!(audits[1].total, 0);
    }
}
