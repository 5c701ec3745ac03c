//! Bulk load of raw documents, in either layout, straight into the store.
//!
//! Documents are stored as given so that legacy records stay legacy. The field
//! mapper is only consulted to derive the id and the unique key.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog::check_id;
use crate::model::{review_author_key, title_key};
use crate::normalization::item::STORAGE_ID;
use crate::normalization::{item_from_record, review_from_record};
use crate::store::{Collection, DocumentStore, StoreError, StoredDoc};

const CANONICAL_ID: &str = "id";

#[derive(Debug, Clone, Default)]
pub struct ImportConfig {
    pub items: Option<PathBuf>,
    pub reviews: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub collection: String,
    pub read: u64,
    pub inserted: u64,
    pub duplicates: u64,
    pub rejected: u64,
}

/// A JSON array, or one JSON document per line.
pub fn parse_documents(raw: &str) -> Result<Vec<Value>> {
    let trimmed = raw.trim_start();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).context("parsing JSON array");
    }
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line).with_context(|| format!("parsing line {}", n + 1))
        })
        .collect()
}

/// Id and unique key for a raw document; `None` for non-objects.
///
/// Missing ids, and ids the catalog could not address later, get a fresh UUID.
fn identify(collection: Collection, doc: &mut Value) -> Option<(String, Option<String>)> {
    let (id, unique_key) = match collection {
        Collection::Items => {
            let item = item_from_record(doc)?;
            let key = Some(title_key(&item.title)).filter(|k| !k.is_empty());
            (item.id, key)
        }
        Collection::Reviews => {
            let review = review_from_record(doc)?;
            let key = review_author_key(&review.item_id, &review.author);
            (review.id, key)
        }
    };
    if let Ok(valid) = check_id(collection.entity_name(), &id) {
        return Some((valid.to_string(), unique_key));
    }
    let obj = doc.as_object_mut()?;
    let fresh = Uuid::new_v4().to_string();
    if !id.is_empty() {
        warn!(collection = collection.as_str(), original = %id, id = %fresh, "unusable id replaced");
    }
    // Overwrite whichever key the mapper reads the id from.
    let key = if obj.contains_key(CANONICAL_ID) { CANONICAL_ID } else { STORAGE_ID };
    obj.insert(key.to_string(), Value::from(fresh.as_str()));
    Some((fresh, unique_key))
}

pub async fn import_documents(
    store: &dyn DocumentStore,
    collection: Collection,
    documents: Vec<Value>,
) -> Result<ImportSummary> {
    let mut summary = ImportSummary {
        collection: collection.as_str().to_string(),
        ..ImportSummary::default()
    };
    for mut doc in documents {
        summary.read += 1;
        let Some((id, unique_key)) = identify(collection, &mut doc) else {
            summary.rejected += 1;
            continue;
        };
        match store
            .insert(collection, StoredDoc::new(id.as_str(), unique_key, doc))
            .await
        {
            Ok(()) => summary.inserted += 1,
            Err(StoreError::Conflict { key, .. }) => {
                warn!(collection = collection.as_str(), id = %id, key = %key, "duplicate skipped");
                summary.duplicates += 1;
            }
            Err(e) => return Err(e).context(format!("importing into {}", collection.as_str())),
        }
    }
    info!(
        collection = collection.as_str(),
        read = summary.read,
        inserted = summary.inserted,
        duplicates = summary.duplicates,
        rejected = summary.rejected,
        "import finished"
    );
    Ok(summary)
}

async fn import_file(
    store: &dyn DocumentStore,
    collection: Collection,
    path: &Path,
) -> Result<ImportSummary> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let documents = parse_documents(&raw).with_context(|| format!("in {}", path.display()))?;
    import_documents(store, collection, documents).await
}

/// Items are loaded before reviews.
pub async fn run(store: Arc<dyn DocumentStore>, cfg: ImportConfig) -> Result<Vec<ImportSummary>> {
    if cfg.items.is_none() && cfg.reviews.is_none() {
        anyhow::bail!("nothing to import: pass --items and/or --reviews");
    }
    let mut summaries = Vec::new();
    if let Some(path) = &cfg.items {
        summaries.push(import_file(store.as_ref(), Collection::Items, path).await?);
    }
    if let Some(path) = &cfg.reviews {
        summaries.push(import_file(store.as_ref(), Collection::Reviews, path).await?);
    }
    Ok(summaries)
}
