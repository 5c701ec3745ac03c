use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use super::{Collection, DocumentStore, StoreError, StoredDoc};

#[derive(Debug, Clone)]
struct Entry {
    unique_key: Option<String>,
    body: Value,
}

type Table = IndexMap<String, Entry>;

/// Process-local store used for tests and throwaway CLI sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<Collection, Table>>,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store closed".into()))
        } else {
            Ok(())
        }
    }
}

fn key_taken(table: &Table, key: Option<&str>, except_id: &str) -> bool {
    let Some(key) = key else {
        return false;
    };
    table
        .iter()
        .any(|(id, e)| id != except_id && e.unique_key.as_deref() == Some(key))
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, collection: Collection, doc: StoredDoc) -> Result<(), StoreError> {
        self.ensure_open()?;
        let mut tables = self.tables.write().await;
        let table = tables.entry(collection).or_default();
        if table.contains_key(&doc.id) {
            return Err(StoreError::Conflict {
                collection,
                key: doc.id,
            });
        }
        if key_taken(table, doc.unique_key.as_deref(), &doc.id) {
            return Err(StoreError::Conflict {
                collection,
                key: doc.unique_key.unwrap_or_default(),
            });
        }
        debug!(collection = collection.as_str(), id = %doc.id, "memory insert");
        table.insert(
            doc.id,
            Entry {
                unique_key: doc.unique_key,
                body: doc.body,
            },
        );
        Ok(())
    }

    async fn replace(&self, collection: Collection, doc: StoredDoc) -> Result<bool, StoreError> {
        self.ensure_open()?;
        let mut tables = self.tables.write().await;
        let table = tables.entry(collection).or_default();
        if !table.contains_key(&doc.id) {
            return Ok(false);
        }
        if key_taken(table, doc.unique_key.as_deref(), &doc.id) {
            return Err(StoreError::Conflict {
                collection,
                key: doc.unique_key.unwrap_or_default(),
            });
        }
        if let Some(entry) = table.get_mut(&doc.id) {
            entry.unique_key = doc.unique_key;
            entry.body = doc.body;
        }
        Ok(true)
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>, StoreError> {
        self.ensure_open()?;
        let tables = self.tables.read().await;
        Ok(tables
            .get(&collection)
            .and_then(|t| t.get(id))
            .map(|e| e.body.clone()))
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
        self.ensure_open()?;
        let mut tables = self.tables.write().await;
        Ok(tables
            .get_mut(&collection)
            .and_then(|t| t.shift_remove(id))
            .is_some())
    }

    async fn scan(&self, collection: Collection) -> Result<Vec<Value>, StoreError> {
        self.ensure_open()?;
        let tables = self.tables.read().await;
        Ok(tables
            .get(&collection)
            .map(|t| t.values().map(|e| e.body.clone()).collect())
            .unwrap_or_default())
    }

    async fn count(&self, collection: Collection) -> Result<u64, StoreError> {
        self.ensure_open()?;
        let tables = self.tables.read().await;
        Ok(tables.get(&collection).map(|t| t.len() as u64).unwrap_or(0))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.ensure_open()
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn unique_key_rejects_second_insert() {
        let store = MemoryStore::new();
        store
            .insert(
                Collection::Items,
                StoredDoc::new("a", Some("zelda".into()), json!({"_id": "a"})),
            )
            .await
            .unwrap();
        let err = store
            .insert(
                Collection::Items,
                StoredDoc::new("b", Some("zelda".into()), json!({"_id": "b"})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        assert_eq!(store.count(Collection::Items).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn replace_keeps_scan_position() {
        let store = MemoryStore::new();
        for id in ["a", "b", "c"] {
            store
                .insert(Collection::Items, StoredDoc::new(id, None, json!({"_id": id})))
                .await
                .unwrap();
        }
        let replaced = store
            .replace(
                Collection::Items,
                StoredDoc::new("a", None, json!({"_id": "a", "name": "x"})),
            )
            .await
            .unwrap();
        assert!(replaced);
        let ids: Vec<_> = store
            .scan(Collection::Items)
            .await
            .unwrap()
            .into_iter()
            .map(|v| v["_id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn replace_may_keep_its_own_key() {
        let store = MemoryStore::new();
        store
            .insert(
                Collection::Items,
                StoredDoc::new("a", Some("k".into()), json!({})),
            )
            .await
            .unwrap();
        assert!(store
            .replace(Collection::Items, StoredDoc::new("a", Some("k".into()), json!({})))
            .await
            .unwrap());
        assert!(!store
            .replace(Collection::Items, StoredDoc::new("zz", None, json!({})))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn closed_store_is_unavailable() {
        let store = MemoryStore::new();
        store.close().await;
        assert!(matches!(
            store.scan(Collection::Reviews).await,
            Err(StoreError::Unavailable(_))
        ));
    }
}
