use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Row, SqlitePool,
};
use tracing::{debug, info, instrument};

use super::{Collection, DocumentStore, StoreError, StoredDoc};

const SCHEMA: [&str; 2] = [
    r#"
    CREATE TABLE IF NOT EXISTS documents (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        collection TEXT NOT NULL,
        id TEXT NOT NULL,
        unique_key TEXT,
        body TEXT NOT NULL,
        UNIQUE (collection, id)
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS documents_unique_key
        ON documents (collection, unique_key)
        WHERE unique_key IS NOT NULL
    "#,
];

/// SQLite-backed document store. Bodies are stored as JSON text.
#[derive(Clone)]
pub struct SqliteStore {
    pub(crate) pool: SqlitePool,
}

fn is_memory_url(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

impl SqliteStore {
    // SECURITY: never include raw DSNs in tracing spans.
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| StoreError::Unavailable(format!("invalid sqlite url: {e}")))?
            .create_if_missing(true);

        // Every connection to `:memory:` opens a fresh database, so pin the pool to one
        // connection that never expires.
        let pool_options = if is_memory_url(database_url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
                .max_connections(max_connections.max(1))
                .acquire_timeout(Duration::from_secs(10))
                .idle_timeout(Duration::from_secs(600))
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(|e| StoreError::Unavailable(format!("schema setup failed: {e}")))?;
        }
        info!("connected to sqlite document store");
        Ok(Self { pool })
    }

    /// Fresh private in-memory database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        Self::connect("sqlite::memory:", 1).await
    }
}

fn classify(err: sqlx::Error, collection: Collection, key: &str) -> StoreError {
    if err
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation())
    {
        return StoreError::Conflict {
            collection,
            key: key.to_string(),
        };
    }
    match err {
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            StoreError::Corrupt(err.to_string())
        }
        other => StoreError::Unavailable(other.to_string()),
    }
}

fn parse_body(raw: &str) -> Result<Value, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn encode_body(body: &Value) -> Result<String, StoreError> {
    serde_json::to_string(body).map_err(|e| StoreError::Corrupt(e.to_string()))
}

#[async_trait]
impl DocumentStore for SqliteStore {
    #[instrument(skip(self, doc), fields(collection = collection.as_str(), id = %doc.id))]
    async fn insert(&self, collection: Collection, doc: StoredDoc) -> Result<(), StoreError> {
        let body = encode_body(&doc.body)?;
        let conflict_key = doc.unique_key.clone().unwrap_or_else(|| doc.id.clone());
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, unique_key, body)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(collection.as_str())
        .bind(&doc.id)
        .bind(&doc.unique_key)
        .bind(body)
        .execute(&self.pool)
        .await
        .map_err(|e| classify(e, collection, &conflict_key))?;
        debug!("sqlite insert");
        Ok(())
    }

    #[instrument(skip(self, doc), fields(collection = collection.as_str(), id = %doc.id))]
    async fn replace(&self, collection: Collection, doc: StoredDoc) -> Result<bool, StoreError> {
        let body = encode_body(&doc.body)?;
        let conflict_key = doc.unique_key.clone().unwrap_or_else(|| doc.id.clone());
        let result = sqlx::query(
            r#"
            UPDATE documents SET unique_key = ?1, body = ?2
            WHERE collection = ?3 AND id = ?4
            "#,
        )
        .bind(&doc.unique_key)
        .bind(body)
        .bind(collection.as_str())
        .bind(&doc.id)
        .execute(&self.pool)
        .await
        .map_err(|e| classify(e, collection, &conflict_key))?;
        Ok(result.rows_affected() > 0)
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>, StoreError> {
        let row = sqlx::query("SELECT body FROM documents WHERE collection = ?1 AND id = ?2")
            .bind(collection.as_str())
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| classify(e, collection, id))?;
        match row {
            Some(row) => {
                let raw: String = row
                    .try_get("body")
                    .map_err(|e| classify(e, collection, id))?;
                parse_body(&raw).map(Some)
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self), fields(collection = collection.as_str()))]
    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = ?1 AND id = ?2")
            .bind(collection.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| classify(e, collection, id))?;
        Ok(result.rows_affected() > 0)
    }

    async fn scan(&self, collection: Collection) -> Result<Vec<Value>, StoreError> {
        let rows = sqlx::query("SELECT body FROM documents WHERE collection = ?1 ORDER BY seq")
            .bind(collection.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| classify(e, collection, ""))?;
        rows.iter()
            .map(|row| {
                let raw: String = row
                    .try_get("body")
                    .map_err(|e| classify(e, collection, ""))?;
                parse_body(&raw)
            })
            .collect()
    }

    async fn count(&self, collection: Collection) -> Result<u64, StoreError> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE collection = ?1")
            .bind(collection.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| classify(e, collection, ""))?;
        Ok(n.max(0) as u64)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn insert_get_delete_cycle() {
        let store = SqliteStore::in_memory().await.unwrap();
        store
            .insert(
                Collection::Items,
                StoredDoc::new("g1", Some("halo".into()), json!({"_id": "g1", "name": "Halo"})),
            )
            .await
            .unwrap();
        let got = store.get(Collection::Items, "g1").await.unwrap().unwrap();
        assert_eq!(got["name"], "Halo");
        assert!(store.get(Collection::Reviews, "g1").await.unwrap().is_none());
        assert!(store.delete(Collection::Items, "g1").await.unwrap());
        assert!(!store.delete(Collection::Items, "g1").await.unwrap());
    }

    #[tokio::test]
    async fn unique_index_surfaces_conflict() {
        let store = SqliteStore::in_memory().await.unwrap();
        store
            .insert(Collection::Items, StoredDoc::new("a", Some("halo".into()), json!({})))
            .await
            .unwrap();
        let err = store
            .insert(Collection::Items, StoredDoc::new("b", Some("halo".into()), json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { ref key, .. } if key == "halo"));

        // NULL keys never collide.
        store
            .insert(Collection::Reviews, StoredDoc::new("r1", None, json!({})))
            .await
            .unwrap();
        store
            .insert(Collection::Reviews, StoredDoc::new("r2", None, json!({})))
            .await
            .unwrap();
        assert_eq!(store.count(Collection::Reviews).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn scan_follows_insertion_order() {
        let store = SqliteStore::in_memory().await.unwrap();
        for id in ["c", "a", "b"] {
            store
                .insert(Collection::Items, StoredDoc::new(id, None, json!({"_id": id})))
                .await
                .unwrap();
        }
        store
            .replace(Collection::Items, StoredDoc::new("c", None, json!({"_id": "c", "v": 2})))
            .await
            .unwrap();
        let ids: Vec<String> = store
            .scan(Collection::Items)
            .await
            .unwrap()
            .iter()
            .map(|v| v["_id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn persists_across_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("catalog.db").display());
        {
            let store = SqliteStore::connect(&url, 2).await.unwrap();
            store
                .insert(Collection::Items, StoredDoc::new("g1", None, json!({"_id": "g1"})))
                .await
                .unwrap();
            store.close().await;
        }
        let store = SqliteStore::connect(&url, 2).await.unwrap();
        assert_eq!(store.count(Collection::Items).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn closed_pool_is_unavailable() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.close().await;
        assert!(matches!(
            store.scan(Collection::Items).await,
            Err(StoreError::Unavailable(_))
        ));
    }
}
