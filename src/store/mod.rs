//! Document store abstraction.
//!
//! Collections hold raw JSON documents in whatever shape they were written with.
//! Only the normalization layer interprets those documents; the store only knows
//! the document id and an optional unique key backed by a unique index.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Items,
    Reviews,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::Items, Collection::Reviews];

    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Items => "items",
            Collection::Reviews => "reviews",
        }
    }

    pub fn entity_name(self) -> &'static str {
        match self {
            Collection::Items => "item",
            Collection::Reviews => "review",
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("unique key conflict in {}: {key}", .collection.as_str())]
    Conflict { collection: Collection, key: String },
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("corrupt document: {0}")]
    Corrupt(String),
}

/// A document ready to be written.
#[derive(Debug, Clone)]
pub struct StoredDoc {
    pub id: String,
    /// Value enforced unique within the collection when present.
    pub unique_key: Option<String>,
    pub body: Value,
}

impl StoredDoc {
    pub fn new(id: impl Into<String>, unique_key: Option<String>, body: Value) -> Self {
        Self {
            id: id.into(),
            unique_key,
            body,
        }
    }
}

/// Scans return documents in insertion order; replacing a document keeps its position.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(&self, collection: Collection, doc: StoredDoc) -> Result<(), StoreError>;

    /// Returns `false` when no document with `doc.id` exists.
    async fn replace(&self, collection: Collection, doc: StoredDoc) -> Result<bool, StoreError>;

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>, StoreError>;

    /// Returns `false` when no document with `id` exists.
    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError>;

    async fn scan(&self, collection: Collection) -> Result<Vec<Value>, StoreError>;

    async fn count(&self, collection: Collection) -> Result<u64, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    /// Release pooled resources; further calls fail with `Unavailable`.
    async fn close(&self);
}
