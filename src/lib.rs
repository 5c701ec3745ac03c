pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod normalization;
pub mod query;
pub mod stats;
pub mod store;
pub mod telemetry;
pub mod validation;

pub mod util {
    pub mod env;
}

pub use catalog::Catalog;
pub use config::{CatalogConfig, StoreBackend};
pub use error::{CatalogError, CatalogResult, ErrorKind, ErrorReport};
pub use stats::Stats;
pub use store::{DocumentStore, MemoryStore, SqliteStore};
