//! Runtime configuration read from the environment (and `.env`).

use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use clap::ValueEnum;
use tracing::info;

use crate::store::{DocumentStore, MemoryStore, SqliteStore};
use crate::util::env::{env_opt, env_parse, preflight_check};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://game_catalog.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum StoreBackend {
    /// Process-local; contents are lost on exit.
    Memory,
    #[default]
    Sqlite,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            other => anyhow::bail!("unknown store backend '{other}' (expected memory or sqlite)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    pub backend: StoreBackend,
    pub database_url: String,
    pub max_connections: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl CatalogConfig {
    /// `CATALOG_STORE`, `DATABASE_URL` and `DB_MAX_CONNS`, each optional.
    pub fn from_env() -> anyhow::Result<Self> {
        preflight_check(
            "game-catalog",
            &[],
            &["CATALOG_STORE", "DATABASE_URL", "DB_MAX_CONNS"],
        )?;
        let backend = match env_opt("CATALOG_STORE") {
            Some(raw) => raw
                .parse::<StoreBackend>()
                .map_err(|e| e.context("CATALOG_STORE"))?,
            None => StoreBackend::default(),
        };
        Ok(Self {
            backend,
            database_url: env_opt("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.into()),
            max_connections: env_parse("DB_MAX_CONNS", DEFAULT_MAX_CONNECTIONS).max(1),
        })
    }

    /// Command-line values take precedence over the environment.
    pub fn with_overrides(mut self, backend: Option<StoreBackend>, database_url: Option<String>) -> Self {
        if let Some(backend) = backend {
            self.backend = backend;
        }
        if let Some(url) = database_url {
            self.database_url = url;
        }
        self
    }

    pub async fn open_store(&self) -> anyhow::Result<Arc<dyn DocumentStore>> {
        let store: Arc<dyn DocumentStore> = match self.backend {
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
            StoreBackend::Sqlite => Arc::new(
                SqliteStore::connect(&self.database_url, self.max_connections)
                    .await
                    .context("opening sqlite store")?,
            ),
        };
        info!(backend = ?self.backend, "document store ready");
        Ok(store)
    }
}
