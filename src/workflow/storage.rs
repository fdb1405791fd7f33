//! Durable key-value persistence for the editor document
//!
//! The history layer only needs an opaque sink that can store one serialized
//! `{document, viewport}` record under a fixed key and read it back at startup.
//! SQLite (via sqlx) is the production backend; the in-memory store is used by
//! tests and embedders that do not want a database.

use crate::workflow::types::PersistedRecord;
use anyhow::Result;
use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool},
    Row,
};
use std::{collections::HashMap, path::Path};
use tokio::sync::RwLock;

/// Opaque durable sink for the persisted editor record
#[async_trait]
pub trait DocumentSink: Send + Sync {
    /// Read the record stored under `key`, if any
    async fn load(&self, key: &str) -> Result<Option<PersistedRecord>>;

    /// Store `record` under `key`, replacing whatever was there
    async fn save(&self, key: &str, record: &PersistedRecord) -> Result<()>;
}

/// SQLite-backed document store
///
/// Records are kept as JSON in a single `documents` table keyed by the
/// storage identifier.
#[derive(Debug, Clone)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    /// Create a store over an existing connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database file and initialise the schema
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                anyhow::anyhow!("Failed to create data directory '{}': {}", parent.display(), e)
            })?;
        }

        tracing::info!("🗄️ Opening document database: {}", path.display());
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;

        let store = Self::new(pool);
        store.init_schema().await?;
        Ok(store)
    }

    /// Initialise the document table
    ///
    /// Safe to call multiple times (uses IF NOT EXISTS).
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                key TEXT PRIMARY KEY,
                record JSON NOT NULL,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl DocumentSink for SqliteDocumentStore {
    async fn load(&self, key: &str) -> Result<Option<PersistedRecord>> {
        let row = sqlx::query("SELECT record FROM documents WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let record_json: String = row.get("record");
                let record: PersistedRecord = serde_json::from_str(&record_json)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Upsert so the first save and every later autosave share one statement
    async fn save(&self, key: &str, record: &PersistedRecord) -> Result<()> {
        let record_json = serde_json::to_string(record)?;

        sqlx::query(
            r#"
            INSERT INTO documents (key, record, updated_at)
            VALUES (?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(key) DO UPDATE SET
                record = excluded.record,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(key)
        .bind(&record_json)
        .execute(&self.pool)
        .await?;

        tracing::debug!("💾 Saved document '{}' under key {}", record.document.id, key);
        Ok(())
    }
}

/// In-memory document store
///
/// Counts writes so callers can observe how many autosaves actually landed.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    records: RwLock<HashMap<String, PersistedRecord>>,
    writes: std::sync::atomic::AtomicUsize,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `save` calls so far
    pub fn write_count(&self) -> usize {
        self.writes.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentSink for MemoryDocumentStore {
    async fn load(&self, key: &str) -> Result<Option<PersistedRecord>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, record: &PersistedRecord) -> Result<()> {
        self.records
            .write()
            .await
            .insert(key.to_string(), record.clone());
        self.writes.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }
}
