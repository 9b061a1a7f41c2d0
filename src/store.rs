mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::document::Document;

pub use memory::InMemoryStore;
pub use postgres::PgDocumentStore;

const PUBLIC_TOKEN_LENGTH: usize = 24;

#[derive(Debug, Clone)]
pub struct NewDocument {
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved {
        revision: i64,
        saved_at: DateTime<Utc>,
    },
    /// The caller's base revision is stale.
    Conflict { current_revision: i64, data: Value },
    /// Missing, or owned by someone else.
    NotFound,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn create(&self, document: NewDocument) -> Result<Document, StoreError>;

    async fn find(&self, id: Uuid) -> Result<Option<Document>, StoreError>;

    /// Only documents that are currently public are returned.
    async fn find_public(&self, token: &str) -> Result<Option<Document>, StoreError>;

    /// Writes `data` iff the document belongs to `owner_id` and still sits at
    /// `base_revision`. Check and write happen atomically.
    async fn save_snapshot(
        &self,
        id: Uuid,
        owner_id: Uuid,
        base_revision: i64,
        data: Value,
    ) -> Result<SaveOutcome, StoreError>;
}

pub fn generate_public_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PUBLIC_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}
