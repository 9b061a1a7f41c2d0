use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::document::Document;

use super::{generate_public_token, DocumentStore, NewDocument, SaveOutcome, StoreError};

const DOCUMENT_COLUMNS: &str = "id, owner_id, title, description, is_public, public_token, \
     revision, data, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn create(&self, document: NewDocument) -> Result<Document, StoreError> {
        let public_token = document.is_public.then(generate_public_token);
        let created = sqlx::query_as::<_, Document>(&format!(
            r#"
            INSERT INTO documents
                (id, owner_id, title, description, is_public, public_token, revision, data)
            VALUES ($1, $2, $3, $4, $5, $6, 0, $7)
            RETURNING {DOCUMENT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(document.owner_id)
        .bind(document.title)
        .bind(document.description)
        .bind(document.is_public)
        .bind(public_token)
        .bind(document.data)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Document>, StoreError> {
        let document = sqlx::query_as::<_, Document>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(document)
    }

    async fn find_public(&self, token: &str) -> Result<Option<Document>, StoreError> {
        let document = sqlx::query_as::<_, Document>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE public_token = $1 AND is_public"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(document)
    }

    #[tracing::instrument(skip(self, data))]
    async fn save_snapshot(
        &self,
        id: Uuid,
        owner_id: Uuid,
        base_revision: i64,
        data: Value,
    ) -> Result<SaveOutcome, StoreError> {
        let saved = sqlx::query_as::<_, (i64, DateTime<Utc>)>(
            r#"
            UPDATE documents
            SET data = $4, revision = revision + 1, updated_at = now()
            WHERE id = $1 AND owner_id = $2 AND revision = $3
            RETURNING revision, updated_at
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .bind(base_revision)
        .bind(data)
        .fetch_optional(&self.pool)
        .await?;

        if let Some((revision, saved_at)) = saved {
            return Ok(SaveOutcome::Saved { revision, saved_at });
        }

        // Nothing matched: either the revision moved on or the row is not ours.
        let current = sqlx::query_as::<_, (i64, Value)>(
            "SELECT revision, data FROM documents WHERE id = $1 AND owner_id = $2",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match current {
            Some((current_revision, data)) => {
                tracing::info!(current_revision, "rejecting stale snapshot");
                SaveOutcome::Conflict {
                    current_revision,
                    data,
                }
            }
            None => SaveOutcome::NotFound,
        })
    }
}
