use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::document::Document;

use super::{generate_public_token, DocumentStore, NewDocument, SaveOutcome, StoreError};

/// Process-local store for tests and `store: memory` runs.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    documents: Mutex<HashMap<Uuid, Document>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn documents(&self) -> MutexGuard<'_, HashMap<Uuid, Document>> {
        self.documents.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn create(&self, document: NewDocument) -> Result<Document, StoreError> {
        let now = Utc::now();
        let document = Document {
            id: Uuid::new_v4(),
            owner_id: document.owner_id,
            title: document.title,
            description: document.description,
            is_public: document.is_public,
            public_token: document.is_public.then(generate_public_token),
            revision: 0,
            data: document.data,
            created_at: now,
            updated_at: now,
        };
        self.documents().insert(document.id, document.clone());
        Ok(document)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Document>, StoreError> {
        Ok(self.documents().get(&id).cloned())
    }

    async fn find_public(&self, token: &str) -> Result<Option<Document>, StoreError> {
        Ok(self
            .documents()
            .values()
            .find(|document| document.is_public && document.public_token.as_deref() == Some(token))
            .cloned())
    }

    async fn save_snapshot(
        &self,
        id: Uuid,
        owner_id: Uuid,
        base_revision: i64,
        data: Value,
    ) -> Result<SaveOutcome, StoreError> {
        let mut documents = self.documents();
        let Some(document) = documents
            .get_mut(&id)
            .filter(|document| document.owner_id == owner_id)
        else {
            return Ok(SaveOutcome::NotFound);
        };

        if document.revision != base_revision {
            return Ok(SaveOutcome::Conflict {
                current_revision: document.revision,
                data: document.data.clone(),
            });
        }

        document.revision += 1;
        document.data = data;
        document.updated_at = Utc::now();
        Ok(SaveOutcome::Saved {
            revision: document.revision,
            saved_at: document.updated_at,
        })
    }
}
