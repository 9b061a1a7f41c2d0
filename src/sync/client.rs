use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::{
    configuration::SyncSettings,
    document::{
        ConflictDetails, DocumentResponse, ErrorBody, UpdateSnapshotRequest,
        UpdateSnapshotResponse,
    },
};

use super::SyncError;

/// What the editor needs from the document service.
#[async_trait]
pub trait DocumentApi: Send + Sync {
    async fn get_document(&self, document_id: Uuid) -> Result<DocumentResponse, SyncError>;

    async fn put_snapshot(
        &self,
        document_id: Uuid,
        request: &UpdateSnapshotRequest,
    ) -> Result<UpdateSnapshotResponse, SyncError>;
}

#[derive(Debug, Clone)]
pub struct HttpDocumentApi {
    client: reqwest::Client,
    base_url: String,
    token: Secret<String>,
}

impl HttpDocumentApi {
    pub fn new(base_url: impl Into<String>, token: Secret<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn from_settings(settings: &SyncSettings, token: Secret<String>) -> Self {
        Self::new(settings.api_base_url.clone(), token)
    }

    fn document_url(&self, document_id: Uuid) -> String {
        format!("{}/documents/{}", self.base_url, document_id)
    }
}

#[async_trait]
impl DocumentApi for HttpDocumentApi {
    #[tracing::instrument(skip(self))]
    async fn get_document(&self, document_id: Uuid) -> Result<DocumentResponse, SyncError> {
        let response = self
            .client
            .get(self.document_url(document_id))
            .bearer_auth(self.token.expose_secret())
            .send()
            .await?;
        parse(response).await
    }

    #[tracing::instrument(skip(self, request), fields(base_revision = request.base_revision))]
    async fn put_snapshot(
        &self,
        document_id: Uuid,
        request: &UpdateSnapshotRequest,
    ) -> Result<UpdateSnapshotResponse, SyncError> {
        let response = self
            .client
            .put(self.document_url(document_id))
            .bearer_auth(self.token.expose_secret())
            .json(request)
            .send()
            .await?;
        parse(response).await
    }
}

async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, SyncError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let text = response.text().await?;
    let body = serde_json::from_str::<ErrorBody>(&text).ok();
    let message = body
        .as_ref()
        .map(|body| body.error.message.clone())
        .unwrap_or_else(|| format!("{status}: {text}"));
    tracing::debug!(%status, %message, "document service refused request");

    Err(match status {
        StatusCode::CONFLICT => {
            let details = body
                .and_then(|body| body.error.details)
                .and_then(|details| serde_json::from_value::<ConflictDetails>(details).ok());
            match details {
                Some(details) => SyncError::Conflict {
                    current_revision: details.current_revision,
                    data: details.data,
                },
                None => SyncError::Internal(format!("conflict without details: {message}")),
            }
        }
        StatusCode::UNAUTHORIZED => SyncError::Unauthorized(message),
        StatusCode::FORBIDDEN => SyncError::Forbidden(message),
        StatusCode::NOT_FOUND => SyncError::NotFound(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            SyncError::Validation(message)
        }
        _ => SyncError::Internal(message),
    })
}
