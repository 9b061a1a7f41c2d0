use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::User,
    document::{
        CreateDocumentRequest, CreatedResponse, DocumentMeta, DocumentResponse,
        UpdateSnapshotRequest, UpdateSnapshotResponse,
    },
    error::{conflict, ApiError},
    layout::DocumentSnapshot,
    startup::ApplicationState,
    store::{NewDocument, SaveOutcome},
};

pub async fn health_check() -> StatusCode {
    StatusCode::OK
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_document(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    body: Result<Json<CreateDocumentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedResponse<DocumentMeta>>), ApiError> {
    let Json(request) = body?;
    let title = request.title.trim();
    if title.is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".to_string()));
    }

    let data = serde_json::to_value(DocumentSnapshot::empty()).map_err(|error| {
        tracing::error!(%error, "failed to encode empty snapshot");
        ApiError::UnexpectedError
    })?;
    let document = state
        .store
        .create(NewDocument {
            owner_id: user.id,
            title: title.to_string(),
            description: request.description,
            is_public: request.is_public,
            data,
        })
        .await?;

    tracing::info!(document_id = %document.id, "document created");
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            message: "Document created".to_string(),
            data: DocumentMeta::from(&document),
        }),
    ))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn get_document(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    document_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<DocumentResponse>, ApiError> {
    let Path(document_id) = document_id?;
    let document = state
        .store
        .find(document_id)
        .await?
        .ok_or(ApiError::DocumentNotFoundError)?;

    if !document.readable_by(user.id) {
        tracing::warn!(
            ?user,
            document = %document_id,
            "user does not have access to document"
        );
        return Err(ApiError::Forbidden(document_id));
    }

    Ok(Json(document.into()))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_snapshot(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    document_id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdateSnapshotRequest>, JsonRejection>,
) -> Result<Json<UpdateSnapshotResponse>, ApiError> {
    let Path(document_id) = document_id?;
    let Json(request) = body?;
    if request.base_revision < 0 {
        return Err(ApiError::BadRequest(
            "baseRevision must not be negative".to_string(),
        ));
    }

    let outcome = state
        .store
        .save_snapshot(document_id, user.id, request.base_revision, request.data)
        .await?;

    match outcome {
        SaveOutcome::Saved { revision, saved_at } => {
            tracing::info!(document = %document_id, revision, "snapshot saved");
            Ok(Json(UpdateSnapshotResponse { revision, saved_at }))
        }
        SaveOutcome::Conflict {
            current_revision,
            data,
        } => {
            tracing::info!(
                document = %document_id,
                base_revision = request.base_revision,
                current_revision,
                "stale snapshot rejected"
            );
            Err(conflict(current_revision, data))
        }
        SaveOutcome::NotFound => Err(ApiError::DocumentNotFoundError),
    }
}

#[instrument(skip_all)]
pub async fn get_public_document(
    State(state): State<ApplicationState>,
    Path(token): Path<String>,
) -> Result<Json<DocumentResponse>, ApiError> {
    let document = state
        .store
        .find_public(&token)
        .await?
        .ok_or(ApiError::PublicDocumentNotFoundError)?;
    Ok(Json(document.into()))
}
