use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    document::{ConflictDetails, ErrorBody, ErrorPayload},
    store::StoreError,
};

pub const CONFLICT_MESSAGE: &str = "Document was modified by another session. Please reload.";

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    AuthError(String),
    Forbidden(Uuid),
    DocumentNotFoundError,
    PublicDocumentNotFoundError,
    Conflict(ConflictDetails),
    UnexpectedError,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::AuthError(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::DocumentNotFoundError | Self::PublicDocumentNotFoundError => {
                StatusCode::NOT_FOUND
            }
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::UnexpectedError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "VALIDATION_ERROR",
            Self::AuthError(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::DocumentNotFoundError | Self::PublicDocumentNotFoundError => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::UnexpectedError => "INTERNAL_ERROR",
        }
    }

    fn into_payload(self) -> ErrorPayload {
        let code = self.code().to_string();
        let (message, details) = match self {
            Self::BadRequest(e) => (format!("Bad request: {}", e), None),
            Self::AuthError(e) => (format!("Authorization error: {}", e), None),
            Self::Forbidden(_) => (
                "You do not have access to this document".to_string(),
                None,
            ),
            Self::DocumentNotFoundError => ("Document not found".to_string(), None),
            Self::PublicDocumentNotFoundError => ("Public document not found".to_string(), None),
            Self::Conflict(details) => (
                CONFLICT_MESSAGE.to_string(),
                serde_json::to_value(details).ok(),
            ),
            Self::UnexpectedError => ("An unexpected error has occured".to_string(), None),
        };
        ErrorPayload {
            code,
            message,
            details,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.into_payload(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        tracing::error!(%error, "document store failed");
        Self::UnexpectedError
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(_: PathRejection) -> Self {
        Self::BadRequest("please provide a valid document UUID".to_string())
    }
}

/// Stale-write details in the shape the 409 body carries.
pub fn conflict(current_revision: i64, data: Value) -> ApiError {
    ApiError::Conflict(ConflictDetails {
        current_revision,
        data,
    })
}
