mod client;
mod synchronizer;

use serde_json::Value;
use thiserror::Error;

pub use client::{DocumentApi, HttpDocumentApi};
pub use synchronizer::{
    spawn, EditKind, SaveStatus, SyncEvent, SyncState, SyncTimings, SynchronizerHandle,
};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Conflict: document was modified elsewhere.")]
    Conflict { current_revision: i64, data: Value },
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("rejected: {0}")]
    Validation(String),
    #[error("server error: {0}")]
    Internal(String),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl SyncError {
    /// Retrying cannot succeed, so the synchronizer stops.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized(_) | Self::Forbidden(_) | Self::NotFound(_)
        )
    }
}
