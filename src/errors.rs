use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

use crate::codec::CodecError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid object id `{0}`")]
    InvalidId(String),
    #[error("object `{0}` not found")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("object `{id}` is incomplete: chunk {index} of {expected} is missing")]
    IncompleteObject { id: String, index: u64, expected: u64 },
    #[error("{op} failed for object `{id}`: {source}")]
    StoreUnavailable {
        op: &'static str,
        id: String,
        #[source]
        source: BoxError,
    },
    #[error("connection error: {0}")]
    ConnectionError(#[source] BoxError),
    #[error("corrupt record: {0}")]
    CorruptRecord(String),
    #[error("checksum mismatch for object `{id}`: stored {expected}, computed {actual}")]
    ChecksumMismatch {
        id: String,
        expected: String,
        actual: String,
    },
    #[error("reassembly of object `{id}` failed: {source}")]
    Reassembly {
        id: String,
        #[source]
        source: CodecError,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Wrap a collaborator-store failure with the operation and object it hit.
    pub fn unavailable(op: &'static str, id: impl ToString, err: impl Into<BoxError>) -> Self {
        StoreError::StoreUnavailable {
            op,
            id: id.to_string(),
            source: err.into(),
        }
    }
}

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        let status = match &err {
            StoreError::InvalidId(_) | StoreError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::StoreUnavailable { .. } | StoreError::ConnectionError(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            StoreError::IncompleteObject { .. }
            | StoreError::CorruptRecord(_)
            | StoreError::ChecksumMismatch { .. }
            | StoreError::Reassembly { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("request failed: {}", err);
        }
        AppError::new(status, err.to_string())
    }
}
