//! Error types for the storage layer and the HTTP boundary.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use sled::transaction::TransactionError;
use thiserror::Error;

use crate::models::ApplicationStatus;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{collection} not found: {id}")]
    NotFound { collection: &'static str, id: String },

    #[error("{collection} already exists: {id}")]
    AlreadyExists { collection: &'static str, id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("cannot move application from {from} to {to}")]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
}

impl StorageError {
    pub fn not_found(collection: &'static str, id: impl Into<String>) -> Self {
        StorageError::NotFound {
            collection,
            id: id.into(),
        }
    }
}

impl From<TransactionError<StorageError>> for StorageError {
    fn from(err: TransactionError<StorageError>) -> Self {
        match err {
            TransactionError::Abort(inner) => inner,
            TransactionError::Storage(inner) => StorageError::Sled(inner),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Error returned by every handler; rendered as `{ "error": "..." }`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            StorageError::AlreadyExists { .. }
            | StorageError::Conflict(_)
            | StorageError::InvalidTransition { .. } => ApiError::Conflict(err.to_string()),
            StorageError::Sled(_) | StorageError::Serde(_) => {
                tracing::error!(error = %err, "storage failure");
                ApiError::Internal("internal storage error".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_map_to_http_statuses() {
        let missing: ApiError = StorageError::not_found("property", "p1").into();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(missing.to_string(), "property not found: p1");

        let transition: ApiError = StorageError::InvalidTransition {
            from: ApplicationStatus::Rejected,
            to: ApplicationStatus::Approved,
        }
        .into();
        assert_eq!(transition.status(), StatusCode::CONFLICT);

        // Internal details never leak into the response message
        let serde_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let internal: ApiError = StorageError::Serde(serde_err).into();
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(internal.to_string(), "internal storage error");
    }

    #[test]
    fn transaction_abort_unwraps_inner_error() {
        let err: StorageError =
            TransactionError::Abort(StorageError::Conflict("busy".into())).into();
        assert!(matches!(err, StorageError::Conflict(msg) if msg == "busy"));
    }
}
