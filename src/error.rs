//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Startup failures. Any of these aborts synthesis; nothing is served.
#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("missing reference: {kind} '{name}' (from {from})")]
    MissingReference {
        kind: &'static str,
        name: String,
        from: String,
    },
    #[error("duplicate {kind}: {name}")]
    Duplicate { kind: &'static str, name: String },
    #[error("name collision: '{name}' synthesized for both {first} and {second}")]
    NameCollision {
        name: String,
        first: String,
        second: String,
    },
    #[error("no identifier: base marker '{base}' must declare field '{field}'")]
    MissingIdentifier { base: String, field: String },
    #[error("unsupported identifier type for '{field}': {type_name}")]
    UnsupportedIdentifier { field: String, type_name: String },
    #[error("invalid type expression '{expr}' on {owner}")]
    InvalidType { expr: String, owner: String },
    #[error("invalid validation rule on {field}: {reason}")]
    InvalidRule { field: String, reason: String },
    #[error("inheritance cycle through '{0}'")]
    Cycle(String),
    #[error("introspection: {0}")]
    Introspection(String),
    #[error("model load: {0}")]
    Load(String),
    #[error("settings: {0}")]
    Settings(String),
}

/// Raised by the tri-state merge when a null would land in a non-nullable field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    #[error("cannot assign null to non-nullable field: {field}")]
    NullAssignment { field: String },
}

/// Failures reported by a persistence collaborator. Propagated unchanged.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("cancelled before commit")]
    Cancelled,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("storage: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
    #[error("validation: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("ambiguous: {0}")]
    Ambiguous(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("internal: {0}")]
    Internal(String),
}

impl From<MergeError> for AppError {
    fn from(e: MergeError) -> Self {
        AppError::Validation(e.to_string())
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AppError {
    /// Status and machine-readable code for the serving layer.
    pub fn category(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Synthesis(_) => (StatusCode::INTERNAL_SERVER_ERROR, "synthesis_error"),
            AppError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Ambiguous(_) => (StatusCode::CONFLICT, "ambiguous_result"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Store(StoreError::Cancelled) => (StatusCode::SERVICE_UNAVAILABLE, "cancelled"),
            AppError::Store(StoreError::Conflict(_)) => (StatusCode::CONFLICT, "conflict"),
            AppError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.category();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}
