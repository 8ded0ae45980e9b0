use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use super::fees::FeeError;
use super::ledger::GatewayError;
use super::repository::RepositoryError;

/// Failure taxonomy for pipeline commands.
///
/// Validation and Forbidden are never retried; Conflict means the state
/// already moved and the caller must re-fetch; Expired carries an automatic
/// corrective transition applied before the error is returned; Gateway
/// failures are retryable by the caller.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("expired: {0}")]
    Expired(String),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl PipelineError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Conflict(_) | Self::Repository(RepositoryError::Conflict) => {
                StatusCode::CONFLICT
            }
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) | Self::Repository(RepositoryError::NotFound) => {
                StatusCode::NOT_FOUND
            }
            Self::Expired(_) => StatusCode::GONE,
            Self::Gateway(_) => StatusCode::BAD_GATEWAY,
            Self::Repository(RepositoryError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<FeeError> for PipelineError {
    fn from(value: FeeError) -> Self {
        Self::Validation(value.to_string())
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
