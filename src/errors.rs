use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::{DbErr, SqlErr};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use utoipa::ToSchema;

use crate::tracing::current_request_id;

/// Body returned for every failed request.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "error": "Duplicate batchNumber + materialName" }))]
pub struct ErrorResponse {
    /// Diagnostic message describing the failure
    #[schema(example = "Invalid unitId")]
    pub error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        ServiceError::ValidationError(rejection.body_text())
    }
}

impl From<PathRejection> for ServiceError {
    fn from(rejection: PathRejection) -> Self {
        ServiceError::ValidationError(rejection.body_text())
    }
}

impl ServiceError {
    /// Wraps a store error, classifying unique-constraint violations as conflicts.
    pub fn db_error(error: DbErr) -> Self {
        match error.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => ServiceError::Conflict(detail),
            _ => ServiceError::DatabaseError(error),
        }
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::DatabaseError(_) | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the message placed in the `error` field of the response.
    ///
    /// Store diagnostics are passed through verbatim; this service is an
    /// internal tool and callers rely on the underlying text.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(err) => err.to_string(),
            Self::ValidationError(msg) | Self::Conflict(msg) | Self::InternalError(msg) => {
                msg.clone()
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.response_message();

        let request_id = current_request_id().map(|rid| rid.0).unwrap_or_default();
        if status.is_server_error() {
            error!(status = status.as_u16(), request_id = %request_id, error = %self, "request failed");
        } else {
            debug!(status = status.as_u16(), request_id = %request_id, error = %self, "request rejected");
        }

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
