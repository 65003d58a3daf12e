//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and how it is
//! rendered as an HTTP response.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use slide_search_core::{PortError, SlideSearchError};
use tracing::error;

use crate::config::ConfigError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An error from the ingestion and search pipeline.
    #[error(transparent)]
    Pipeline(#[from] SlideSearchError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The request itself is unusable (missing multipart part, bad body, ...).
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl From<PortError> for ApiError {
    fn from(error: PortError) -> Self {
        ApiError::Pipeline(error.into())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Pipeline(err) => match err {
                SlideSearchError::NotFound(_) => StatusCode::NOT_FOUND,
                SlideSearchError::InvalidInput(_)
                | SlideSearchError::MalformedDocument(_)
                | SlideSearchError::ExtractorPageMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_errors_map_to_status_codes() {
        let cases = [
            (SlideSearchError::NotFound("deck".into()), StatusCode::NOT_FOUND),
            (
                SlideSearchError::InvalidInput("name".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                SlideSearchError::MalformedDocument("x".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                SlideSearchError::ExtractorPageMismatch {
                    rasterized: 1,
                    extracted: 2,
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (SlideSearchError::Cancelled, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn port_not_found_becomes_404() {
        let err = ApiError::from(PortError::NotFound("blob".into()));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
    }
}
