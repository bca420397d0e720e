//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-class errors to
//! Sentry before responding to the client. All route handlers return
//! `Result<T, AppError>`, and every error body is `{"error": "..."}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::fulfillment::{FulfillmentError, ProviderApiError};
use crate::models::TaxInputError;

/// Application-level error type for the checkout service.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed input (negative rate, empty name, retry from an invalid
    /// status, ...).
    #[error("{0}")]
    Validation(String),

    /// Resource not found (scoped by store).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Webhook signature rejected.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Fulfillment dispatch failed.
    #[error(transparent)]
    Fulfillment(#[from] FulfillmentError),

    /// Database operation failed.
    #[error(transparent)]
    Database(#[from] RepositoryError),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<TaxInputError> for AppError {
    fn from(err: TaxInputError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Fulfillment(err) => match err {
                FulfillmentError::RequestNotFound(_) => StatusCode::NOT_FOUND,
                // Unconfigured providers are an operator fixable 4xx with
                // actionable guidance, never a generic 500.
                FulfillmentError::Validation(_) | FulfillmentError::ProviderNotConfigured { .. } => {
                    StatusCode::BAD_REQUEST
                }
                FulfillmentError::Provider(provider_err) => match provider_err {
                    ProviderApiError::CircuitOpen { .. } => StatusCode::SERVICE_UNAVAILABLE,
                    ProviderApiError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                    _ => StatusCode::BAD_GATEWAY,
                },
                FulfillmentError::QueueUnavailable => StatusCode::SERVICE_UNAVAILABLE,
                FulfillmentError::Repository(repo) => repository_status(repo),
            },
            Self::Database(repo) => repository_status(repo),
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Internal details stay out of responses.
    fn message(&self) -> String {
        match self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Fulfillment(FulfillmentError::Repository(_)) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::NotFound(_) => StatusCode::NOT_FOUND,
        RepositoryError::Conflict(_) => StatusCode::CONFLICT,
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let body = Json(serde_json::json!({ "error": self.message() }));
        (status, body).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
