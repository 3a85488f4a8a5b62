//! Unified application error type with HTTP status mapping and a
//! standardized JSON error envelope for API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

use crate::database::error::DatabaseError;
use crate::gateway::error::GatewayError;
use crate::services::checkout::CheckoutError;
use crate::services::reconciliation::ReconciliationError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        AppError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Gateway(err) => {
                StatusCode::from_u16(err.http_status_code()).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::NotFound { .. } => "NOT_FOUND",
            AppError::Gateway(err) => err.error_code(),
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Client-safe message. Database and internal failures are never
    /// echoed verbatim to the caller.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation { message } => message.clone(),
            AppError::NotFound { entity, id } => format!("{} {} was not found", entity, id),
            AppError::Gateway(err) => err.user_message(),
            AppError::Database(_) | AppError::Internal(_) => {
                "An internal server error occurred. Please try again later.".to_string()
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Gateway(err) => err.is_retryable(),
            AppError::Database(err) => err.is_retryable(),
            _ => false,
        }
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::Database(e) => AppError::Database(e),
            CheckoutError::Gateway(e) => AppError::Gateway(e),
            CheckoutError::ProductNotFound { product_id } => {
                AppError::not_found("Product", product_id.to_string())
            }
            other => AppError::validation(other.to_string()),
        }
    }
}

impl From<ReconciliationError> for AppError {
    fn from(err: ReconciliationError) -> Self {
        match err {
            ReconciliationError::Database(e) => AppError::Database(e),
            ReconciliationError::Gateway(e) => AppError::Gateway(e),
            ReconciliationError::OrderNotFound(id) => AppError::not_found("Order", id),
            ReconciliationError::InvalidTrackingId => {
                AppError::validation("Invalid order tracking id")
            }
        }
    }
}

/// Standardized error response structure returned for all error cases.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub message: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "Request failed");
        } else {
            tracing::warn!(error = %self, code = self.error_code(), "Request rejected");
        }

        let body = ErrorResponse {
            error: self.error_code(),
            message: self.user_message(),
            timestamp: Utc::now().to_rfc3339(),
            retryable: Some(self.is_retryable()),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_400() {
        let err = AppError::validation("amount mismatch");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert_eq!(err.user_message(), "amount mismatch");
    }

    #[test]
    fn not_found_maps_to_404() {
        let err = AppError::not_found("Order", "TRK123");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert!(err.user_message().contains("TRK123"));
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = AppError::Internal("pool exhausted".to_string());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.user_message().contains("pool"));
    }
}
