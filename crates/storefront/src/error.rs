//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::checkout::CheckoutError;
use crate::db::RepositoryError;
use crate::models::ProjectValidationError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Checkout workflow failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Submitted catalog entry failed validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ProjectValidationError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(
            self,
            Self::Database(_)
                | Self::Internal(_)
                | Self::Checkout(CheckoutError::Processing | CheckoutError::PaymentInit(_))
        ) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Checkout(err) => match err {
                CheckoutError::EmptyCart | CheckoutError::Total(_) => StatusCode::BAD_REQUEST,
                CheckoutError::NotSignedIn => StatusCode::UNAUTHORIZED,
                CheckoutError::AlreadySettled | CheckoutError::DuplicateSettlement => {
                    StatusCode::CONFLICT
                }
                CheckoutError::PaymentInit(_) | CheckoutError::Processing => {
                    StatusCode::BAD_GATEWAY
                }
            },
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Checkout(err) => match err {
                CheckoutError::PaymentInit(_) => "Payment service error".to_string(),
                CheckoutError::Processing => {
                    "Payment processing failed, please contact support".to_string()
                }
                other => other.to_string(),
            },
            _ => self.to_string(),
        };

        (status, message).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after sign-in to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on sign-out to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("project-123".to_string());
        assert_eq!(err.to_string(), "Not found: project-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            let response = err.into_response();
            response.status()
        }

        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_checkout_error_status_codes() {
        fn get_status(err: CheckoutError) -> StatusCode {
            AppError::Checkout(err).into_response().status()
        }

        assert_eq!(get_status(CheckoutError::EmptyCart), StatusCode::BAD_REQUEST);
        assert_eq!(
            get_status(CheckoutError::NotSignedIn),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(CheckoutError::AlreadySettled),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(CheckoutError::DuplicateSettlement),
            StatusCode::CONFLICT
        );
        assert_eq!(get_status(CheckoutError::Processing), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_processing_error_hides_details() {
        let response = AppError::Checkout(CheckoutError::Processing).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
