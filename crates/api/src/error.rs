//! Unified error handling with Sentry integration.
//!
//! Every route handler returns `Result<T, AppError>`. Server-side failures are
//! captured to Sentry and logged with full detail, while the client only ever
//! sees a fixed, non-internal message.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::payments::PaymentError;
use crate::services::auth::AuthError;
use crate::services::cart::CartError;
use crate::services::checkout::CheckoutError;
use crate::services::gate::PermissionDenied;

/// Client-facing message for every authorization failure.
pub const PERMISSION_DENIED: &str = "Permission denied";

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing, invalid, or insufficient credential.
    #[error("Permission denied")]
    PermissionDenied,

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request failed validation.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Checkout attempted with no line items.
    #[error("No items in cart")]
    EmptyCart,

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Payment provider call failed.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error body.
#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::PermissionDenied => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidArgument(_) | Self::EmptyCart => StatusCode::BAD_REQUEST,
            Self::Database(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Payment(_) => StatusCode::BAD_GATEWAY,
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::UserNotFound => StatusCode::NOT_FOUND,
                AuthError::WeakPassword(_) | AuthError::InvalidEmail(_) => StatusCode::BAD_REQUEST,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    /// Message safe to show to clients.
    fn public_message(&self) -> String {
        match self {
            Self::PermissionDenied => PERMISSION_DENIED.to_string(),
            Self::NotFound(what) => format!("{what} not found"),
            Self::InvalidArgument(msg) | Self::Database(RepositoryError::Conflict(msg)) => msg.clone(),
            Self::EmptyCart => "No items in cart".to_string(),
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Payment(_) => "External service error".to_string(),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => PERMISSION_DENIED.to_string(),
                AuthError::UserAlreadyExists => {
                    "An account with this email already exists".to_string()
                }
                AuthError::UserNotFound => "User not found".to_string(),
                AuthError::WeakPassword(msg) => msg.clone(),
                AuthError::InvalidEmail(_) => "Invalid email address".to_string(),
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    "Internal server error".to_string()
                }
            },
        }
    }

    const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Database(
                RepositoryError::Database(_)
                    | RepositoryError::DataCorruption(_)
                    | RepositoryError::NotFound
            ) | Self::Internal(_)
                | Self::Payment(_)
                | Self::Auth(AuthError::Repository(_) | AuthError::PasswordHash)
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status();
        let message = self.public_message();

        (status, Json(ErrorBody { error: &message })).into_response()
    }
}

impl From<PermissionDenied> for AppError {
    fn from(_: PermissionDenied) -> Self {
        Self::PermissionDenied
    }
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::InvalidArgument(msg) => Self::InvalidArgument(msg),
            CartError::NotFound(missing) => Self::NotFound(missing.to_string()),
            CartError::Store(e) => Self::Database(e),
        }
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::EmptyCart => Self::EmptyCart,
            CheckoutError::Cart(e) => e.into(),
            CheckoutError::Payment(e) => Self::Payment(e),
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
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
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for a cart or checkout action.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, String)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb
            .data
            .insert((*key).to_string(), serde_json::Value::String(value.clone()));
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::cart::Missing;

    async fn body_text(err: AppError) -> (StatusCode, String) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        (status, value["error"].as_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn test_permission_denied_is_uniform() {
        let (status, msg) = body_text(AppError::PermissionDenied).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(msg, "Permission denied");

        let (status, msg) = body_text(AppError::Auth(AuthError::InvalidCredentials)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(msg, "Permission denied");
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let err = AppError::Database(RepositoryError::DataCorruption(
            "shop.cart_item row 17 has quantity -3".into(),
        ));
        let (status, msg) = body_text(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(msg, "Internal server error");
    }

    #[tokio::test]
    async fn test_cart_errors_map_to_statuses() {
        let (status, msg) = body_text(CartError::NotFound(Missing::Product).into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(msg, "Product not found");

        let (status, _) =
            body_text(CartError::InvalidArgument("quantity must be at least 1".into()).into())
                .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_store_conflict_is_409() {
        let err = AppError::Database(RepositoryError::Conflict("price reference already used".into()));
        let (status, msg) = body_text(err).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(msg, "price reference already used");
    }

    #[tokio::test]
    async fn test_empty_cart() {
        let (status, msg) = body_text(CheckoutError::EmptyCart.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(msg, "No items in cart");
    }

    #[tokio::test]
    async fn test_payment_failure_is_bad_gateway() {
        let err = AppError::Payment(PaymentError::Rejected {
            status: 400,
            message: "No such price: 'price_404'".into(),
        });
        let (status, msg) = body_text(err).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(msg, "External service error");
    }
}
