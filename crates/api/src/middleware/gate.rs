//! Cart and admin gate middleware plus the extractors handlers use.
//!
//! The middleware runs before any handler in its route group. On success the
//! admitted session is stored in the request extensions; on failure the
//! request ends with `401 Permission denied`.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::Span;

use super::cookies;
use crate::error::AppError;
use crate::services::gate::{AdminSession, CartSession};
use crate::state::AppState;

/// Admit requests that carry a credential for an existing cart.
///
/// The cart cookie is checked first; an admin cookie that carries a cart is
/// accepted when there is no cart cookie.
///
/// # Errors
///
/// `AppError::PermissionDenied` when no credential admits the request.
pub async fn require_cart(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let names = &state.config().credentials;
    let token = cookies::read(request.headers(), &names.cart_cookie)
        .or_else(|| cookies::read(request.headers(), &names.admin_cookie));

    let session = state.gate().admit_cart(token.as_deref(), Utc::now()).await?;
    Span::current().record("cart_id", tracing::field::display(session.cart_id));

    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

/// Admit requests from users who are admins at the time of the request.
///
/// # Errors
///
/// `AppError::PermissionDenied` when the admin credential is missing,
/// invalid, or names a user who is not currently an admin.
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = cookies::read(request.headers(), &state.config().credentials.admin_cookie);

    let session = state.gate().admit_admin(token.as_deref(), Utc::now()).await?;
    Span::current().record("user_id", tracing::field::display(session.user_id));

    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

/// Extractor for the cart admitted by [`require_cart`].
///
/// # Example
///
/// ```rust,ignore
/// async fn items(CurrentCart(session): CurrentCart) -> impl IntoResponse {
///     format!("cart {}", session.cart_id)
/// }
/// ```
pub struct CurrentCart(pub CartSession);

impl<S> FromRequestParts<S> for CurrentCart
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CartSession>()
            .copied()
            .map(Self)
            .ok_or(AppError::PermissionDenied)
    }
}

/// Extractor for the admin admitted by [`require_admin`].
pub struct CurrentAdmin(pub AdminSession);

impl<S> FromRequestParts<S> for CurrentAdmin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AdminSession>()
            .copied()
            .map(Self)
            .ok_or(AppError::PermissionDenied)
    }
}
