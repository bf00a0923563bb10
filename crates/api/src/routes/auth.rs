//! Admin login and logout.
//!
//! Only admins get a credential from `login`. Everyone else, including users
//! with a correct password, gets the same `401 Permission denied` as a wrong
//! password.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use dam_nation_core::{CartId, Role, UserId};

use super::issue_cookie;
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::cookies;
use crate::services::credential::Subject;
use crate::state::AppState;

/// Login request body.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Successful login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user_id: UserId,
    pub email: String,
    /// Cart carried over from the cart cookie, if it was valid.
    pub cart_id: Option<CartId>,
    pub expires_at: DateTime<Utc>,
}

/// Log in with email and password and set the admin credential cookie.
#[instrument(skip(state, headers, body))]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Result<Response> {
    let user = state.auth_service().login(&body.email, &body.password).await?;
    if !user.is_admin {
        info!(user_id = %user.id, "Login refused for non-admin user");
        return Err(AppError::PermissionDenied);
    }

    // Keep the shopper's cart under the same identity when it is still valid
    let cart_token = cookies::read(&headers, &state.config().credentials.cart_cookie);
    let cart_id = state
        .gate()
        .admit_cart(cart_token.as_deref(), Utc::now())
        .await
        .ok()
        .map(|session| session.cart_id);

    let subject = Subject::Admin {
        user_id: user.id,
        role: Role::Admin,
        cart_id,
    };
    let (issued, cookie) = issue_cookie(&state, subject, &state.config().credentials.admin_cookie)?;

    set_sentry_user(&user.id, Some(user.email.as_str()));
    info!(user_id = %user.id, "Admin logged in");

    let body = LoginResponse {
        user_id: user.id,
        email: user.email.to_string(),
        cart_id,
        expires_at: issued.expires_at,
    };
    Ok((AppendHeaders([(SET_COOKIE, cookie)]), Json(body)).into_response())
}

/// Drop the admin credential cookie.
#[instrument(skip(state))]
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    let config = &state.config().credentials;
    let cookie = cookies::removal(config, &config.admin_cookie);
    clear_sentry_user();
    (
        StatusCode::NO_CONTENT,
        AppendHeaders([(SET_COOKIE, cookie.to_string())]),
    )
}
