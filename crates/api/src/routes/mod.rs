//! HTTP route handlers for the API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                         - Liveness
//! GET    /health/ready                   - Readiness (store ping)
//!
//! # Catalog
//! GET    /api/products                   - Product listing
//! GET    /api/products/{id}              - Product detail
//! GET    /api/collections                - Collection listing
//! GET    /api/collections/{id}           - Collection with its products
//!
//! # Cart
//! POST   /api/new-cart                   - Create cart, set cart credential
//! GET    /api/cart                       - Cart items            (cart gate)
//! DELETE /api/cart                       - Clear cart            (cart gate)
//! POST   /api/cart/add                   - Add item              (cart gate)
//! PUT    /api/cart/{productId}           - Set quantity          (cart gate)
//! DELETE /api/cart/{productId}           - Remove item           (cart gate)
//! POST   /api/cart/checkout              - Payment session URL   (cart gate)
//! POST   /api/cart/session               - Re-issue credential   (cart gate)
//!
//! # Auth
//! POST   /api/auth/login                 - Admin login (rate limited)
//! POST   /api/auth/logout                - Drop admin credential
//!
//! # Admin (admin gate)
//! GET    /api/admin                      - Portal
//! POST   /api/admin/users                - Create user
//! GET    /api/admin/users/{id}           - User detail
//! PUT    /api/admin/users/{id}/admin     - Grant or revoke admin
//! POST   /api/admin/products             - Create product
//! PUT    /api/admin/products/{id}        - Edit product
//! DELETE /api/admin/products/{id}        - Delete product
//! POST   /api/admin/collections          - Create collection
//! PUT    /api/admin/collections/{id}     - Edit collection
//! DELETE /api/admin/collections/{id}     - Delete collection
//! POST   /api/admin/collections/{id}/products/{productId}   - Add to collection
//! DELETE /api/admin/collections/{id}/products/{productId}   - Remove from collection
//! ```

pub mod admin;
pub mod auth;
pub mod cart;
pub mod collections;
pub mod health;
pub mod products;

use axum::{
    Router,
    body::Body,
    http::Request,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
};
use chrono::Utc;
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::middleware::{
    login_rate_limiter, request_id_middleware, require_admin, require_cart,
    security_headers_middleware,
};
use crate::services::credential::{IssuedCredential, Subject};
use crate::state::AppState;

/// Sign a credential for `subject` and build the cookie that carries it.
pub(crate) fn issue_cookie(
    state: &AppState,
    subject: Subject,
    cookie_name: &str,
) -> Result<(IssuedCredential, String), AppError> {
    let config = &state.config().credentials;
    let issued = state
        .codec()
        .issue(subject, config.ttl, Utc::now())
        .map_err(|_| AppError::Internal("failed to sign credential".to_owned()))?;
    let cookie = crate::middleware::cookies::credential(config, cookie_name, &issued.token);
    Ok((issued, cookie.to_string()))
}

/// Create the cart routes router. Every route requires a cart credential.
pub fn cart_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(cart::items).delete(cart::clear))
        .route("/add", post(cart::add))
        .route("/checkout", post(cart::checkout))
        .route("/session", post(cart::refresh_session))
        .route(
            "/{product_id}",
            put(cart::update_quantity).delete(cart::remove),
        )
        .route_layer(from_fn_with_state(state.clone(), require_cart))
}

/// Create the admin routes router. Every route requires a current admin.
pub fn admin_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(admin::portal))
        .route("/users", post(admin::create_user))
        .route("/users/{id}", get(admin::get_user))
        .route("/users/{id}/admin", put(admin::set_admin))
        .route("/products", post(admin::create_product))
        .route(
            "/products/{id}",
            put(admin::update_product).delete(admin::delete_product),
        )
        .route("/collections", post(admin::create_collection))
        .route(
            "/collections/{id}",
            put(admin::update_collection).delete(admin::delete_collection),
        )
        .route(
            "/collections/{id}/products/{product_id}",
            post(admin::add_to_collection).delete(admin::remove_from_collection),
        )
        .route_layer(from_fn_with_state(state.clone(), require_admin))
}

/// Create the auth routes router.
pub fn auth_routes(state: &AppState) -> Router<AppState> {
    let limiter = login_rate_limiter(state.config().trust_proxy_headers);
    Router::new()
        .route("/login", post(auth::login).layer(limiter))
        .route("/logout", post(auth::logout))
}

/// Create the catalog routes router.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(products::index))
        .route("/products/{id}", get(products::show))
        .route("/collections", get(collections::index))
        .route("/collections/{id}", get(collections::show))
}

/// All `/api` routes.
pub fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(catalog_routes())
        .route("/new-cart", post(cart::new_cart))
        .nest("/cart", cart_routes(state))
        .nest("/auth", auth_routes(state))
        .nest("/admin", admin_routes(state))
}

/// Build the full application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api", api_routes(&state))
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = tracing::field::Empty,
                cart_id = tracing::field::Empty,
                user_id = tracing::field::Empty,
            )
        }))
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
