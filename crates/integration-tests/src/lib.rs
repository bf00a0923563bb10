//! Integration tests for the Dam Nation shop API.
//!
//! Every test builds the full router over the in-memory store (see
//! `dam_nation_api::test_support`) and drives it in-process, so no database
//! or network is needed:
//!
//! ```bash
//! cargo test -p dam-nation-integration-tests
//! ```
//!
//! # Test Files
//!
//! - `cart_flow` - Cart lifecycle and checkout over HTTP
//! - `credentials` - Forged, tampered, and expired credentials at both gates
//! - `admin` - Login, admin revocation, and catalog management
//! - `concurrency` - Concurrent adds against one cart line

use axum::http::Method;
use dam_nation_api::test_support::TestApp;
use dam_nation_core::CartId;

/// Id of the cart behind `cookie`, read back through `GET /api/cart`.
///
/// # Panics
///
/// Panics if the cookie is not admitted by the cart gate.
pub async fn cart_id(app: &TestApp, cookie: &str) -> CartId {
    let response = app.send(Method::GET, "/api/cart", Some(cookie), None).await;
    response.body["cartId"]
        .as_str()
        .and_then(|id| id.parse().ok())
        .unwrap_or_else(|| panic!("cart cookie not admitted: {:?}", response.body))
}

/// `Cookie` header value for a raw token under `name`.
#[must_use]
pub fn cookie(name: &str, token: &str) -> String {
    format!("{name}={token}")
}
