//! Forged, tampered, and expired credentials at both gates.
//!
//! Every rejection must be the same `401 Permission denied`, whether or not
//! the cart or user named inside the token exists.

#![allow(clippy::unwrap_used)]

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use secrecy::SecretString;

use dam_nation_api::services::credential::{CredentialCodec, Subject};
use dam_nation_api::test_support::{TEST_SIGNING_KEY, TestApp, TestResponse};
use dam_nation_core::{CartId, Role, UserId};
use dam_nation_integration_tests::{cart_id, cookie};

const OTHER_KEY: &str = "Pz7mQ2vK9xL4wR8tN1bC6yH3jF5dS0gA";

fn codec(key: &str) -> CredentialCodec {
    CredentialCodec::new(&SecretString::from(key)).unwrap()
}

fn cart_token(key: &str, cart: CartId) -> String {
    codec(key)
        .issue(Subject::Cart(cart), Duration::hours(1), Utc::now())
        .unwrap()
        .token
}

fn admin_token(key: &str, user: UserId) -> String {
    codec(key)
        .issue(
            Subject::Admin {
                user_id: user,
                role: Role::Admin,
                cart_id: None,
            },
            Duration::hours(1),
            Utc::now(),
        )
        .unwrap()
        .token
}

fn segments(token: &str) -> Vec<&str> {
    token.split('.').collect()
}

fn assert_denied(response: &TestResponse) {
    assert_eq!(response.status, StatusCode::UNAUTHORIZED, "{:?}", response.body);
    assert_eq!(response.body["error"], "Permission denied");
}

async fn get_cart(app: &TestApp, token: &str) -> TestResponse {
    let cookie = cookie(app.cart_cookie(), token);
    app.send(Method::GET, "/api/cart", Some(&cookie), None).await
}

async fn get_admin(app: &TestApp, token: &str) -> TestResponse {
    let cookie = cookie(app.admin_cookie(), token);
    app.send(Method::GET, "/api/admin", Some(&cookie), None).await
}

#[tokio::test]
async fn test_missing_and_garbage_credentials() {
    let app = TestApp::new();

    assert_denied(&app.send(Method::GET, "/api/cart", None, None).await);
    assert_denied(&app.send(Method::DELETE, "/api/cart", None, None).await);
    assert_denied(&app.send(Method::GET, "/api/admin", None, None).await);

    for token in ["", "not-a-token", "a.b", "a.b.c", "a.b.c.d"] {
        assert_denied(&get_cart(&app, token).await);
        assert_denied(&get_admin(&app, token).await);
    }
}

#[tokio::test]
async fn test_foreign_key_is_rejected_even_for_existing_cart() {
    let app = TestApp::new();
    let real = app.new_cart().await;
    let existing = cart_id(&app, &real).await;

    assert_denied(&get_cart(&app, &cart_token(OTHER_KEY, existing)).await);
    assert_denied(&get_cart(&app, &cart_token(OTHER_KEY, CartId::generate())).await);
}

#[tokio::test]
async fn test_foreign_key_is_rejected_even_for_real_admin() {
    let app = TestApp::new();
    let admin = app
        .create_user("admin@damnation.shop", "s3cure-passw0rd", true)
        .await;

    assert_denied(&get_admin(&app, &admin_token(OTHER_KEY, admin.id)).await);
    assert_denied(&get_admin(&app, &admin_token(OTHER_KEY, UserId::new(424_242))).await);

    // Same user, right key: admitted
    let ok = get_admin(&app, &admin_token(TEST_SIGNING_KEY, admin.id)).await;
    assert_eq!(ok.status, StatusCode::OK);
}

#[tokio::test]
async fn test_swapped_payload_is_rejected() {
    let app = TestApp::new();
    let first = cart_id(&app, &app.new_cart().await).await;
    let second = cart_id(&app, &app.new_cart().await).await;

    let a = cart_token(TEST_SIGNING_KEY, first);
    let b = cart_token(TEST_SIGNING_KEY, second);
    let (a, b) = (segments(&a), segments(&b));
    let forged = format!("{}.{}.{}", a[0], b[1], a[2]);

    assert_denied(&get_cart(&app, &forged).await);
}

#[tokio::test]
async fn test_alg_none_is_rejected() {
    let app = TestApp::new();
    let cart = cart_id(&app, &app.new_cart().await).await;
    let token = cart_token(TEST_SIGNING_KEY, cart);
    let payload = segments(&token)[1];

    // {"alg":"none","typ":"JWT"}
    let none_header = "eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0";
    assert_denied(&get_cart(&app, &format!("{none_header}.{payload}.")).await);
}

#[tokio::test]
async fn test_expired_credential_is_rejected() {
    let app = TestApp::new();
    let cart = cart_id(&app, &app.new_cart().await).await;

    let expired = codec(TEST_SIGNING_KEY)
        .issue(
            Subject::Cart(cart),
            Duration::hours(1),
            Utc::now() - Duration::hours(2),
        )
        .unwrap()
        .token;
    assert_denied(&get_cart(&app, &expired).await);
}

#[tokio::test]
async fn test_valid_token_for_unknown_cart_is_rejected() {
    let app = TestApp::new();
    let token = cart_token(TEST_SIGNING_KEY, CartId::generate());
    assert_denied(&get_cart(&app, &token).await);
}

#[tokio::test]
async fn test_cart_credential_cannot_open_admin_routes() {
    let app = TestApp::new();
    let cart_cookie = app.new_cart().await;
    let cart = cart_id(&app, &cart_cookie).await;

    // Presented under the admin cookie name, a cart credential is still not admin
    assert_denied(&get_admin(&app, &cart_token(TEST_SIGNING_KEY, cart)).await);
}

#[tokio::test]
async fn test_admin_role_claim_for_non_admin_user_is_rejected() {
    let app = TestApp::new();
    let shopper = app
        .create_user("shopper@example.com", "hunter2hunter2", false)
        .await;

    assert_denied(&get_admin(&app, &admin_token(TEST_SIGNING_KEY, shopper.id)).await);
}
