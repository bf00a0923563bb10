//! Cart lifecycle and checkout over HTTP.

#![allow(clippy::unwrap_used)]

use axum::http::{Method, StatusCode};
use serde_json::{Value, json};

use dam_nation_api::test_support::{RecordingGateway, TEST_SESSION_URL, TestApp};
use dam_nation_integration_tests::cart_id;

fn lines(body: &Value) -> Vec<(i64, i64)> {
    body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|line| {
            (
                line["productId"].as_i64().unwrap(),
                line["quantity"].as_i64().unwrap(),
            )
        })
        .collect()
}

async fn add(app: &TestApp, cookie: &str, product_id: i32, quantity: i64) -> StatusCode {
    app.send(
        Method::POST,
        "/api/cart/add",
        Some(cookie),
        Some(json!({ "productId": product_id, "quantity": quantity })),
    )
    .await
    .status
}

#[tokio::test]
async fn test_new_cart_sets_http_only_cookie() {
    let app = TestApp::new();
    let response = app.send(Method::POST, "/api/new-cart", None, None).await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert!(response.body["cartId"].is_string());

    let set_cookie = response.headers["set-cookie"].to_str().unwrap();
    assert!(set_cookie.starts_with("dam-nation-shop="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));
    assert!(set_cookie.contains("Max-Age=86400"));
}

#[tokio::test]
async fn test_add_merge_then_checkout() {
    let app = TestApp::new();
    app.seed_product(7, "price_dam_tee").await;
    let cookie = app.new_cart().await;

    assert_eq!(add(&app, &cookie, 7, 2).await, StatusCode::OK);
    assert_eq!(add(&app, &cookie, 7, 1).await, StatusCode::OK);

    let cart = app.send(Method::GET, "/api/cart", Some(&cookie), None).await;
    assert_eq!(lines(&cart.body), vec![(7, 3)]);
    assert_eq!(cart.body["items"][0]["priceRef"], "price_dam_tee");
    assert_eq!(cart.body["itemCount"], 3);

    let checkout = app
        .send(Method::POST, "/api/cart/checkout", Some(&cookie), None)
        .await;
    assert_eq!(checkout.status, StatusCode::OK);
    assert_eq!(checkout.body["url"], TEST_SESSION_URL);

    let manifest = app.gateway.last_manifest().unwrap();
    assert_eq!(manifest.line_items.len(), 1);
    assert_eq!(manifest.line_items[0].price_ref.as_str(), "price_dam_tee");
    assert_eq!(manifest.line_items[0].quantity.get(), 3);
    assert_eq!(
        manifest.metadata["cartID"],
        cart_id(&app, &cookie).await.to_string()
    );

    // Checkout leaves the cart alone
    let cart = app.send(Method::GET, "/api/cart", Some(&cookie), None).await;
    assert_eq!(lines(&cart.body), vec![(7, 3)]);
}

#[tokio::test]
async fn test_empty_checkout_never_calls_provider() {
    let app = TestApp::new();
    let cookie = app.new_cart().await;

    let response = app
        .send(Method::POST, "/api/cart/checkout", Some(&cookie), None)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "No items in cart");
    assert_eq!(app.gateway.calls(), 0);
}

#[tokio::test]
async fn test_provider_failure_is_bad_gateway() {
    let app = TestApp::with_gateway(RecordingGateway::failing());
    app.seed_product(1, "price_a").await;
    let cookie = app.new_cart().await;
    add(&app, &cookie, 1, 1).await;

    let response = app
        .send(Method::POST, "/api/cart/checkout", Some(&cookie), None)
        .await;
    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
    assert_eq!(response.body["error"], "External service error");
}

#[tokio::test]
async fn test_add_validation() {
    let app = TestApp::new();
    app.seed_product(1, "price_a").await;
    let cookie = app.new_cart().await;

    assert_eq!(add(&app, &cookie, 1, 0).await, StatusCode::BAD_REQUEST);
    assert_eq!(add(&app, &cookie, 1, -3).await, StatusCode::BAD_REQUEST);

    let missing = app
        .send(
            Method::POST,
            "/api/cart/add",
            Some(&cookie),
            Some(json!({ "productId": 99, "quantity": 1 })),
        )
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.body["error"], "Product not found");

    let cart = app.send(Method::GET, "/api/cart", Some(&cookie), None).await;
    assert!(lines(&cart.body).is_empty());
}

#[tokio::test]
async fn test_update_remove_and_clear() {
    let app = TestApp::new();
    for id in [1, 2, 3] {
        app.seed_product(id, &format!("price_{id}")).await;
    }
    let cookie = app.new_cart().await;
    add(&app, &cookie, 1, 3).await;
    add(&app, &cookie, 2, 5).await;
    add(&app, &cookie, 3, 1).await;

    let updated = app
        .send(Method::PUT, "/api/cart/2", Some(&cookie), Some(json!({ "quantity": 4 })))
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["quantity"], 4);

    let zeroed = app
        .send(Method::PUT, "/api/cart/3", Some(&cookie), Some(json!({ "quantity": 0 })))
        .await;
    assert_eq!(zeroed.status, StatusCode::NO_CONTENT);

    let removed = app.send(Method::DELETE, "/api/cart/1", Some(&cookie), None).await;
    assert_eq!(removed.status, StatusCode::NO_CONTENT);
    let again = app.send(Method::DELETE, "/api/cart/1", Some(&cookie), None).await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);
    assert_eq!(again.body["error"], "Cart item not found");

    let cart = app.send(Method::GET, "/api/cart", Some(&cookie), None).await;
    assert_eq!(lines(&cart.body), vec![(2, 4)]);

    for _ in 0..2 {
        let cleared = app.send(Method::DELETE, "/api/cart", Some(&cookie), None).await;
        assert_eq!(cleared.status, StatusCode::NO_CONTENT);
    }
    let cart = app.send(Method::GET, "/api/cart", Some(&cookie), None).await;
    assert!(lines(&cart.body).is_empty());
}

#[tokio::test]
async fn test_body_cart_id_is_advisory() {
    let app = TestApp::new();
    app.seed_product(1, "price_a").await;
    let mine = app.new_cart().await;
    let other = app.new_cart().await;
    let other_id = cart_id(&app, &other).await;

    let response = app
        .send(
            Method::POST,
            "/api/cart/add",
            Some(&mine),
            Some(json!({ "productId": 1, "quantity": 2, "cartId": other_id.to_string() })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let mine_cart = app.send(Method::GET, "/api/cart", Some(&mine), None).await;
    let other_cart = app.send(Method::GET, "/api/cart", Some(&other), None).await;
    assert_eq!(lines(&mine_cart.body), vec![(1, 2)]);
    assert!(lines(&other_cart.body).is_empty());
}

#[tokio::test]
async fn test_session_refresh_keeps_cart() {
    let app = TestApp::new();
    let cookie = app.new_cart().await;
    let before = cart_id(&app, &cookie).await;

    let response = app
        .send(Method::POST, "/api/cart/session", Some(&cookie), None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let refreshed = response.cookie(app.cart_cookie()).unwrap();
    assert_eq!(cart_id(&app, &refreshed).await, before);
}

#[tokio::test]
async fn test_carts_are_isolated() {
    let app = TestApp::new();
    app.seed_product(1, "price_a").await;
    let first = app.new_cart().await;
    let second = app.new_cart().await;
    add(&app, &first, 1, 1).await;

    let cart = app.send(Method::GET, "/api/cart", Some(&second), None).await;
    assert!(lines(&cart.body).is_empty());
}
