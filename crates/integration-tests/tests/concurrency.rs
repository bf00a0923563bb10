//! Concurrent adds against one cart line, over the in-memory store.
//! `postgres_concurrency.rs` runs the same race against `PgStore`.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use serde_json::json;

use dam_nation_api::test_support::TestApp;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_adds_are_all_counted() {
    const N: i64 = 32;

    let app = Arc::new(TestApp::new());
    app.seed_product(1, "price_a").await;
    let cookie = Arc::new(app.new_cart().await);

    let mut tasks = Vec::new();
    for _ in 0..N {
        let app = Arc::clone(&app);
        let cookie = Arc::clone(&cookie);
        tasks.push(tokio::spawn(async move {
            app.send(
                Method::POST,
                "/api/cart/add",
                Some(cookie.as_str()),
                Some(json!({ "productId": 1, "quantity": 1 })),
            )
            .await
            .status
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap(), StatusCode::OK);
    }

    let cart = app.send(Method::GET, "/api/cart", Some(cookie.as_str()), None).await;
    let items = cart.body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quantity"], N);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_adds_to_different_products() {
    let app = Arc::new(TestApp::new());
    for id in 1..=8 {
        app.seed_product(id, &format!("price_{id}")).await;
    }
    let cookie = Arc::new(app.new_cart().await);

    let mut tasks = Vec::new();
    for id in 1..=8 {
        for _ in 0..4 {
            let app = Arc::clone(&app);
            let cookie = Arc::clone(&cookie);
            tasks.push(tokio::spawn(async move {
                app.send(
                    Method::POST,
                    "/api/cart/add",
                    Some(cookie.as_str()),
                    Some(json!({ "productId": id, "quantity": 1 })),
                )
                .await
                .status
            }));
        }
    }
    for task in tasks {
        assert_eq!(task.await.unwrap(), StatusCode::OK);
    }

    let cart = app.send(Method::GET, "/api/cart", Some(cookie.as_str()), None).await;
    let items = cart.body["items"].as_array().unwrap();
    assert_eq!(items.len(), 8);
    for (i, item) in items.iter().enumerate() {
        assert_eq!(item["productId"], i64::try_from(i).unwrap() + 1);
        assert_eq!(item["quantity"], 4);
    }
}
