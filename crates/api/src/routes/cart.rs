//! Cart route handlers.
//!
//! Everything except `new_cart` runs behind the cart gate, so the cart id
//! always comes from the verified credential. A `cartId` in a request body
//! is only compared against it for logging.

use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};
use url::Url;

use dam_nation_core::{CartId, ProductId};

use super::issue_cookie;
use crate::error::{Result, add_breadcrumb};
use crate::middleware::CurrentCart;
use crate::models::{CartLine, LineItem};
use crate::services::cart::QuantityUpdate;
use crate::services::credential::Subject;
use crate::state::AppState;

/// Cart credential handed out with a new or refreshed session.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSessionResponse {
    pub cart_id: CartId,
    pub expires_at: DateTime<Utc>,
}

/// Cart contents.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub cart_id: CartId,
    pub items: Vec<CartLine>,
    pub item_count: u64,
}

/// Add-to-cart request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_id: ProductId,
    pub quantity: i64,
    /// Advisory only; the credential decides which cart is used.
    #[serde(default)]
    pub cart_id: Option<CartId>,
}

/// Quantity update request body.
#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i64,
}

/// Checkout response.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub url: Url,
}

fn session_response(state: &AppState, cart_id: CartId, status: StatusCode) -> Result<Response> {
    let (issued, cookie) = issue_cookie(
        state,
        Subject::Cart(cart_id),
        &state.config().credentials.cart_cookie,
    )?;
    let body = CartSessionResponse {
        cart_id,
        expires_at: issued.expires_at,
    };
    Ok((status, AppendHeaders([(SET_COOKIE, cookie)]), Json(body)).into_response())
}

/// Create an empty cart and set its credential cookie.
#[instrument(skip(state))]
pub async fn new_cart(State(state): State<AppState>) -> Result<Response> {
    let cart = state.cart_service().create_cart().await?;
    add_breadcrumb("cart", "Cart created", &[("cart_id", cart.id.to_string())]);
    session_response(&state, cart.id, StatusCode::CREATED)
}

/// Issue a fresh credential for the admitted cart.
#[instrument(skip(state, session), fields(cart_id = %session.cart_id))]
pub async fn refresh_session(
    State(state): State<AppState>,
    CurrentCart(session): CurrentCart,
) -> Result<Response> {
    session_response(&state, session.cart_id, StatusCode::OK)
}

/// Current cart contents.
#[instrument(skip(state, session), fields(cart_id = %session.cart_id))]
pub async fn items(
    State(state): State<AppState>,
    CurrentCart(session): CurrentCart,
) -> Result<Json<CartView>> {
    let items = state.cart_service().get_items(session.cart_id).await?;
    let item_count = items.iter().map(|line| u64::from(line.quantity.get())).sum();
    Ok(Json(CartView {
        cart_id: session.cart_id,
        items,
        item_count,
    }))
}

/// Add an item, merging with an existing line for the same product.
#[instrument(skip(state, session, body), fields(cart_id = %session.cart_id, product_id = %body.product_id))]
pub async fn add(
    State(state): State<AppState>,
    CurrentCart(session): CurrentCart,
    Json(body): Json<AddItemRequest>,
) -> Result<Json<LineItem>> {
    if let Some(claimed) = body.cart_id.filter(|claimed| *claimed != session.cart_id) {
        warn!(claimed_cart_id = %claimed, "Request body names a different cart; using credential cart");
    }

    let line = state
        .cart_service()
        .add_item(session.cart_id, body.product_id, body.quantity)
        .await?;
    add_breadcrumb(
        "cart",
        "Item added",
        &[
            ("cart_id", session.cart_id.to_string()),
            ("product_id", body.product_id.to_string()),
            ("quantity", line.quantity.to_string()),
        ],
    );
    Ok(Json(line))
}

/// Set a line's quantity. Zero removes the line.
#[instrument(skip(state, session, body), fields(cart_id = %session.cart_id, product_id = %product_id))]
pub async fn update_quantity(
    State(state): State<AppState>,
    CurrentCart(session): CurrentCart,
    Path(product_id): Path<ProductId>,
    Json(body): Json<UpdateQuantityRequest>,
) -> Result<Response> {
    let update = state
        .cart_service()
        .update_quantity(session.cart_id, product_id, body.quantity)
        .await?;
    Ok(match update {
        QuantityUpdate::Updated(line) => Json(line).into_response(),
        QuantityUpdate::Removed => StatusCode::NO_CONTENT.into_response(),
    })
}

/// Remove one line.
#[instrument(skip(state, session), fields(cart_id = %session.cart_id, product_id = %product_id))]
pub async fn remove(
    State(state): State<AppState>,
    CurrentCart(session): CurrentCart,
    Path(product_id): Path<ProductId>,
) -> Result<StatusCode> {
    state
        .cart_service()
        .remove_item(session.cart_id, product_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Remove every line. The cart and its credential stay valid.
#[instrument(skip(state, session), fields(cart_id = %session.cart_id))]
pub async fn clear(
    State(state): State<AppState>,
    CurrentCart(session): CurrentCart,
) -> Result<StatusCode> {
    state.cart_service().clear_all(session.cart_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Create a payment session for the cart and return its URL.
#[instrument(skip(state, session), fields(cart_id = %session.cart_id))]
pub async fn checkout(
    State(state): State<AppState>,
    CurrentCart(session): CurrentCart,
) -> Result<Json<CheckoutResponse>> {
    add_breadcrumb(
        "checkout",
        "Checkout started",
        &[("cart_id", session.cart_id.to_string())],
    );
    let url = state
        .checkout_service()
        .checkout(session.cart_id, state.payments())
        .await?;
    Ok(Json(CheckoutResponse { url }))
}
