//! Checkout assembly.
//!
//! Reads the admitted cart once and turns it into a [`PaymentManifest`] for
//! the payment provider. The manifest carries price references and stored
//! quantities only; amounts are computed by the provider. The cart itself is
//! left untouched.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, instrument, warn};
use url::Url;

use dam_nation_core::{CartId, PriceRef, Quantity};

use super::cart::{CartError, CartService};
use crate::models::CartLine;
use crate::payments::{PaymentError, PaymentGateway};

/// Metadata key under which the cart id is sent to the provider.
pub const CART_ID_METADATA: &str = "cartID";

/// Errors from checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart has no items")]
    EmptyCart,

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Payment(#[from] PaymentError),
}

/// One provider line item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestLine {
    pub price_ref: PriceRef,
    pub quantity: Quantity,
}

/// Snapshot of a cart handed to the payment provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentManifest {
    pub cart_id: CartId,
    pub line_items: Vec<ManifestLine>,
    pub metadata: BTreeMap<String, String>,
    /// Stable across retries of one cart state. Any line change, including a
    /// clear followed by re-adding the same lines, produces a new key.
    pub idempotency_key: String,
}

impl PaymentManifest {
    fn from_lines(cart_id: CartId, revision: i64, lines: &[CartLine]) -> Self {
        let line_items: Vec<ManifestLine> = lines
            .iter()
            .map(|line| ManifestLine {
                price_ref: line.price_ref.clone(),
                quantity: line.quantity,
            })
            .collect();

        let mut hasher = Sha256::new();
        hasher.update(cart_id.as_uuid().as_bytes());
        hasher.update(revision.to_be_bytes());
        for line in lines {
            hasher.update(line.product_id.as_i32().to_be_bytes());
            hasher.update(line.quantity.get().to_be_bytes());
            hasher.update(line.price_ref.as_str().as_bytes());
            hasher.update([0]);
        }
        let idempotency_key = hex::encode(hasher.finalize());

        Self {
            cart_id,
            line_items,
            metadata: BTreeMap::from([(CART_ID_METADATA.to_string(), cart_id.to_string())]),
            idempotency_key,
        }
    }
}

/// Builds manifests and hands them to a [`PaymentGateway`].
pub struct CheckoutService<'a> {
    carts: CartService<'a>,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(carts: CartService<'a>) -> Self {
        Self { carts }
    }

    /// Snapshot the cart into a manifest.
    ///
    /// # Errors
    ///
    /// `EmptyCart` when the cart has no lines, `Cart` when the items cannot be
    /// read or a line's product no longer exists.
    #[instrument(skip(self), fields(cart_id = %cart_id))]
    pub async fn build_checkout(&self, cart_id: CartId) -> Result<PaymentManifest, CheckoutError> {
        let revision = self.carts.revision(cart_id).await?;
        let lines = self.carts.get_items(cart_id).await?;
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        Ok(PaymentManifest::from_lines(cart_id, revision, &lines))
    }

    /// Build the manifest and create a provider session for it.
    ///
    /// # Errors
    ///
    /// Everything [`Self::build_checkout`] returns, plus `Payment` when the
    /// provider call fails. The gateway is not called for an empty cart.
    #[instrument(skip(self, gateway), fields(cart_id = %cart_id))]
    pub async fn checkout(
        &self,
        cart_id: CartId,
        gateway: &dyn PaymentGateway,
    ) -> Result<Url, CheckoutError> {
        let manifest = self.build_checkout(cart_id).await?;
        let url = gateway.create_session(&manifest).await.map_err(|e| {
            warn!(error = %e, "Payment session creation failed");
            e
        })?;
        info!(lines = manifest.line_items.len(), "Checkout session ready");
        Ok(url)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use dam_nation_core::{CurrencyCode, Price, ProductId};

    use super::*;
    use crate::db::MemoryStore;
    use crate::models::Product;
    use crate::test_support::RecordingGateway;

    async fn store_with(products: &[(i32, &str)]) -> MemoryStore {
        let store = MemoryStore::new();
        for (id, price_ref) in products {
            store
                .insert_product(Product {
                    id: ProductId::new(*id),
                    name: format!("Product {id}"),
                    description: String::new(),
                    price: Price::from_cents(1999, CurrencyCode::USD),
                    price_ref: PriceRef::parse(price_ref).unwrap(),
                    created_at: Utc::now(),
                })
                .await;
        }
        store
    }

    #[tokio::test]
    async fn test_empty_cart_never_reaches_gateway() {
        let store = store_with(&[]).await;
        let carts = CartService::new(&store, &store);
        let cart = carts.create_cart().await.unwrap();
        let gateway = RecordingGateway::default();

        let result = CheckoutService::new(carts).checkout(cart.id, &gateway).await;
        assert!(matches!(result, Err(CheckoutError::EmptyCart)));
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test]
    async fn test_manifest_forwards_price_ref_and_quantity() {
        let store = store_with(&[(7, "price_dam_tee")]).await;
        let carts = CartService::new(&store, &store);
        let cart = carts.create_cart().await.unwrap();
        carts.add_item(cart.id, ProductId::new(7), 2).await.unwrap();
        carts.add_item(cart.id, ProductId::new(7), 1).await.unwrap();

        let checkout = CheckoutService::new(CartService::new(&store, &store));
        let manifest = checkout.build_checkout(cart.id).await.unwrap();

        assert_eq!(manifest.line_items.len(), 1);
        assert_eq!(manifest.line_items[0].price_ref.as_str(), "price_dam_tee");
        assert_eq!(manifest.line_items[0].quantity.get(), 3);
        assert_eq!(manifest.metadata[CART_ID_METADATA], cart.id.to_string());

        // Read-only
        assert_eq!(carts.get_items(cart.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_idempotency_key_tracks_contents() {
        let store = store_with(&[(1, "price_a"), (2, "price_b")]).await;
        let carts = CartService::new(&store, &store);
        let cart = carts.create_cart().await.unwrap();
        carts.add_item(cart.id, ProductId::new(1), 1).await.unwrap();

        let checkout = CheckoutService::new(CartService::new(&store, &store));
        let first = checkout.build_checkout(cart.id).await.unwrap();
        let again = checkout.build_checkout(cart.id).await.unwrap();
        assert_eq!(first.idempotency_key, again.idempotency_key);

        carts.add_item(cart.id, ProductId::new(2), 1).await.unwrap();
        let changed = checkout.build_checkout(cart.id).await.unwrap();
        assert_ne!(first.idempotency_key, changed.idempotency_key);
    }

    #[tokio::test]
    async fn test_refilled_cart_gets_fresh_idempotency_key() {
        let store = store_with(&[(7, "price_dam_tee")]).await;
        let carts = CartService::new(&store, &store);
        let cart = carts.create_cart().await.unwrap();
        carts.add_item(cart.id, ProductId::new(7), 1).await.unwrap();

        let checkout = CheckoutService::new(CartService::new(&store, &store));
        let first = checkout.build_checkout(cart.id).await.unwrap();

        // Same contents as before, but a separate purchase
        carts.clear_all(cart.id).await.unwrap();
        carts.add_item(cart.id, ProductId::new(7), 1).await.unwrap();
        let second = checkout.build_checkout(cart.id).await.unwrap();

        assert_eq!(first.line_items, second.line_items);
        assert_ne!(first.idempotency_key, second.idempotency_key);
    }

    #[tokio::test]
    async fn test_checkout_returns_gateway_url() {
        let store = store_with(&[(1, "price_a")]).await;
        let carts = CartService::new(&store, &store);
        let cart = carts.create_cart().await.unwrap();
        carts.add_item(cart.id, ProductId::new(1), 2).await.unwrap();
        let gateway = RecordingGateway::default();

        let url = CheckoutService::new(carts)
            .checkout(cart.id, &gateway)
            .await
            .unwrap();
        assert_eq!(url, gateway.url());
        assert_eq!(gateway.calls(), 1);
        assert_eq!(gateway.last_manifest().unwrap().line_items[0].quantity.get(), 2);
    }

    #[tokio::test]
    async fn test_gateway_failure_is_payment_error() {
        let store = store_with(&[(1, "price_a")]).await;
        let carts = CartService::new(&store, &store);
        let cart = carts.create_cart().await.unwrap();
        carts.add_item(cart.id, ProductId::new(1), 1).await.unwrap();
        let gateway = RecordingGateway::failing();

        let result = CheckoutService::new(carts).checkout(cart.id, &gateway).await;
        assert!(matches!(result, Err(CheckoutError::Payment(_))));
        assert_eq!(gateway.calls(), 1);
    }
}
