//! Cart mutation engine.
//!
//! Every operation takes a cart id that a gate has already admitted. Input
//! validation happens here; the atomic read-modify-write of a line is
//! delegated to a single [`CartStore`] call so concurrent requests against
//! the same line never lose an update.

use thiserror::Error;
use tracing::{error, info, instrument};

use dam_nation_core::{CartId, ProductId, Quantity, QuantityError};

use crate::db::{CartStore, Catalog, RepositoryError};
use crate::models::{Cart, CartLine, LineItem, Product};

/// What a `NotFound` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    Cart,
    Product,
    LineItem,
}

impl std::fmt::Display for Missing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Cart => "Cart",
            Self::Product => "Product",
            Self::LineItem => "Cart item",
        })
    }
}

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0} not found")]
    NotFound(Missing),

    #[error("store error: {0}")]
    Store(#[from] RepositoryError),
}

impl From<QuantityError> for CartError {
    fn from(err: QuantityError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

/// Result of [`CartService::update_quantity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityUpdate {
    Updated(LineItem),
    Removed,
}

/// Cart operations over the storage ports.
pub struct CartService<'a> {
    carts: &'a dyn CartStore,
    catalog: &'a dyn Catalog,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(carts: &'a dyn CartStore, catalog: &'a dyn Catalog) -> Self {
        Self { carts, catalog }
    }

    /// Create an empty cart with a fresh id.
    ///
    /// # Errors
    ///
    /// `Store` if the insert fails.
    #[instrument(skip(self))]
    pub async fn create_cart(&self) -> Result<Cart, CartError> {
        let cart = self
            .carts
            .create_cart(CartId::generate())
            .await
            .map_err(store_error)?;
        info!(cart_id = %cart.id, "Cart created");
        Ok(cart)
    }

    /// Add `quantity` units of a product, creating the line or incrementing it.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `quantity < 1`, `NotFound` if the product is not
    /// in the catalog.
    #[instrument(skip(self), fields(cart_id = %cart_id, product_id = %product_id))]
    pub async fn add_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<LineItem, CartError> {
        let quantity = Quantity::try_from(quantity)?;
        self.require_product(product_id).await?;

        match self.carts.add_item(cart_id, product_id, quantity).await {
            Ok(line) => Ok(line),
            // Product deleted between the lookup and the insert
            Err(RepositoryError::NotFound) => Err(CartError::NotFound(Missing::Product)),
            Err(RepositoryError::Conflict(msg)) => Err(CartError::InvalidArgument(msg)),
            Err(e) => Err(store_error(e)),
        }
    }

    /// Set a line's quantity. Zero removes the line.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `quantity < 0`, `NotFound` if the cart has no
    /// line for the product.
    #[instrument(skip(self), fields(cart_id = %cart_id, product_id = %product_id))]
    pub async fn update_quantity(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<QuantityUpdate, CartError> {
        if quantity < 0 {
            return Err(CartError::InvalidArgument(
                "quantity must not be negative".to_owned(),
            ));
        }
        if quantity == 0 {
            self.remove_item(cart_id, product_id).await?;
            return Ok(QuantityUpdate::Removed);
        }

        let quantity = Quantity::try_from(quantity)?;
        self.carts
            .set_quantity(cart_id, product_id, quantity)
            .await
            .map_err(store_error)?
            .map(QuantityUpdate::Updated)
            .ok_or(CartError::NotFound(Missing::LineItem))
    }

    /// Delete exactly the line for `product_id`.
    ///
    /// # Errors
    ///
    /// `NotFound` if there is no such line.
    #[instrument(skip(self), fields(cart_id = %cart_id, product_id = %product_id))]
    pub async fn remove_item(&self, cart_id: CartId, product_id: ProductId) -> Result<(), CartError> {
        let removed = self
            .carts
            .remove_item(cart_id, product_id)
            .await
            .map_err(store_error)?;
        if removed {
            Ok(())
        } else {
            Err(CartError::NotFound(Missing::LineItem))
        }
    }

    /// Delete every line. Succeeds on an empty cart.
    ///
    /// # Errors
    ///
    /// `Store` if the delete fails.
    #[instrument(skip(self), fields(cart_id = %cart_id))]
    pub async fn clear_all(&self, cart_id: CartId) -> Result<(), CartError> {
        let removed = self.carts.clear(cart_id).await.map_err(store_error)?;
        info!(removed, "Cart cleared");
        Ok(())
    }

    /// Current lines resolved against the catalog, ascending by product id.
    ///
    /// # Errors
    ///
    /// `NotFound` if a line references a product the catalog no longer has.
    #[instrument(skip(self), fields(cart_id = %cart_id))]
    pub async fn get_items(&self, cart_id: CartId) -> Result<Vec<CartLine>, CartError> {
        let mut items = self.carts.list_items(cart_id).await.map_err(store_error)?;
        items.sort_by_key(|line| line.product_id);

        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            let product = self.require_product(item.product_id).await?;
            lines.push(CartLine {
                product_id: product.id,
                name: product.name,
                price: product.price,
                price_ref: product.price_ref,
                quantity: item.quantity,
            });
        }
        Ok(lines)
    }

    /// The cart's current revision.
    ///
    /// # Errors
    ///
    /// `NotFound` if the cart does not exist.
    pub async fn revision(&self, cart_id: CartId) -> Result<i64, CartError> {
        self.carts
            .get_cart(cart_id)
            .await
            .map_err(store_error)?
            .map(|cart| cart.revision)
            .ok_or(CartError::NotFound(Missing::Cart))
    }

    async fn require_product(
        &self,
        product_id: ProductId,
    ) -> Result<Product, CartError> {
        self.catalog
            .get_product(product_id)
            .await
            .map_err(store_error)?
            .ok_or(CartError::NotFound(Missing::Product))
    }
}

fn store_error(e: RepositoryError) -> CartError {
    error!(error = %e, "Cart store operation failed");
    CartError::Store(e)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use dam_nation_core::{CurrencyCode, Price, PriceRef};

    use super::*;
    use crate::db::MemoryStore;

    async fn store_with_products(ids: &[i32]) -> MemoryStore {
        let store = MemoryStore::new();
        for id in ids {
            store
                .insert_product(Product {
                    id: ProductId::new(*id),
                    name: format!("Product {id}"),
                    description: String::new(),
                    price: Price::from_cents(1000, CurrencyCode::USD),
                    price_ref: PriceRef::parse(&format!("price_{id}")).unwrap(),
                    created_at: Utc::now(),
                })
                .await;
        }
        store
    }

    fn quantities(lines: &[CartLine]) -> Vec<(i32, u32)> {
        lines
            .iter()
            .map(|l| (l.product_id.as_i32(), l.quantity.get()))
            .collect()
    }

    #[tokio::test]
    async fn test_repeated_add_merges_into_one_line() {
        let store = store_with_products(&[7]).await;
        let carts = CartService::new(&store, &store);
        let cart = carts.create_cart().await.unwrap();

        carts.add_item(cart.id, ProductId::new(7), 2).await.unwrap();
        let line = carts.add_item(cart.id, ProductId::new(7), 1).await.unwrap();
        assert_eq!(line.quantity.get(), 3);

        let items = carts.get_items(cart.id).await.unwrap();
        assert_eq!(quantities(&items), vec![(7, 3)]);
        assert_eq!(items[0].price_ref.as_str(), "price_7");
    }

    #[tokio::test]
    async fn test_add_validates_quantity_and_product() {
        let store = store_with_products(&[1]).await;
        let carts = CartService::new(&store, &store);
        let cart = carts.create_cart().await.unwrap();

        for bad in [0, -1] {
            let err = carts.add_item(cart.id, ProductId::new(1), bad).await;
            assert!(matches!(err, Err(CartError::InvalidArgument(_))));
        }
        let err = carts.add_item(cart.id, ProductId::new(2), 1).await;
        assert!(matches!(err, Err(CartError::NotFound(Missing::Product))));
        assert!(carts.get_items(cart.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_deletes_exactly_one_line() {
        let store = store_with_products(&[1, 2]).await;
        let carts = CartService::new(&store, &store);
        let cart = carts.create_cart().await.unwrap();
        carts.add_item(cart.id, ProductId::new(1), 3).await.unwrap();
        carts.add_item(cart.id, ProductId::new(2), 5).await.unwrap();

        carts.remove_item(cart.id, ProductId::new(1)).await.unwrap();
        assert_eq!(quantities(&carts.get_items(cart.id).await.unwrap()), vec![(2, 5)]);

        let again = carts.remove_item(cart.id, ProductId::new(1)).await;
        assert!(matches!(again, Err(CartError::NotFound(Missing::LineItem))));
        assert_eq!(quantities(&carts.get_items(cart.id).await.unwrap()), vec![(2, 5)]);
    }

    #[tokio::test]
    async fn test_remove_targets_line_regardless_of_position() {
        let store = store_with_products(&[1, 2, 3]).await;
        let carts = CartService::new(&store, &store);
        let cart = carts.create_cart().await.unwrap();
        for id in [1, 2, 3] {
            carts.add_item(cart.id, ProductId::new(id), 1).await.unwrap();
        }

        carts.remove_item(cart.id, ProductId::new(3)).await.unwrap();
        assert_eq!(
            quantities(&carts.get_items(cart.id).await.unwrap()),
            vec![(1, 1), (2, 1)]
        );
    }

    #[tokio::test]
    async fn test_update_quantity() {
        let store = store_with_products(&[1]).await;
        let carts = CartService::new(&store, &store);
        let cart = carts.create_cart().await.unwrap();

        let missing = carts.update_quantity(cart.id, ProductId::new(1), 4).await;
        assert!(matches!(missing, Err(CartError::NotFound(Missing::LineItem))));

        carts.add_item(cart.id, ProductId::new(1), 1).await.unwrap();
        let updated = carts
            .update_quantity(cart.id, ProductId::new(1), 4)
            .await
            .unwrap();
        assert!(matches!(updated, QuantityUpdate::Updated(l) if l.quantity.get() == 4));

        let negative = carts.update_quantity(cart.id, ProductId::new(1), -2).await;
        assert!(matches!(negative, Err(CartError::InvalidArgument(_))));

        let removed = carts
            .update_quantity(cart.id, ProductId::new(1), 0)
            .await
            .unwrap();
        assert_eq!(removed, QuantityUpdate::Removed);
        assert!(carts.get_items(cart.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_all_is_idempotent() {
        let store = store_with_products(&[1, 2]).await;
        let carts = CartService::new(&store, &store);
        let cart = carts.create_cart().await.unwrap();
        carts.add_item(cart.id, ProductId::new(1), 1).await.unwrap();
        carts.add_item(cart.id, ProductId::new(2), 2).await.unwrap();

        carts.clear_all(cart.id).await.unwrap();
        assert!(carts.get_items(cart.id).await.unwrap().is_empty());
        carts.clear_all(cart.id).await.unwrap();
        assert!(carts.get_items(cart.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_is_store_error() {
        let store = store_with_products(&[1]).await;
        let carts = CartService::new(&store, &store);
        let cart = carts.create_cart().await.unwrap();
        store.set_unavailable(true);

        let err = carts.get_items(cart.id).await;
        assert!(matches!(err, Err(CartError::Store(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_are_all_applied() {
        const N: u32 = 64;
        let store = Arc::new(store_with_products(&[1]).await);
        let cart = CartService::new(store.as_ref(), store.as_ref())
            .create_cart()
            .await
            .unwrap();
        let cart_id = cart.id;

        let mut tasks = Vec::new();
        for _ in 0..N {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                CartService::new(store.as_ref(), store.as_ref())
                    .add_item(cart_id, ProductId::new(1), 1)
                    .await
                    .unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let items = CartService::new(store.as_ref(), store.as_ref())
            .get_items(cart_id)
            .await
            .unwrap();
        assert_eq!(quantities(&items), vec![(1, N)]);
    }
}
