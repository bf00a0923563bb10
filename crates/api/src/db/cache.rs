//! Read-through product cache in front of a [`Catalog`].
//!
//! Caches single-product lookups using `moka` (60-second TTL). Cart reads hit
//! the product table once per line, so this absorbs most catalog traffic.
//! Charged prices are never taken from here; checkout only forwards the
//! product's price reference.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tracing::debug;

use dam_nation_core::{CollectionId, ProductId};

use super::{Catalog, RepositoryError};
use crate::models::{Collection, NewCollection, NewProduct, Product};

const PRODUCT_TTL: Duration = Duration::from_secs(60);
const MAX_PRODUCTS: u64 = 10_000;

/// [`Catalog`] decorator that caches `get_product` hits.
pub struct CachedCatalog {
    inner: Arc<dyn Catalog>,
    products: Cache<ProductId, Product>,
}

impl CachedCatalog {
    #[must_use]
    pub fn new(inner: Arc<dyn Catalog>) -> Self {
        let products = Cache::builder()
            .max_capacity(MAX_PRODUCTS)
            .time_to_live(PRODUCT_TTL)
            .build();

        Self { inner, products }
    }
}

#[async_trait]
impl Catalog for CachedCatalog {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        if let Some(product) = self.products.get(&id).await {
            debug!(product_id = %id, "Cache hit for product");
            return Ok(Some(product));
        }

        let product = self.inner.get_product(id).await?;
        // Misses are not cached so a newly created product is visible at once
        if let Some(product) = &product {
            self.products.insert(id, product.clone()).await;
        }
        Ok(product)
    }

    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError> {
        self.inner.list_products().await
    }

    async fn create_product(&self, input: &NewProduct) -> Result<Product, RepositoryError> {
        let product = self.inner.create_product(input).await?;
        self.products.insert(product.id, product.clone()).await;
        Ok(product)
    }

    async fn update_product(
        &self,
        id: ProductId,
        input: &NewProduct,
    ) -> Result<Option<Product>, RepositoryError> {
        let updated = self.inner.update_product(id, input).await;
        // Drop the entry even if the write failed; the next read refetches
        self.products.invalidate(&id).await;
        updated
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let deleted = self.inner.delete_product(id).await?;
        self.products.invalidate(&id).await;
        Ok(deleted)
    }

    async fn get_collection(
        &self,
        id: CollectionId,
    ) -> Result<Option<Collection>, RepositoryError> {
        self.inner.get_collection(id).await
    }

    async fn list_collections(&self) -> Result<Vec<Collection>, RepositoryError> {
        self.inner.list_collections().await
    }

    async fn collection_products(
        &self,
        id: CollectionId,
    ) -> Result<Vec<Product>, RepositoryError> {
        self.inner.collection_products(id).await
    }

    async fn create_collection(
        &self,
        input: &NewCollection,
    ) -> Result<Collection, RepositoryError> {
        self.inner.create_collection(input).await
    }

    async fn update_collection(
        &self,
        id: CollectionId,
        input: &NewCollection,
    ) -> Result<Option<Collection>, RepositoryError> {
        self.inner.update_collection(id, input).await
    }

    async fn delete_collection(&self, id: CollectionId) -> Result<bool, RepositoryError> {
        self.inner.delete_collection(id).await
    }

    async fn add_to_collection(
        &self,
        collection: CollectionId,
        product: ProductId,
    ) -> Result<(), RepositoryError> {
        self.inner.add_to_collection(collection, product).await
    }

    async fn remove_from_collection(
        &self,
        collection: CollectionId,
        product: ProductId,
    ) -> Result<bool, RepositoryError> {
        self.inner.remove_from_collection(collection, product).await
    }
}
