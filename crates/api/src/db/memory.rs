//! In-memory store for tests.
//!
//! Implements every storage port over plain maps behind one `tokio` mutex.
//! Each trait method takes the lock exactly once, which gives the same
//! per-operation atomicity as the single-statement SQL in
//! [`super::postgres`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use dam_nation_core::{CartId, CollectionId, Email, ProductId, Quantity, UserId};

use super::{CartStore, Catalog, RepositoryError, UserDirectory};
use crate::models::{Cart, Collection, LineItem, NewCollection, NewProduct, Product, User};

#[derive(Default)]
struct Inner {
    carts: HashMap<CartId, Cart>,
    lines: HashMap<CartId, BTreeMap<ProductId, Quantity>>,
    products: BTreeMap<ProductId, Product>,
    collections: BTreeMap<CollectionId, Collection>,
    memberships: BTreeSet<(CollectionId, ProductId)>,
    users: BTreeMap<UserId, (User, String)>,
    next_id: i32,
}

impl Inner {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn bump_revision(&mut self, cart: CartId) {
        if let Some(cart) = self.carts.get_mut(&cart) {
            cart.revision += 1;
        }
    }
}

/// Map-backed store implementing [`CartStore`], [`Catalog`], and
/// [`UserDirectory`].
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as if the database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Insert a product with a caller-chosen id, replacing any existing one.
    pub async fn insert_product(&self, product: Product) {
        let mut inner = self.inner.lock().await;
        inner.next_id = inner.next_id.max(product.id.as_i32());
        inner.products.insert(product.id, product);
    }

    fn check(&self) -> Result<(), RepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        self.check()
    }

    async fn create_cart(&self, id: CartId) -> Result<Cart, RepositoryError> {
        self.check()?;
        let mut inner = self.inner.lock().await;
        if inner.carts.contains_key(&id) {
            return Err(RepositoryError::Conflict("cart already exists".to_owned()));
        }
        let cart = Cart {
            id,
            revision: 0,
            created_at: Utc::now(),
        };
        inner.carts.insert(id, cart.clone());
        Ok(cart)
    }

    async fn get_cart(&self, id: CartId) -> Result<Option<Cart>, RepositoryError> {
        self.check()?;
        Ok(self.inner.lock().await.carts.get(&id).cloned())
    }

    async fn list_items(&self, cart: CartId) -> Result<Vec<LineItem>, RepositoryError> {
        self.check()?;
        let inner = self.inner.lock().await;
        Ok(inner
            .lines
            .get(&cart)
            .map(|lines| {
                lines
                    .iter()
                    .map(|(product_id, quantity)| LineItem {
                        product_id: *product_id,
                        quantity: *quantity,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn add_item(
        &self,
        cart: CartId,
        product: ProductId,
        quantity: Quantity,
    ) -> Result<LineItem, RepositoryError> {
        self.check()?;
        let mut inner = self.inner.lock().await;
        if !inner.carts.contains_key(&cart) || !inner.products.contains_key(&product) {
            return Err(RepositoryError::NotFound);
        }

        let lines = inner.lines.entry(cart).or_default();
        let total = match lines.get(&product) {
            Some(existing) => existing
                .checked_add(quantity)
                .map_err(|_| RepositoryError::Conflict("quantity too large".to_owned()))?,
            None => quantity,
        };
        lines.insert(product, total);
        inner.bump_revision(cart);

        Ok(LineItem {
            product_id: product,
            quantity: total,
        })
    }

    async fn set_quantity(
        &self,
        cart: CartId,
        product: ProductId,
        quantity: Quantity,
    ) -> Result<Option<LineItem>, RepositoryError> {
        self.check()?;
        let mut inner = self.inner.lock().await;
        let Some(existing) = inner
            .lines
            .get_mut(&cart)
            .and_then(|lines| lines.get_mut(&product))
        else {
            return Ok(None);
        };
        *existing = quantity;
        inner.bump_revision(cart);

        Ok(Some(LineItem {
            product_id: product,
            quantity,
        }))
    }

    async fn remove_item(&self, cart: CartId, product: ProductId) -> Result<bool, RepositoryError> {
        self.check()?;
        let mut inner = self.inner.lock().await;
        let removed = inner
            .lines
            .get_mut(&cart)
            .is_some_and(|lines| lines.remove(&product).is_some());
        if removed {
            inner.bump_revision(cart);
        }
        Ok(removed)
    }

    async fn clear(&self, cart: CartId) -> Result<u64, RepositoryError> {
        self.check()?;
        let mut inner = self.inner.lock().await;
        let removed = inner.lines.remove(&cart).map_or(0, |lines| lines.len());
        if removed > 0 {
            inner.bump_revision(cart);
        }
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }
}

#[async_trait]
impl Catalog for MemoryStore {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        self.check()?;
        Ok(self.inner.lock().await.products.get(&id).cloned())
    }

    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError> {
        self.check()?;
        Ok(self.inner.lock().await.products.values().cloned().collect())
    }

    async fn create_product(&self, input: &NewProduct) -> Result<Product, RepositoryError> {
        self.check()?;
        let mut inner = self.inner.lock().await;
        let product = Product {
            id: ProductId::new(inner.next_id()),
            name: input.name.clone(),
            description: input.description.clone(),
            price: input.price,
            price_ref: input.price_ref.clone(),
            created_at: Utc::now(),
        };
        inner.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn update_product(
        &self,
        id: ProductId,
        input: &NewProduct,
    ) -> Result<Option<Product>, RepositoryError> {
        self.check()?;
        let mut inner = self.inner.lock().await;
        Ok(inner.products.get_mut(&id).map(|product| {
            product.name.clone_from(&input.name);
            product.description.clone_from(&input.description);
            product.price = input.price;
            product.price_ref = input.price_ref.clone();
            product.clone()
        }))
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        self.check()?;
        let mut inner = self.inner.lock().await;
        let existed = inner.products.remove(&id).is_some();
        if existed {
            // Mirror ON DELETE CASCADE
            inner.memberships.retain(|(_, p)| *p != id);
            for lines in inner.lines.values_mut() {
                lines.remove(&id);
            }
        }
        Ok(existed)
    }

    async fn get_collection(
        &self,
        id: CollectionId,
    ) -> Result<Option<Collection>, RepositoryError> {
        self.check()?;
        Ok(self.inner.lock().await.collections.get(&id).cloned())
    }

    async fn list_collections(&self) -> Result<Vec<Collection>, RepositoryError> {
        self.check()?;
        Ok(self.inner.lock().await.collections.values().cloned().collect())
    }

    async fn collection_products(
        &self,
        id: CollectionId,
    ) -> Result<Vec<Product>, RepositoryError> {
        self.check()?;
        let inner = self.inner.lock().await;
        Ok(inner
            .memberships
            .iter()
            .filter(|(c, _)| *c == id)
            .filter_map(|(_, p)| inner.products.get(p).cloned())
            .collect())
    }

    async fn create_collection(
        &self,
        input: &NewCollection,
    ) -> Result<Collection, RepositoryError> {
        self.check()?;
        let mut inner = self.inner.lock().await;
        let collection = Collection {
            id: CollectionId::new(inner.next_id()),
            name: input.name.clone(),
            description: input.description.clone(),
            created_at: Utc::now(),
        };
        inner.collections.insert(collection.id, collection.clone());
        Ok(collection)
    }

    async fn update_collection(
        &self,
        id: CollectionId,
        input: &NewCollection,
    ) -> Result<Option<Collection>, RepositoryError> {
        self.check()?;
        let mut inner = self.inner.lock().await;
        Ok(inner.collections.get_mut(&id).map(|collection| {
            collection.name.clone_from(&input.name);
            collection.description.clone_from(&input.description);
            collection.clone()
        }))
    }

    async fn delete_collection(&self, id: CollectionId) -> Result<bool, RepositoryError> {
        self.check()?;
        let mut inner = self.inner.lock().await;
        let existed = inner.collections.remove(&id).is_some();
        inner.memberships.retain(|(c, _)| *c != id);
        Ok(existed)
    }

    async fn add_to_collection(
        &self,
        collection: CollectionId,
        product: ProductId,
    ) -> Result<(), RepositoryError> {
        self.check()?;
        let mut inner = self.inner.lock().await;
        if !inner.collections.contains_key(&collection) || !inner.products.contains_key(&product)
        {
            return Err(RepositoryError::NotFound);
        }
        inner.memberships.insert((collection, product));
        Ok(())
    }

    async fn remove_from_collection(
        &self,
        collection: CollectionId,
        product: ProductId,
    ) -> Result<bool, RepositoryError> {
        self.check()?;
        Ok(self
            .inner
            .lock()
            .await
            .memberships
            .remove(&(collection, product)))
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        self.check()?;
        Ok(self
            .inner
            .lock()
            .await
            .users
            .get(&id)
            .map(|(user, _)| user.clone()))
    }

    async fn get_credentials_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        self.check()?;
        Ok(self
            .inner
            .lock()
            .await
            .users
            .values()
            .find(|(user, _)| user.email == *email)
            .cloned())
    }

    async fn create_user(
        &self,
        email: &Email,
        password_hash: &str,
        is_admin: bool,
    ) -> Result<User, RepositoryError> {
        self.check()?;
        let mut inner = self.inner.lock().await;
        if inner.users.values().any(|(user, _)| user.email == *email) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }
        let user = User {
            id: UserId::new(inner.next_id()),
            email: email.clone(),
            is_admin,
            created_at: Utc::now(),
        };
        inner
            .users
            .insert(user.id, (user.clone(), password_hash.to_owned()));
        Ok(user)
    }

    async fn set_admin(&self, id: UserId, is_admin: bool) -> Result<bool, RepositoryError> {
        self.check()?;
        let mut inner = self.inner.lock().await;
        Ok(inner
            .users
            .get_mut(&id)
            .map(|(user, _)| user.is_admin = is_admin)
            .is_some())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use dam_nation_core::{CurrencyCode, Price, PriceRef};

    use super::*;

    fn widget() -> NewProduct {
        NewProduct {
            name: "Widget".into(),
            description: String::new(),
            price: Price::from_cents(1000, CurrencyCode::USD),
            price_ref: PriceRef::parse("price_widget").unwrap(),
        }
    }

    #[tokio::test]
    async fn test_add_item_requires_cart_and_product() {
        let store = MemoryStore::new();
        let product = store.create_product(&widget()).await.unwrap();
        let cart = CartId::generate();

        let err = store
            .add_item(cart, product.id, Quantity::ONE)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));

        store.create_cart(cart).await.unwrap();
        let err = store
            .add_item(cart, ProductId::new(999), Quantity::ONE)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_delete_product_cascades_to_lines() {
        let store = MemoryStore::new();
        let product = store.create_product(&widget()).await.unwrap();
        let cart = store.create_cart(CartId::generate()).await.unwrap();
        store
            .add_item(cart.id, product.id, Quantity::ONE)
            .await
            .unwrap();

        assert!(store.delete_product(product.id).await.unwrap());
        assert!(store.list_items(cart.id).await.unwrap().is_empty());
    }

    async fn revision(store: &MemoryStore, cart: CartId) -> i64 {
        store.get_cart(cart).await.unwrap().unwrap().revision
    }

    #[tokio::test]
    async fn test_line_changes_advance_revision() {
        let store = MemoryStore::new();
        let product = store.create_product(&widget()).await.unwrap();
        let cart = store.create_cart(CartId::generate()).await.unwrap();
        assert_eq!(revision(&store, cart.id).await, 0);

        store.add_item(cart.id, product.id, Quantity::ONE).await.unwrap();
        assert_eq!(revision(&store, cart.id).await, 1);
        store
            .set_quantity(cart.id, product.id, Quantity::try_from(3_i64).unwrap())
            .await
            .unwrap();
        assert_eq!(revision(&store, cart.id).await, 2);
        store.clear(cart.id).await.unwrap();
        assert_eq!(revision(&store, cart.id).await, 3);

        // No-ops leave it alone
        store.clear(cart.id).await.unwrap();
        assert!(!store.remove_item(cart.id, product.id).await.unwrap());
        assert_eq!(revision(&store, cart.id).await, 3);
    }

    #[tokio::test]
    async fn test_unavailable_fails_every_call() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(store.ping().await.is_err());
        assert!(store.get_user(UserId::new(1)).await.is_err());
        store.set_unavailable(false);
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = MemoryStore::new();
        let email = Email::parse("a@shop.test").unwrap();
        store.create_user(&email, "hash", false).await.unwrap();
        let err = store.create_user(&email, "hash", true).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }
}
