//! Storage ports consumed by services and handlers.
//!
//! Every method is a single await point and a single atomic operation in the
//! backing store. Callers never read-modify-write cart lines themselves.

use async_trait::async_trait;

use dam_nation_core::{CartId, CollectionId, Email, ProductId, Quantity, UserId};

use super::RepositoryError;
use crate::models::{Cart, Collection, LineItem, NewCollection, NewProduct, Product, User};

/// Cart rows and their lines.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Cheap connectivity check for readiness.
    async fn ping(&self) -> Result<(), RepositoryError>;

    /// Insert a new, empty cart.
    async fn create_cart(&self, id: CartId) -> Result<Cart, RepositoryError>;

    async fn get_cart(&self, id: CartId) -> Result<Option<Cart>, RepositoryError>;

    /// Lines in ascending product id order.
    async fn list_items(&self, cart: CartId) -> Result<Vec<LineItem>, RepositoryError>;

    /// Insert the line or add `quantity` to the existing one, atomically.
    /// Returns the line as stored afterwards.
    ///
    /// # Errors
    ///
    /// `NotFound` if the cart or product does not exist, `Conflict` if the
    /// new total would overflow.
    async fn add_item(
        &self,
        cart: CartId,
        product: ProductId,
        quantity: Quantity,
    ) -> Result<LineItem, RepositoryError>;

    /// Overwrite the quantity of an existing line. `None` if there is no line.
    async fn set_quantity(
        &self,
        cart: CartId,
        product: ProductId,
        quantity: Quantity,
    ) -> Result<Option<LineItem>, RepositoryError>;

    /// Delete exactly one line. `false` if there was no line.
    async fn remove_item(&self, cart: CartId, product: ProductId) -> Result<bool, RepositoryError>;

    /// Delete every line. Returns how many were deleted.
    async fn clear(&self, cart: CartId) -> Result<u64, RepositoryError>;
}

/// Products and collections.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError>;

    async fn create_product(&self, input: &NewProduct) -> Result<Product, RepositoryError>;

    /// Replace a product's editable fields. `None` if it does not exist.
    async fn update_product(
        &self,
        id: ProductId,
        input: &NewProduct,
    ) -> Result<Option<Product>, RepositoryError>;

    /// `false` if the product did not exist.
    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError>;

    async fn get_collection(&self, id: CollectionId)
    -> Result<Option<Collection>, RepositoryError>;

    async fn list_collections(&self) -> Result<Vec<Collection>, RepositoryError>;

    async fn collection_products(&self, id: CollectionId)
    -> Result<Vec<Product>, RepositoryError>;

    async fn create_collection(&self, input: &NewCollection)
    -> Result<Collection, RepositoryError>;

    /// Replace a collection's name and description. `None` if it does not exist.
    async fn update_collection(
        &self,
        id: CollectionId,
        input: &NewCollection,
    ) -> Result<Option<Collection>, RepositoryError>;

    /// `false` if the collection did not exist.
    async fn delete_collection(&self, id: CollectionId) -> Result<bool, RepositoryError>;

    /// Idempotent. `NotFound` if either side does not exist.
    async fn add_to_collection(
        &self,
        collection: CollectionId,
        product: ProductId,
    ) -> Result<(), RepositoryError>;

    /// `false` if the product was not in the collection.
    async fn remove_from_collection(
        &self,
        collection: CollectionId,
        product: ProductId,
    ) -> Result<bool, RepositoryError>;
}

/// Login accounts.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    /// The user and their password hash.
    async fn get_credentials_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError>;

    /// # Errors
    ///
    /// `Conflict` if the email is already registered.
    async fn create_user(
        &self,
        email: &Email,
        password_hash: &str,
        is_admin: bool,
    ) -> Result<User, RepositoryError>;

    /// `false` if the user does not exist.
    async fn set_admin(&self, id: UserId, is_admin: bool) -> Result<bool, RepositoryError>;
}
