//! Persistence for carts, catalog, and users.
//!
//! # Database
//!
//! All tables live in the `shop` schema:
//!
//! - `product` - Catalog entries with a display price and a payment provider price id
//! - `collection` / `collection_product` - Named product groups
//! - `app_user` - Login accounts and the admin flag
//! - `cart` / `cart_item` - Anonymous carts and their lines
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p dam-nation-cli -- migrate
//! ```
//!
//! Handlers and services never see a concrete store; they hold the
//! [`CartStore`], [`Catalog`], and [`UserDirectory`] traits from [`store`].

pub mod cache;
pub mod postgres;
pub mod store;

#[cfg(any(test, feature = "test-support"))]
pub mod memory;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use cache::CachedCatalog;
pub use postgres::PgStore;
pub use store::{CartStore, Catalog, UserDirectory};

#[cfg(any(test, feature = "test-support"))]
pub use memory::MemoryStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database query failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in database is invalid or corrupted.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// A referenced row does not exist.
    #[error("not found")]
    NotFound,

    /// Unique constraint violation.
    #[error("conflict: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
