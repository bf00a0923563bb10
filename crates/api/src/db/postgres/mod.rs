//! `PostgreSQL` implementation of the storage ports.
//!
//! Queries are checked at runtime (`query_as` with `FromRow` row structs) and
//! rows are converted into domain models through `TryFrom`, so a value that
//! violates a domain invariant surfaces as [`RepositoryError::DataCorruption`]
//! instead of a panic.

mod carts;
mod catalog;
mod users;

use sqlx::PgPool;

use super::RepositoryError;

/// SQLSTATE for `numeric_value_out_of_range`.
const NUMERIC_OUT_OF_RANGE: &str = "22003";

/// Store backed by a `PostgreSQL` pool. Cloning shares the pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Classify constraint failures from an insert or update.
fn map_write_error(e: sqlx::Error, conflict: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_foreign_key_violation() {
            return RepositoryError::NotFound;
        }
        if db_err.is_unique_violation() {
            return RepositoryError::Conflict(conflict.to_owned());
        }
        if db_err.code().as_deref() == Some(NUMERIC_OUT_OF_RANGE) {
            return RepositoryError::Conflict("quantity too large".to_owned());
        }
    }
    RepositoryError::Database(e)
}
