//! Cart and cart line queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use dam_nation_core::{CartId, ProductId, Quantity};

use super::{PgStore, map_write_error};
use crate::db::{CartStore, RepositoryError};
use crate::models::{Cart, LineItem};

#[derive(sqlx::FromRow)]
struct CartRow {
    id: CartId,
    revision: i64,
    created_at: DateTime<Utc>,
}

impl From<CartRow> for Cart {
    fn from(row: CartRow) -> Self {
        Self {
            id: row.id,
            revision: row.revision,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct LineRow {
    product_id: ProductId,
    quantity: i32,
}

impl TryFrom<LineRow> for LineItem {
    type Error = RepositoryError;

    fn try_from(row: LineRow) -> Result<Self, Self::Error> {
        let quantity = Quantity::try_from(row.quantity).map_err(|e| {
            RepositoryError::DataCorruption(format!(
                "invalid quantity for product {}: {e}",
                row.product_id
            ))
        })?;
        Ok(Self {
            product_id: row.product_id,
            quantity,
        })
    }
}

/// Lock the cart row and advance its revision. `false` if there is no cart.
///
/// Every line mutation runs this first inside its transaction, so writers to
/// one cart queue on the cart row and never deadlock on line rows.
async fn bump_revision(conn: &mut PgConnection, cart: CartId) -> Result<bool, RepositoryError> {
    let result = sqlx::query("UPDATE shop.cart SET revision = revision + 1 WHERE id = $1")
        .bind(cart)
        .execute(conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

#[async_trait]
impl CartStore for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn create_cart(&self, id: CartId) -> Result<Cart, RepositoryError> {
        let row = sqlx::query_as::<_, CartRow>(
            r"
            INSERT INTO shop.cart (id)
            VALUES ($1)
            RETURNING id, revision, created_at
            ",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "cart already exists"))?;

        Ok(row.into())
    }

    async fn get_cart(&self, id: CartId) -> Result<Option<Cart>, RepositoryError> {
        let row = sqlx::query_as::<_, CartRow>(
            r"
            SELECT id, revision, created_at
            FROM shop.cart
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Cart::from))
    }

    async fn list_items(&self, cart: CartId) -> Result<Vec<LineItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, LineRow>(
            r"
            SELECT product_id, quantity
            FROM shop.cart_item
            WHERE cart_id = $1
            ORDER BY product_id
            ",
        )
        .bind(cart)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LineItem::try_from).collect()
    }

    async fn add_item(
        &self,
        cart: CartId,
        product: ProductId,
        quantity: Quantity,
    ) -> Result<LineItem, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        if !bump_revision(&mut tx, cart).await? {
            return Err(RepositoryError::NotFound);
        }

        // The upsert applies each increment exactly once even without the
        // cart row lock above.
        let row = sqlx::query_as::<_, LineRow>(
            r"
            INSERT INTO shop.cart_item (cart_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (cart_id, product_id)
            DO UPDATE SET quantity = shop.cart_item.quantity + EXCLUDED.quantity
            RETURNING product_id, quantity
            ",
        )
        .bind(cart)
        .bind(product)
        .bind(i32::from(quantity))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, "line item already exists"))?;

        tx.commit().await?;
        row.try_into()
    }

    async fn set_quantity(
        &self,
        cart: CartId,
        product: ProductId,
        quantity: Quantity,
    ) -> Result<Option<LineItem>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        if !bump_revision(&mut tx, cart).await? {
            return Ok(None);
        }

        let row = sqlx::query_as::<_, LineRow>(
            r"
            UPDATE shop.cart_item
            SET quantity = $3
            WHERE cart_id = $1 AND product_id = $2
            RETURNING product_id, quantity
            ",
        )
        .bind(cart)
        .bind(product)
        .bind(i32::from(quantity))
        .fetch_optional(&mut *tx)
        .await?;

        // No line: dropping the transaction rolls the revision back
        if row.is_some() {
            tx.commit().await?;
        }
        row.map(LineItem::try_from).transpose()
    }

    async fn remove_item(&self, cart: CartId, product: ProductId) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        if !bump_revision(&mut tx, cart).await? {
            return Ok(false);
        }

        let result = sqlx::query(
            r"
            DELETE FROM shop.cart_item
            WHERE cart_id = $1 AND product_id = $2
            ",
        )
        .bind(cart)
        .bind(product)
        .execute(&mut *tx)
        .await?;

        let removed = result.rows_affected() > 0;
        if removed {
            tx.commit().await?;
        }
        Ok(removed)
    }

    async fn clear(&self, cart: CartId) -> Result<u64, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        if !bump_revision(&mut tx, cart).await? {
            return Ok(0);
        }

        let result = sqlx::query("DELETE FROM shop.cart_item WHERE cart_id = $1")
            .bind(cart)
            .execute(&mut *tx)
            .await?;

        let removed = result.rows_affected();
        if removed > 0 {
            tx.commit().await?;
        }
        Ok(removed)
    }
}
