//! Product and collection queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use dam_nation_core::{CollectionId, CurrencyCode, Price, PriceRef, ProductId};

use super::{PgStore, map_write_error};
use crate::db::{Catalog, RepositoryError};
use crate::models::{Collection, NewCollection, NewProduct, Product};

const PRODUCT_COLUMNS: &str = "id, name, description, price, currency, price_ref, created_at";

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    description: String,
    price: Decimal,
    currency: String,
    price_ref: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let currency = row.currency.parse::<CurrencyCode>().map_err(|e| {
            RepositoryError::DataCorruption(format!("product {}: {e}", row.id))
        })?;
        let price_ref = PriceRef::parse(&row.price_ref).map_err(|e| {
            RepositoryError::DataCorruption(format!("product {}: {e}", row.id))
        })?;

        Ok(Self {
            id: row.id,
            name: row.name,
            description: row.description,
            price: Price::new(row.price, currency),
            price_ref,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CollectionRow {
    id: CollectionId,
    name: String,
    description: String,
    created_at: DateTime<Utc>,
}

impl From<CollectionRow> for Collection {
    fn from(row: CollectionRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            created_at: row.created_at,
        }
    }
}

fn into_products(rows: Vec<ProductRow>) -> Result<Vec<Product>, RepositoryError> {
    rows.into_iter().map(Product::try_from).collect()
}

#[async_trait]
impl Catalog for PgStore {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM shop.product WHERE id = $1");
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Product::try_from).transpose()
    }

    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM shop.product ORDER BY id");
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        into_products(rows)
    }

    async fn create_product(&self, input: &NewProduct) -> Result<Product, RepositoryError> {
        let sql = format!(
            "INSERT INTO shop.product (name, description, price, currency, price_ref)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {PRODUCT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(&input.name)
            .bind(&input.description)
            .bind(input.price.amount)
            .bind(input.price.currency_code.as_str())
            .bind(input.price_ref.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_write_error(e, "product already exists"))?;

        row.try_into()
    }

    async fn update_product(
        &self,
        id: ProductId,
        input: &NewProduct,
    ) -> Result<Option<Product>, RepositoryError> {
        let sql = format!(
            "UPDATE shop.product
             SET name = $2, description = $3, price = $4, currency = $5, price_ref = $6
             WHERE id = $1
             RETURNING {PRODUCT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .bind(&input.name)
            .bind(&input.description)
            .bind(input.price.amount)
            .bind(input.price.currency_code.as_str())
            .bind(input.price_ref.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_write_error(e, "product already exists"))?;

        row.map(Product::try_from).transpose()
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.product WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_collection(
        &self,
        id: CollectionId,
    ) -> Result<Option<Collection>, RepositoryError> {
        let row = sqlx::query_as::<_, CollectionRow>(
            r"
            SELECT id, name, description, created_at
            FROM shop.collection
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Collection::from))
    }

    async fn list_collections(&self) -> Result<Vec<Collection>, RepositoryError> {
        let rows = sqlx::query_as::<_, CollectionRow>(
            r"
            SELECT id, name, description, created_at
            FROM shop.collection
            ORDER BY id
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Collection::from).collect())
    }

    async fn collection_products(
        &self,
        id: CollectionId,
    ) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT p.id, p.name, p.description, p.price, p.currency, p.price_ref, p.created_at
            FROM shop.product p
            JOIN shop.collection_product cp ON cp.product_id = p.id
            WHERE cp.collection_id = $1
            ORDER BY p.id
            ",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        into_products(rows)
    }

    async fn create_collection(
        &self,
        input: &NewCollection,
    ) -> Result<Collection, RepositoryError> {
        let row = sqlx::query_as::<_, CollectionRow>(
            r"
            INSERT INTO shop.collection (name, description)
            VALUES ($1, $2)
            RETURNING id, name, description, created_at
            ",
        )
        .bind(&input.name)
        .bind(&input.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "collection already exists"))?;

        Ok(row.into())
    }

    async fn update_collection(
        &self,
        id: CollectionId,
        input: &NewCollection,
    ) -> Result<Option<Collection>, RepositoryError> {
        let row = sqlx::query_as::<_, CollectionRow>(
            r"
            UPDATE shop.collection
            SET name = $2, description = $3
            WHERE id = $1
            RETURNING id, name, description, created_at
            ",
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.description)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Collection::from))
    }

    async fn delete_collection(&self, id: CollectionId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.collection WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn add_to_collection(
        &self,
        collection: CollectionId,
        product: ProductId,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO shop.collection_product (collection_id, product_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(collection)
        .bind(product)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "product already in collection"))?;

        Ok(())
    }

    async fn remove_from_collection(
        &self,
        collection: CollectionId,
        product: ProductId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM shop.collection_product
            WHERE collection_id = $1 AND product_id = $2
            ",
        )
        .bind(collection)
        .bind(product)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
