//! Cart models.

use chrono::{DateTime, Utc};
use serde::Serialize;

use dam_nation_core::{CartId, Price, PriceRef, ProductId, Quantity};

/// A stored cart. Lines are read separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: CartId,
    /// Incremented by every add, update, remove, or clear that changes a line.
    #[serde(skip)]
    pub revision: i64,
    pub created_at: DateTime<Utc>,
}

/// A raw stored line: one product and how many of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product_id: ProductId,
    pub quantity: Quantity,
}

/// A line resolved against the catalog, as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub price: Price,
    pub price_ref: PriceRef,
    pub quantity: Quantity,
}
