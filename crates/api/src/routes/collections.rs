//! Public collection handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use tracing::instrument;

use dam_nation_core::CollectionId;

use crate::error::{AppError, Result};
use crate::models::{Collection, Product};
use crate::state::AppState;

/// A collection with its member products.
#[derive(Debug, Serialize)]
pub struct CollectionDetail {
    #[serde(flatten)]
    pub collection: Collection,
    pub products: Vec<Product>,
}

#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> Result<Json<Vec<Collection>>> {
    Ok(Json(state.catalog().list_collections().await?))
}

#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<CollectionId>,
) -> Result<Json<CollectionDetail>> {
    let catalog = state.catalog();
    let collection = catalog
        .get_collection(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Collection".to_owned()))?;
    let products = catalog.collection_products(id).await?;
    Ok(Json(CollectionDetail {
        collection,
        products,
    }))
}
