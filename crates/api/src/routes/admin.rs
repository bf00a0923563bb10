//! Admin portal handlers.
//!
//! All routes here sit behind the admin gate, which re-reads the caller's
//! admin flag on every request. Catalog writes go through the cached catalog
//! so cached products are refreshed or dropped immediately.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use dam_nation_core::{CollectionId, ProductId, UserId};

use crate::db::RepositoryError;
use crate::error::{AppError, Result};
use crate::middleware::CurrentAdmin;
use crate::models::{Collection, NewCollection, NewProduct, Product, User};
use crate::state::AppState;

/// Portal landing response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalResponse {
    pub user_id: UserId,
    pub product_count: usize,
    pub collection_count: usize,
}

/// Create-user request body.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub is_admin: bool,
}

/// Grant/revoke request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAdminRequest {
    pub is_admin: bool,
}

fn require_name(name: &str, what: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(AppError::InvalidArgument(format!("{what} name is required")));
    }
    Ok(())
}

#[instrument(skip(state, admin), fields(user_id = %admin.user_id))]
pub async fn portal(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
) -> Result<Json<PortalResponse>> {
    let catalog = state.catalog();
    Ok(Json(PortalResponse {
        user_id: admin.user_id,
        product_count: catalog.list_products().await?.len(),
        collection_count: catalog.list_collections().await?.len(),
    }))
}

/// Create a user. New users are not admins unless asked for explicitly.
#[instrument(skip(state, admin, body), fields(user_id = %admin.user_id))]
pub async fn create_user(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>)> {
    let user = state
        .auth_service()
        .register(&body.email, &body.password, body.is_admin)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, _admin))]
pub async fn get_user(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Path(id): Path<UserId>,
) -> Result<Json<User>> {
    Ok(Json(state.auth_service().get_user(id).await?))
}

/// Grant or revoke admin. Applies to the target's very next request.
#[instrument(skip(state, admin, body), fields(user_id = %admin.user_id, target = %id))]
pub async fn set_admin(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(id): Path<UserId>,
    Json(body): Json<SetAdminRequest>,
) -> Result<Json<User>> {
    let user = state.auth_service().set_admin(id, body.is_admin).await?;
    info!(granted_by = %admin.user_id, is_admin = user.is_admin, "Admin flag updated");
    Ok(Json(user))
}

#[instrument(skip(state, _admin, body))]
pub async fn create_product(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Json(body): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>)> {
    require_name(&body.name, "Product")?;
    let product = state.catalog().create_product(&body).await?;
    info!(product_id = %product.id, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// Edit a product in place. The id, and every cart line holding it, stay put.
#[instrument(skip(state, _admin, body))]
pub async fn update_product(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Path(id): Path<ProductId>,
    Json(body): Json<NewProduct>,
) -> Result<Json<Product>> {
    require_name(&body.name, "Product")?;
    let product = state
        .catalog()
        .update_product(id, &body)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_owned()))?;
    info!(product_id = %id, "Product updated");
    Ok(Json(product))
}

#[instrument(skip(state, _admin))]
pub async fn delete_product(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    if state.catalog().delete_product(id).await? {
        info!(product_id = %id, "Product deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("Product".to_owned()))
    }
}

#[instrument(skip(state, _admin, body))]
pub async fn create_collection(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Json(body): Json<NewCollection>,
) -> Result<(StatusCode, Json<Collection>)> {
    require_name(&body.name, "Collection")?;
    let collection = state.catalog().create_collection(&body).await?;
    Ok((StatusCode::CREATED, Json(collection)))
}

#[instrument(skip(state, _admin, body))]
pub async fn update_collection(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Path(id): Path<CollectionId>,
    Json(body): Json<NewCollection>,
) -> Result<Json<Collection>> {
    require_name(&body.name, "Collection")?;
    state
        .catalog()
        .update_collection(id, &body)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Collection".to_owned()))
}

#[instrument(skip(state, _admin))]
pub async fn delete_collection(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Path(id): Path<CollectionId>,
) -> Result<StatusCode> {
    if state.catalog().delete_collection(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("Collection".to_owned()))
    }
}

#[instrument(skip(state, _admin))]
pub async fn add_to_collection(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Path((id, product_id)): Path<(CollectionId, ProductId)>,
) -> Result<StatusCode> {
    match state.catalog().add_to_collection(id, product_id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(RepositoryError::NotFound) => {
            Err(AppError::NotFound("Collection or product".to_owned()))
        }
        Err(e) => Err(e.into()),
    }
}

#[instrument(skip(state, _admin))]
pub async fn remove_from_collection(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Path((id, product_id)): Path<(CollectionId, ProductId)>,
) -> Result<StatusCode> {
    if state.catalog().remove_from_collection(id, product_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("Collection product".to_owned()))
    }
}
