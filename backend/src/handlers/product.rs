//! Product handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::PaginatedResponse;
use uuid::Uuid;

use crate::error::AppResult;
use crate::handlers::ListQuery;
use crate::middleware::CurrentUser;
use crate::services::product::{CreateProductInput, Product, UpdateProductInput};
use crate::services::ProductService;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LowStockQuery {
    pub threshold: Option<Decimal>,
}

pub async fn list_products(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<PaginatedResponse<Product>>> {
    let pagination = query.pagination(&state);
    let products = ProductService::new(state.db.clone())
        .list(user.user_id, query.search, pagination)
        .await?;
    Ok(Json(products))
}

pub async fn get_product(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<Product>> {
    let product = ProductService::new(state.db.clone())
        .get(user.user_id, product_id)
        .await?;
    Ok(Json(product))
}

/// Create a product; stock starts at zero
pub async fn create_product(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CreateProductInput>,
) -> AppResult<(StatusCode, Json<Product>)> {
    let product = ProductService::new(state.db.clone())
        .create(user.user_id, body)
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(body): Json<UpdateProductInput>,
) -> AppResult<Json<Product>> {
    let product = ProductService::new(state.db.clone())
        .update(user.user_id, product_id, body)
        .await?;
    Ok(Json(product))
}

pub async fn delete_product(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    ProductService::new(state.db.clone())
        .delete(user.user_id, product_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Products running low on stock
pub async fn low_stock_products(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<LowStockQuery>,
) -> AppResult<Json<Vec<Product>>> {
    let products = ProductService::new(state.db.clone())
        .low_stock(user.user_id, query.threshold)
        .await?;
    Ok(Json(products))
}
