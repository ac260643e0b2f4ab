//! Sale handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use shared::PaginatedResponse;
use uuid::Uuid;

use crate::error::AppResult;
use crate::handlers::page_params;
use crate::middleware::CurrentUser;
use crate::services::sale::{CreateSaleInput, Sale, SaleFilter, SaleWithItems};
use crate::services::{RecordPaymentInput, SaleService};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SaleListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub customer_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// List sales, filtered by customer and date range
pub async fn list_sales(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<SaleListQuery>,
) -> AppResult<Json<PaginatedResponse<Sale>>> {
    let pagination = page_params(&state, query.page, query.per_page);
    let filter = SaleFilter {
        customer_id: query.customer_id,
        from: query.from,
        to: query.to,
    };
    let sales = SaleService::new(state.db.clone())
        .list(user.user_id, filter, pagination)
        .await?;
    Ok(Json(sales))
}

pub async fn get_sale(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(sale_id): Path<Uuid>,
) -> AppResult<Json<SaleWithItems>> {
    let sale = SaleService::new(state.db.clone())
        .get(user.user_id, sale_id)
        .await?;
    Ok(Json(sale))
}

/// Record a sale and take its goods out of stock
pub async fn create_sale(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CreateSaleInput>,
) -> AppResult<(StatusCode, Json<SaleWithItems>)> {
    let sale = SaleService::new(state.db.clone())
        .create(user.user_id, body)
        .await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

/// Delete a sale and restore its stock
pub async fn delete_sale(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(sale_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    SaleService::new(state.db.clone())
        .delete(user.user_id, sale_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn record_sale_payment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(sale_id): Path<Uuid>,
    Json(body): Json<RecordPaymentInput>,
) -> AppResult<Json<Sale>> {
    let sale = SaleService::new(state.db.clone())
        .record_payment(user.user_id, sale_id, body)
        .await?;
    Ok(Json(sale))
}
