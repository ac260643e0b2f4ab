//! Purchase handlers

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
use crate::services::purchase::{CreatePurchaseInput, Purchase, PurchaseFilter, PurchaseWithItems};
use crate::services::{PurchaseService, RecordPaymentInput};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PurchaseListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub provider_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// List purchases, filtered by provider and date range
pub async fn list_purchases(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<PurchaseListQuery>,
) -> AppResult<Json<PaginatedResponse<Purchase>>> {
    let pagination = page_params(&state, query.page, query.per_page);
    let filter = PurchaseFilter {
        provider_id: query.provider_id,
        from: query.from,
        to: query.to,
    };
    let purchases = PurchaseService::new(state.db.clone())
        .list(user.user_id, filter, pagination)
        .await?;
    Ok(Json(purchases))
}

pub async fn get_purchase(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(purchase_id): Path<Uuid>,
) -> AppResult<Json<PurchaseWithItems>> {
    let purchase = PurchaseService::new(state.db.clone())
        .get(user.user_id, purchase_id)
        .await?;
    Ok(Json(purchase))
}

/// Record a purchase and add its goods to stock
pub async fn create_purchase(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CreatePurchaseInput>,
) -> AppResult<(StatusCode, Json<PurchaseWithItems>)> {
    let purchase = PurchaseService::new(state.db.clone())
        .create(user.user_id, body)
        .await?;
    Ok((StatusCode::CREATED, Json(purchase)))
}

/// Delete a purchase; rejected when its goods were already sold
pub async fn delete_purchase(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(purchase_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    PurchaseService::new(state.db.clone())
        .delete(user.user_id, purchase_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn record_purchase_payment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(purchase_id): Path<Uuid>,
    Json(body): Json<RecordPaymentInput>,
) -> AppResult<Json<Purchase>> {
    let purchase = PurchaseService::new(state.db.clone())
        .record_payment(user.user_id, purchase_id, body)
        .await?;
    Ok(Json(purchase))
}
