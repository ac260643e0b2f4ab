//! Customer handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::PaginatedResponse;
use uuid::Uuid;

use crate::error::AppResult;
use crate::handlers::ListQuery;
use crate::middleware::CurrentUser;
use crate::services::contact::{Contact, CreateContactInput, UpdateContactInput};
use crate::services::ContactService;
use crate::AppState;

/// List customers
pub async fn list_customers(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<PaginatedResponse<Contact>>> {
    let pagination = query.pagination(&state);
    let customers = ContactService::customers(state.db.clone())
        .list(user.user_id, query.search, pagination)
        .await?;
    Ok(Json(customers))
}

pub async fn get_customer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(customer_id): Path<Uuid>,
) -> AppResult<Json<Contact>> {
    let customer = ContactService::customers(state.db.clone())
        .get(user.user_id, customer_id)
        .await?;
    Ok(Json(customer))
}

pub async fn create_customer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CreateContactInput>,
) -> AppResult<(StatusCode, Json<Contact>)> {
    let customer = ContactService::customers(state.db.clone())
        .create(user.user_id, body)
        .await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn update_customer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(customer_id): Path<Uuid>,
    Json(body): Json<UpdateContactInput>,
) -> AppResult<Json<Contact>> {
    let customer = ContactService::customers(state.db.clone())
        .update(user.user_id, customer_id, body)
        .await?;
    Ok(Json(customer))
}

/// Delete a customer without sales
pub async fn delete_customer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(customer_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    ContactService::customers(state.db.clone())
        .delete(user.user_id, customer_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
