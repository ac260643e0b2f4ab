//! Provider handlers

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

/// List providers
pub async fn list_providers(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<PaginatedResponse<Contact>>> {
    let pagination = query.pagination(&state);
    let providers = ContactService::providers(state.db.clone())
        .list(user.user_id, query.search, pagination)
        .await?;
    Ok(Json(providers))
}

pub async fn get_provider(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(provider_id): Path<Uuid>,
) -> AppResult<Json<Contact>> {
    let provider = ContactService::providers(state.db.clone())
        .get(user.user_id, provider_id)
        .await?;
    Ok(Json(provider))
}

pub async fn create_provider(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CreateContactInput>,
) -> AppResult<(StatusCode, Json<Contact>)> {
    let provider = ContactService::providers(state.db.clone())
        .create(user.user_id, body)
        .await?;
    Ok((StatusCode::CREATED, Json(provider)))
}

pub async fn update_provider(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(provider_id): Path<Uuid>,
    Json(body): Json<UpdateContactInput>,
) -> AppResult<Json<Contact>> {
    let provider = ContactService::providers(state.db.clone())
        .update(user.user_id, provider_id, body)
        .await?;
    Ok(Json(provider))
}

/// Delete a provider without purchases
pub async fn delete_provider(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(provider_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    ContactService::providers(state.db.clone())
        .delete(user.user_id, provider_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
