//! Admin panel handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::PaginatedResponse;
use uuid::Uuid;

use crate::error::AppResult;
use crate::handlers::auth::{LoginRequest, RefreshRequest};
use crate::handlers::ListQuery;
use crate::middleware::CurrentAdmin;
use crate::services::admin::{AdminAuthResponse, AdminProfile, ManagedUser, SetUserStatusInput};
use crate::services::token::AuthTokens;
use crate::services::AdminService;
use crate::AppState;

fn admin_service(state: &AppState) -> AdminService {
    AdminService::new(state.db.clone(), state.tokens.clone())
}

pub async fn admin_login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<AdminAuthResponse>> {
    let response = admin_service(&state).login(&body.email, &body.password).await?;
    Ok(Json(response))
}

pub async fn admin_refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> AppResult<Json<AuthTokens>> {
    let tokens = admin_service(&state).refresh(&body.refresh_token).await?;
    Ok(Json(tokens))
}

pub async fn admin_me(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
) -> AppResult<Json<AdminProfile>> {
    let profile = admin_service(&state).get_profile(admin.admin_id).await?;
    Ok(Json(profile))
}

/// List trader accounts with activity counts
pub async fn list_users(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<PaginatedResponse<ManagedUser>>> {
    let pagination = query.pagination(&state);
    let users = admin_service(&state).list_users(query.search, pagination).await?;
    Ok(Json(users))
}

pub async fn get_user(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<ManagedUser>> {
    let user = admin_service(&state).get_user(user_id).await?;
    Ok(Json(user))
}

/// Activate or deactivate a trader
pub async fn set_user_status(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(user_id): Path<Uuid>,
    Json(body): Json<SetUserStatusInput>,
) -> AppResult<Json<ManagedUser>> {
    let user = admin_service(&state)
        .set_user_status(admin.admin_id, user_id, body)
        .await?;
    Ok(Json(user))
}

/// Delete a trader and everything they recorded
pub async fn delete_user(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(user_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    admin_service(&state).delete_user(admin.admin_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
