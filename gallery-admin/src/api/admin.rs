//! User and role administration. Every route here is superadmin-only.

use super::{
    extract::{JsonBody, Superadmin},
    ApiError, AppState, MessageResponse,
};
use axum::{extract::State, http::StatusCode, Json};
use gallery_admin_core::{
    admin::CreateUser,
    identity::IdentityUser,
    roles::{Permission, Role, RoleRecord},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Serialize)]
pub(super) struct RolesResponse {
    roles: Vec<RoleRecord>,
}

#[derive(Serialize)]
pub(super) struct UsersResponse {
    users: Vec<IdentityUser>,
}

#[derive(Deserialize)]
pub(super) struct RoleUpdate {
    #[serde(alias = "email")]
    user_email: String,
    #[serde(alias = "role")]
    user_role: Role,
    #[serde(default, alias = "permissions")]
    user_permissions: BTreeSet<Permission>,
}

#[derive(Serialize)]
pub(super) struct CreatedResponse {
    user: IdentityUser,
    role: RoleRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PasswordUpdate {
    user_id: String,
    password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct UserRef {
    user_id: String,
}

pub(super) async fn list_roles(
    State(state): State<AppState>,
    _admin: Superadmin,
) -> Result<Json<RolesResponse>, ApiError> {
    let roles = state.services.admin.list_roles().await?;
    Ok(Json(RolesResponse { roles }))
}

pub(super) async fn update_role(
    State(state): State<AppState>,
    _admin: Superadmin,
    JsonBody(req): JsonBody<RoleUpdate>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .services
        .admin
        .update_role(&req.user_email, req.user_role, req.user_permissions)
        .await?;
    Ok(Json(MessageResponse::new("Role updated successfully")))
}

pub(super) async fn list_users(
    State(state): State<AppState>,
    _admin: Superadmin,
) -> Result<Json<UsersResponse>, ApiError> {
    let users = state.services.admin.list_users().await?;
    Ok(Json(UsersResponse { users }))
}

pub(super) async fn create_user(
    State(state): State<AppState>,
    Superadmin(auth): Superadmin,
    JsonBody(req): JsonBody<CreateUser>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let created = state.services.admin.create_user(&auth.actor, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            user: created.user,
            role: created.role,
            warning: created.warning.map(|w| w.message),
        }),
    ))
}

pub(super) async fn update_password(
    State(state): State<AppState>,
    _admin: Superadmin,
    JsonBody(req): JsonBody<PasswordUpdate>,
) -> Result<Json<MessageResponse>, ApiError> {
    if req.password.is_empty() {
        return Err(ApiError::BadRequest("password must not be empty".into()));
    }
    state
        .services
        .admin
        .update_user_password(&req.user_id, &req.password)
        .await?;
    Ok(Json(MessageResponse::new("Password updated successfully")))
}

pub(super) async fn delete_user(
    State(state): State<AppState>,
    _admin: Superadmin,
    JsonBody(req): JsonBody<UserRef>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.services.admin.delete_user(&req.user_id).await?;
    Ok(Json(MessageResponse::new("User deleted successfully")))
}
