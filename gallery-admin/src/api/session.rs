use super::{extract::JsonBody, ApiError, AppState, AuthContext};
use axum::{extract::State, http::StatusCode, Json};
use gallery_admin_core::{
    identity::{Actor, Session},
    roles::RoleRecord,
};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Deserialize)]
pub(super) struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
pub(super) struct MeResponse {
    user: Actor,
    role: Option<RoleRecord>,
}

pub(super) async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Json<Session>, ApiError> {
    let session = state
        .services
        .identity
        .sign_in(req.email.trim(), &req.password)
        .await?;
    info!(user = %session.user.email, "signed in");
    Ok(Json(session))
}

pub(super) async fn logout(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<StatusCode, ApiError> {
    state.services.identity.sign_out(&auth.token).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn me(State(state): State<AppState>, auth: AuthContext) -> Json<MeResponse> {
    let role = state.services.checker.record(&auth.actor.email).await;
    Json(MeResponse {
        user: auth.actor,
        role,
    })
}
