//! HTTP API: session resolution, role and permission gates, JSON errors.

mod admin;
mod extract;
mod gallery;
mod logs;
mod session;

use axum::{
    extract::{DefaultBodyLimit, FromRequestParts},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use gallery_admin_core::{
    admin::AdminError,
    error::{AccessError, IdentityError, LogError, StoreError},
    gallery::GalleryError,
    identity::Actor,
    Services,
};
use serde::Serialize;
use thiserror::Error;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

/// Largest accepted image upload.
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub services: Services,
}

impl AppState {
    pub fn new(services: Services) -> Self {
        Self { services }
    }
}

/// The signed-in caller, resolved from `Authorization: Bearer <token>`.
#[derive(Clone, Debug)]
pub struct AuthContext {
    pub actor: Actor,
    pub token: String,
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AccessError::Unauthenticated)?;

        match state.services.identity.current_user(token).await {
            Ok(Some(user)) => Ok(Self {
                actor: user.into(),
                token: token.to_string(),
            }),
            Ok(None) => Err(AccessError::Unauthenticated.into()),
            Err(err) => {
                warn!(error = %err, "session lookup failed");
                Err(AccessError::Unauthenticated.into())
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Admin(#[from] AdminError),
    #[error(transparent)]
    Gallery(#[from] GalleryError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    BadRequest(String),
    /// An unreadable body, path or query string.
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Rejected { status, .. } => *status,
            ApiError::Access(AccessError::Unauthenticated) => StatusCode::UNAUTHORIZED,
            ApiError::Access(AccessError::Forbidden(_)) => StatusCode::FORBIDDEN,
            ApiError::Gallery(GalleryError::NotFound(_)) => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Collaborator messages are passed through verbatim.
    fn message(&self) -> String {
        match self {
            ApiError::Identity(err) | ApiError::Admin(AdminError::Identity(err)) => {
                err.message.clone()
            }
            ApiError::Store(err) | ApiError::Admin(AdminError::Store(err)) => err.message.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if !matches!(self, ApiError::Access(_)) {
            warn!(%status, error = %self, "request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.message(),
            }),
        )
            .into_response()
    }
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

impl MessageResponse {
    fn new(message: &'static str) -> Self {
        Self {
            message,
            warning: None,
        }
    }

    fn warned(message: &'static str, warning: Option<LogError>) -> Self {
        Self {
            message,
            warning: warning.map(|w| w.message),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/auth/login", post(session::login))
        .route("/api/auth/logout", post(session::logout))
        .route("/api/me", get(session::me))
        .route(
            "/api/admin-roles",
            get(admin::list_roles).put(admin::update_role),
        )
        .route(
            "/api/admin-users",
            get(admin::list_users)
                .post(admin::create_user)
                .put(admin::update_password)
                .delete(admin::delete_user),
        )
        .route("/api/logs", get(logs::query_logs))
        .route(
            "/api/folders",
            get(gallery::list_folders).post(gallery::create_folder),
        )
        .route(
            "/api/folders/{id}",
            put(gallery::rename_folder).delete(gallery::delete_folder),
        )
        .route(
            "/api/folders/{id}/images",
            get(gallery::list_images).post(gallery::upload_image),
        )
        .route("/api/images/{id}", delete(gallery::delete_image))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_statuses() {
        assert_eq!(
            ApiError::from(AccessError::Unauthenticated).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(AccessError::Forbidden("x".into())).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(GalleryError::NotFound("folder 1".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(GalleryError::InvalidInput("blank".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(StoreError::new("boom")).status(),
            StatusCode::BAD_REQUEST
        );
        let too_big = ApiError::Rejected {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            message: "Failed to buffer the request body".into(),
        };
        assert_eq!(too_big.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(too_big.message(), "Failed to buffer the request body");
    }
}
