//! Gate extractors and wrappers around axum's `Json`, `Path` and `Query`
//! whose rejections render as [`ApiError`].
//!
//! Gates only read request parts, so a handler that lists its gate first
//! refuses the caller before any body is parsed.

use super::{ApiError, AppState, AuthContext};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts, Path, Query, Request,
    },
    http::{request::Parts, StatusCode},
    Json,
};
use gallery_admin_core::roles::{Permission, Role};
use serde::de::DeserializeOwned;
use std::marker::PhantomData;

/// An authenticated caller whose role record says `superadmin`.
pub struct Superadmin(pub AuthContext);

impl FromRequestParts<AppState> for Superadmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = AuthContext::from_request_parts(parts, state).await?;
        state
            .services
            .checker
            .require_role(&auth.actor, Role::Superadmin)
            .await?;
        Ok(Self(auth))
    }
}

pub trait RequiredPermission {
    const PERMISSION: Permission;
}

pub struct CanUpload;
pub struct CanCreate;
pub struct CanDelete;

impl RequiredPermission for CanUpload {
    const PERMISSION: Permission = Permission::Upload;
}

impl RequiredPermission for CanCreate {
    const PERMISSION: Permission = Permission::Create;
}

impl RequiredPermission for CanDelete {
    const PERMISSION: Permission = Permission::Delete;
}

/// An authenticated caller holding the permission token `P` names.
pub struct Permitted<P> {
    pub auth: AuthContext,
    required: PhantomData<P>,
}

impl<P: RequiredPermission> FromRequestParts<AppState> for Permitted<P> {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = AuthContext::from_request_parts(parts, state).await?;
        state
            .services
            .checker
            .require_permission(&auth.actor, P::PERMISSION)
            .await?;
        Ok(Self {
            auth,
            required: PhantomData,
        })
    }
}

pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

pub struct UrlPath<T>(pub T);

impl<T, S> FromRequestParts<S> for UrlPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

pub struct UrlQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for UrlQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

// A body that parses but does not fit the type is still a bad request here.
fn rejected(status: StatusCode, message: String) -> ApiError {
    let status = if status == StatusCode::UNPROCESSABLE_ENTITY {
        StatusCode::BAD_REQUEST
    } else {
        status
    };
    ApiError::Rejected { status, message }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        rejected(rejection.status(), rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        rejected(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        rejected(rejection.status(), rejection.body_text())
    }
}
