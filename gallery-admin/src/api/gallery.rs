//! Folder and image routes. Mutations are gated on permission tokens only;
//! a role never grants them.

use super::{
    extract::{CanCreate, CanDelete, CanUpload, JsonBody, Permitted, UrlPath, UrlQuery},
    ApiError, AppState, AuthContext, MessageResponse,
};
use axum::{extract::State, http::StatusCode, Json};
use bytes::Bytes;
use gallery_admin_core::gallery::{Folder, FolderOrder, Image, Logged};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub(super) struct FolderParams {
    #[serde(default)]
    order: FolderOrder,
    q: Option<String>,
}

#[derive(Deserialize)]
pub(super) struct FolderName {
    name: String,
}

#[derive(Deserialize)]
pub(super) struct UploadParams {
    name: Option<String>,
}

#[derive(Serialize)]
pub(super) struct Mutated<T> {
    #[serde(flatten)]
    value: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

impl<T> From<Logged<T>> for Mutated<T> {
    fn from(logged: Logged<T>) -> Self {
        Self {
            value: logged.value,
            warning: logged.warning.map(|w| w.message),
        }
    }
}

pub(super) async fn list_folders(
    State(state): State<AppState>,
    _auth: AuthContext,
    UrlQuery(params): UrlQuery<FolderParams>,
) -> Result<Json<Vec<Folder>>, ApiError> {
    let gallery = &state.services.gallery;
    let folders = match params.q.as_deref().map(str::trim) {
        Some(q) if !q.is_empty() => gallery.search_folders(q).await?,
        _ => gallery.list_folders(params.order).await?,
    };
    Ok(Json(folders))
}

pub(super) async fn create_folder(
    State(state): State<AppState>,
    Permitted { auth, .. }: Permitted<CanCreate>,
    JsonBody(req): JsonBody<FolderName>,
) -> Result<(StatusCode, Json<Mutated<Folder>>), ApiError> {
    let created = state
        .services
        .gallery
        .create_folder(&auth.actor, &req.name)
        .await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

pub(super) async fn rename_folder(
    State(state): State<AppState>,
    Permitted { auth, .. }: Permitted<CanCreate>,
    UrlPath(id): UrlPath<i64>,
    JsonBody(req): JsonBody<FolderName>,
) -> Result<Json<Mutated<Folder>>, ApiError> {
    let renamed = state
        .services
        .gallery
        .rename_folder(&auth.actor, id, &req.name)
        .await?;
    Ok(Json(renamed.into()))
}

pub(super) async fn delete_folder(
    State(state): State<AppState>,
    Permitted { auth, .. }: Permitted<CanDelete>,
    UrlPath(id): UrlPath<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    let deleted = state.services.gallery.delete_folder(&auth.actor, id).await?;
    Ok(Json(MessageResponse::warned(
        "Folder deleted successfully",
        deleted.warning,
    )))
}

pub(super) async fn list_images(
    State(state): State<AppState>,
    _auth: AuthContext,
    UrlPath(id): UrlPath<i64>,
) -> Result<Json<Vec<Image>>, ApiError> {
    Ok(Json(state.services.gallery.list_images(id).await?))
}

pub(super) async fn upload_image(
    State(state): State<AppState>,
    Permitted { auth, .. }: Permitted<CanUpload>,
    UrlPath(id): UrlPath<i64>,
    UrlQuery(params): UrlQuery<UploadParams>,
    body: Bytes,
) -> Result<(StatusCode, Json<Mutated<Image>>), ApiError> {
    let name = params
        .name
        .ok_or_else(|| ApiError::BadRequest("missing ?name= for the upload".into()))?;
    if body.is_empty() {
        return Err(ApiError::BadRequest("upload body is empty".into()));
    }
    let uploaded = state
        .services
        .gallery
        .upload_image(&auth.actor, id, &name, body)
        .await?;
    Ok((StatusCode::CREATED, Json(uploaded.into())))
}

pub(super) async fn delete_image(
    State(state): State<AppState>,
    Permitted { auth, .. }: Permitted<CanDelete>,
    UrlPath(id): UrlPath<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    let deleted = state.services.gallery.delete_image(&auth.actor, id).await?;
    Ok(Json(MessageResponse::warned(
        "Image deleted successfully",
        deleted.warning,
    )))
}
