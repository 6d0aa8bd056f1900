//! Folder and image management over the relational store and object storage.
//!
//! Gates are applied by the caller; these operations take the actor only to
//! attribute their audit entries.

use crate::audit::ActionLogger;
use crate::error::{LogError, StoreError};
use crate::identity::Actor;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Bucket holding every uploaded image.
pub const IMAGE_BUCKET: &str = "images";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Folder {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Image {
    pub id: i64,
    pub folder_id: i64,
    pub uri: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewImage {
    pub folder_id: i64,
    pub uri: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Ordering of the folder listing by `created_at`.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FolderOrder {
    Asc,
    #[default]
    Desc,
}

/// An entry returned by [`ObjectStorage::list`]. `name` is relative to the prefix.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct StoredObject {
    pub name: String,
}

/// Access to the `folders` and `images` tables.
#[async_trait]
pub trait GalleryStore: Send + Sync {
    async fn list_folders(&self, order: FolderOrder) -> Result<Vec<Folder>, StoreError>;
    /// Case-insensitive substring match on the folder name.
    async fn search_folders(&self, query: &str) -> Result<Vec<Folder>, StoreError>;
    async fn get_folder(&self, id: i64) -> Result<Option<Folder>, StoreError>;
    async fn insert_folder(
        &self,
        name: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Folder, StoreError>;
    async fn rename_folder(&self, id: i64, name: &str) -> Result<(), StoreError>;
    async fn delete_folder(&self, id: i64) -> Result<(), StoreError>;
    async fn list_images(&self, folder_id: i64) -> Result<Vec<Image>, StoreError>;
    async fn get_image(&self, id: i64) -> Result<Option<Image>, StoreError>;
    async fn insert_image(&self, image: NewImage) -> Result<Image, StoreError>;
    async fn delete_image(&self, id: i64) -> Result<(), StoreError>;
    async fn delete_folder_images(&self, folder_id: i64) -> Result<(), StoreError>;
}

/// Object storage scoped to a single bucket.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(&self, path: &str, data: Bytes) -> Result<(), StoreError>;
    fn public_url(&self, path: &str) -> String;
    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, StoreError>;
    async fn remove(&self, paths: &[String]) -> Result<(), StoreError>;
}

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A completed mutation plus the audit warning, if the log append failed.
#[derive(Debug)]
pub struct Logged<T> {
    pub value: T,
    pub warning: Option<LogError>,
}

impl<T> Logged<T> {
    fn new(value: T, logged: Result<crate::audit::LogEntry, LogError>) -> Self {
        Self {
            value,
            warning: logged.err(),
        }
    }
}

pub fn folder_prefix(folder_id: i64) -> String {
    format!("folder_{folder_id}")
}

/// Recover the bucket-relative object path from a public image URI: its
/// last two path segments, `folder_{id}/{file}`.
pub fn object_path_from_uri(uri: &str) -> Option<String> {
    let mut segments = uri.trim_end_matches('/').rsplit('/');
    let file = segments.next().filter(|s| !s.is_empty())?;
    let folder = segments.next().filter(|s| !s.is_empty())?;
    Some(format!("{folder}/{file}"))
}

fn require_name(name: &str) -> Result<&str, GalleryError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        Err(GalleryError::InvalidInput("name must not be blank".into()))
    } else {
        Ok(trimmed)
    }
}

#[derive(Clone)]
pub struct GalleryService {
    store: Arc<dyn GalleryStore>,
    objects: Arc<dyn ObjectStorage>,
    logger: ActionLogger,
}

impl GalleryService {
    pub fn new(
        store: Arc<dyn GalleryStore>,
        objects: Arc<dyn ObjectStorage>,
        logger: ActionLogger,
    ) -> Self {
        Self {
            store,
            objects,
            logger,
        }
    }

    pub async fn list_folders(&self, order: FolderOrder) -> Result<Vec<Folder>, GalleryError> {
        Ok(self.store.list_folders(order).await?)
    }

    pub async fn search_folders(&self, query: &str) -> Result<Vec<Folder>, GalleryError> {
        Ok(self.store.search_folders(query.trim()).await?)
    }

    async fn folder(&self, id: i64) -> Result<Folder, GalleryError> {
        self.store
            .get_folder(id)
            .await?
            .ok_or_else(|| GalleryError::NotFound(format!("folder {id}")))
    }

    pub async fn create_folder(
        &self,
        actor: &Actor,
        name: &str,
    ) -> Result<Logged<Folder>, GalleryError> {
        let name = require_name(name)?;
        let folder = self.store.insert_folder(name, Utc::now()).await?;
        info!(folder = folder.id, %name, "folder created");
        let logged = self
            .logger
            .record(format!("Created folder {name}"), actor)
            .await;
        Ok(Logged::new(folder, logged))
    }

    pub async fn rename_folder(
        &self,
        actor: &Actor,
        id: i64,
        name: &str,
    ) -> Result<Logged<Folder>, GalleryError> {
        let name = require_name(name)?;
        let mut folder = self.folder(id).await?;
        self.store.rename_folder(id, name).await?;
        folder.name = name.to_string();
        let logged = self
            .logger
            .record(format!("Renamed folder {id} to {name}"), actor)
            .await;
        Ok(Logged::new(folder, logged))
    }

    /// Removes stored objects, then image rows, then the folder row.
    pub async fn delete_folder(&self, actor: &Actor, id: i64) -> Result<Logged<()>, GalleryError> {
        self.folder(id).await?;
        let prefix = folder_prefix(id);
        let paths: Vec<String> = self
            .objects
            .list(&prefix)
            .await?
            .into_iter()
            .map(|object| format!("{prefix}/{}", object.name))
            .collect();
        if !paths.is_empty() {
            self.objects.remove(&paths).await?;
        }
        self.store.delete_folder_images(id).await?;
        self.store.delete_folder(id).await?;
        info!(folder = id, objects = paths.len(), "folder deleted");
        let logged = self.logger.record(format!("Deleted folder {id}"), actor).await;
        Ok(Logged::new((), logged))
    }

    pub async fn list_images(&self, folder_id: i64) -> Result<Vec<Image>, GalleryError> {
        Ok(self.store.list_images(folder_id).await?)
    }

    pub async fn upload_image(
        &self,
        actor: &Actor,
        folder_id: i64,
        file_name: &str,
        data: Bytes,
    ) -> Result<Logged<Image>, GalleryError> {
        let file_name = require_name(file_name)?;
        if file_name.contains('/') {
            return Err(GalleryError::InvalidInput(
                "file name must not contain '/'".into(),
            ));
        }
        self.folder(folder_id).await?;
        let path = format!(
            "{}/{}_{}",
            folder_prefix(folder_id),
            Utc::now().timestamp_millis(),
            file_name
        );
        self.objects.upload(&path, data).await?;
        let uri = self.objects.public_url(&path);
        let image = self
            .store
            .insert_image(NewImage {
                folder_id,
                uri,
                uploaded_at: Utc::now(),
            })
            .await?;
        let logged = self
            .logger
            .record(format!("Uploaded image {file_name} to folder {folder_id}"), actor)
            .await;
        Ok(Logged::new(image, logged))
    }

    /// Removes the stored object first; a storage failure leaves the row alone.
    pub async fn delete_image(&self, actor: &Actor, id: i64) -> Result<Logged<()>, GalleryError> {
        let image = self
            .store
            .get_image(id)
            .await?
            .ok_or_else(|| GalleryError::NotFound(format!("image {id}")))?;
        match object_path_from_uri(&image.uri) {
            Some(path) => self.objects.remove(&[path]).await?,
            None => warn!(image = id, uri = %image.uri, "image uri has no object path"),
        }
        self.store.delete_image(id).await?;
        let logged = self.logger.record(format!("Deleted image {id}"), actor).await;
        Ok(Logged::new((), logged))
    }
}
