//! Failure injection wrapper around [`MemoryBackend`].
//!
//! Every call is forwarded to the wrapped backend unless the matching
//! [`Fault`] has been injected, in which case it fails with a fixed message
//! and leaves the wrapped state untouched.

use super::memory::MemoryBackend;
use crate::audit::{LogEntry, LogStore};
use crate::error::{IdentityError, StoreError};
use crate::gallery::{
    Folder, FolderOrder, GalleryStore, Image, NewImage, ObjectStorage, StoredObject,
};
use crate::identity::{IdentityProvider, IdentityUser, NewIdentity, Session};
use crate::roles::{Permission, Role, RoleRecord, RoleStore};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Fault {
    RoleRead,
    RoleWrite,
    LogAppend,
    IdentityCreate,
    IdentityDelete,
    GalleryWrite,
    ObjectRemove,
}

pub struct FaultyBackend {
    inner: Arc<MemoryBackend>,
    faults: Mutex<HashSet<Fault>>,
}

impl FaultyBackend {
    pub fn new(inner: Arc<MemoryBackend>) -> Self {
        Self {
            inner,
            faults: Mutex::new(HashSet::new()),
        }
    }

    pub fn inject(&self, fault: Fault) {
        self.faults.lock().insert(fault);
    }

    pub fn clear(&self, fault: Fault) {
        self.faults.lock().remove(&fault);
    }

    pub fn inner(&self) -> &Arc<MemoryBackend> {
        &self.inner
    }

    fn store_check(&self, fault: Fault) -> Result<(), StoreError> {
        if self.faults.lock().contains(&fault) {
            Err(StoreError::new(format!("injected {fault:?} failure")))
        } else {
            Ok(())
        }
    }

    fn identity_check(&self, fault: Fault) -> Result<(), IdentityError> {
        self.store_check(fault)
            .map_err(|e| IdentityError::new(e.message))
    }
}

#[async_trait]
impl RoleStore for FaultyBackend {
    async fn get_role(&self, email: &str) -> Result<Option<RoleRecord>, StoreError> {
        self.store_check(Fault::RoleRead)?;
        self.inner.get_role(email).await
    }

    async fn list_roles(&self) -> Result<Vec<RoleRecord>, StoreError> {
        self.store_check(Fault::RoleRead)?;
        self.inner.list_roles().await
    }

    async fn insert_role(&self, record: RoleRecord) -> Result<(), StoreError> {
        self.store_check(Fault::RoleWrite)?;
        self.inner.insert_role(record).await
    }

    async fn update_role(
        &self,
        email: &str,
        role: Role,
        permissions: BTreeSet<Permission>,
    ) -> Result<(), StoreError> {
        self.store_check(Fault::RoleWrite)?;
        self.inner.update_role(email, role, permissions).await
    }
}

#[async_trait]
impl LogStore for FaultyBackend {
    async fn append_log(&self, entry: LogEntry) -> Result<(), StoreError> {
        self.store_check(Fault::LogAppend)?;
        self.inner.append_log(entry).await
    }

    async fn list_logs(&self) -> Result<Vec<LogEntry>, StoreError> {
        self.inner.list_logs().await
    }
}

#[async_trait]
impl IdentityProvider for FaultyBackend {
    async fn create_user(&self, new: NewIdentity) -> Result<IdentityUser, IdentityError> {
        self.identity_check(Fault::IdentityCreate)?;
        self.inner.create_user(new).await
    }

    async fn delete_user(&self, id: &str) -> Result<(), IdentityError> {
        self.identity_check(Fault::IdentityDelete)?;
        self.inner.delete_user(id).await
    }

    async fn update_user_password(&self, id: &str, password: &str) -> Result<(), IdentityError> {
        self.inner.update_user_password(id, password).await
    }

    async fn list_users(&self) -> Result<Vec<IdentityUser>, IdentityError> {
        self.inner.list_users().await
    }

    async fn current_user(&self, token: &str) -> Result<Option<IdentityUser>, IdentityError> {
        self.inner.current_user(token).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        self.inner.sign_in(email, password).await
    }

    async fn sign_out(&self, token: &str) -> Result<(), IdentityError> {
        self.inner.sign_out(token).await
    }
}

#[async_trait]
impl GalleryStore for FaultyBackend {
    async fn list_folders(&self, order: FolderOrder) -> Result<Vec<Folder>, StoreError> {
        self.inner.list_folders(order).await
    }

    async fn search_folders(&self, query: &str) -> Result<Vec<Folder>, StoreError> {
        self.inner.search_folders(query).await
    }

    async fn get_folder(&self, id: i64) -> Result<Option<Folder>, StoreError> {
        self.inner.get_folder(id).await
    }

    async fn insert_folder(
        &self,
        name: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Folder, StoreError> {
        self.store_check(Fault::GalleryWrite)?;
        self.inner.insert_folder(name, created_at).await
    }

    async fn rename_folder(&self, id: i64, name: &str) -> Result<(), StoreError> {
        self.store_check(Fault::GalleryWrite)?;
        self.inner.rename_folder(id, name).await
    }

    async fn delete_folder(&self, id: i64) -> Result<(), StoreError> {
        self.store_check(Fault::GalleryWrite)?;
        self.inner.delete_folder(id).await
    }

    async fn list_images(&self, folder_id: i64) -> Result<Vec<Image>, StoreError> {
        self.inner.list_images(folder_id).await
    }

    async fn get_image(&self, id: i64) -> Result<Option<Image>, StoreError> {
        self.inner.get_image(id).await
    }

    async fn insert_image(&self, image: NewImage) -> Result<Image, StoreError> {
        self.store_check(Fault::GalleryWrite)?;
        self.inner.insert_image(image).await
    }

    async fn delete_image(&self, id: i64) -> Result<(), StoreError> {
        self.store_check(Fault::GalleryWrite)?;
        self.inner.delete_image(id).await
    }

    async fn delete_folder_images(&self, folder_id: i64) -> Result<(), StoreError> {
        self.store_check(Fault::GalleryWrite)?;
        self.inner.delete_folder_images(folder_id).await
    }
}

#[async_trait]
impl ObjectStorage for FaultyBackend {
    async fn upload(&self, path: &str, data: Bytes) -> Result<(), StoreError> {
        self.inner.upload(path, data).await
    }

    fn public_url(&self, path: &str) -> String {
        self.inner.public_url(path)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, StoreError> {
        self.inner.list(prefix).await
    }

    async fn remove(&self, paths: &[String]) -> Result<(), StoreError> {
        self.store_check(Fault::ObjectRemove)?;
        self.inner.remove(paths).await
    }
}
