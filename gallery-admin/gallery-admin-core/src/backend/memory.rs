//! In-process backend holding every table, identity and object in memory.
//!
//! Used for local development and by the test suites. Behaves like the
//! hosted backend where it matters to callers: unique role emails, provider
//! conflicts on duplicate identities, update-by-filter that silently matches
//! nothing, newest-first log listing.

use crate::audit::{LogEntry, LogStore};
use crate::error::{IdentityError, StoreError};
use crate::gallery::{
    Folder, FolderOrder, GalleryStore, Image, NewImage, ObjectStorage, StoredObject,
};
use crate::identity::{IdentityProvider, IdentityUser, NewIdentity, Session};
use crate::roles::{Permission, Role, RoleRecord, RoleStore};
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use rand::RngCore;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

const PUBLIC_BASE: &str = "memory://images";

struct Account {
    user: IdentityUser,
    password_hash: String,
}

#[derive(Default)]
struct Inner {
    roles: Vec<RoleRecord>,
    logs: Vec<LogEntry>,
    accounts: HashMap<String, Account>,
    sessions: HashMap<String, String>,
    folders: BTreeMap<i64, Folder>,
    images: BTreeMap<i64, Image>,
    objects: BTreeMap<String, Bytes>,
    next_folder: i64,
    next_image: i64,
}

#[derive(Default)]
pub struct MemoryBackend {
    inner: RwLock<Inner>,
}

fn hash_password_blocking(password: &str) -> Result<String, IdentityError> {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    let salt = SaltString::encode_b64(&salt).map_err(|e| IdentityError::new(e.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| IdentityError::new(e.to_string()))
}

fn verify_password_blocking(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

// argon2 runs on the blocking pool, never under `inner`
async fn hash_password(password: &str) -> Result<String, IdentityError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hash_password_blocking(&password))
        .await
        .map_err(|e| IdentityError::new(e.to_string()))?
}

async fn verify_password(password: &str, hash: String) -> Result<bool, IdentityError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || verify_password_blocking(&password, &hash))
        .await
        .map_err(|e| IdentityError::new(e.to_string()))
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an identity together with a superadmin role record so a fresh
    /// instance has someone who can sign in and administer it.
    pub async fn seed_superadmin(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<IdentityUser, IdentityError> {
        let user = self
            .create_user(NewIdentity {
                email: email.to_string(),
                password: password.to_string(),
                name: name.to_string(),
            })
            .await?;
        self.insert_role(RoleRecord::new(
            email,
            name,
            Role::Superadmin,
            [Permission::Upload, Permission::Create, Permission::Delete],
        ))
        .await
        .map_err(|e| IdentityError::new(e.message))?;
        Ok(user)
    }

    /// Paths of every stored object, for assertions.
    pub async fn object_paths(&self) -> Vec<String> {
        self.inner.read().await.objects.keys().cloned().collect()
    }
}

#[async_trait]
impl RoleStore for MemoryBackend {
    async fn get_role(&self, email: &str) -> Result<Option<RoleRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.roles.iter().find(|r| r.user_email == email).cloned())
    }

    async fn list_roles(&self) -> Result<Vec<RoleRecord>, StoreError> {
        Ok(self.inner.read().await.roles.clone())
    }

    async fn insert_role(&self, record: RoleRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.roles.iter().any(|r| r.user_email == record.user_email) {
            return Err(StoreError::new(
                "duplicate key value violates unique constraint \"roles_user_email_key\"",
            ));
        }
        inner.roles.push(record);
        Ok(())
    }

    async fn update_role(
        &self,
        email: &str,
        role: Role,
        permissions: BTreeSet<Permission>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        for record in inner.roles.iter_mut().filter(|r| r.user_email == email) {
            record.user_role = role;
            record.user_permissions = permissions.clone();
        }
        Ok(())
    }
}

#[async_trait]
impl LogStore for MemoryBackend {
    async fn append_log(&self, entry: LogEntry) -> Result<(), StoreError> {
        self.inner.write().await.logs.push(entry);
        Ok(())
    }

    async fn list_logs(&self) -> Result<Vec<LogEntry>, StoreError> {
        let mut logs = self.inner.read().await.logs.clone();
        // insertion order breaks timestamp ties
        logs.reverse();
        logs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(logs)
    }
}

#[async_trait]
impl IdentityProvider for MemoryBackend {
    async fn create_user(&self, new: NewIdentity) -> Result<IdentityUser, IdentityError> {
        if new.email.trim().is_empty() || new.password.is_empty() {
            return Err(IdentityError::new("email and password are required"));
        }
        let password_hash = hash_password(&new.password).await?;
        let mut inner = self.inner.write().await;
        if inner
            .accounts
            .values()
            .any(|a| a.user.email.eq_ignore_ascii_case(&new.email))
        {
            return Err(IdentityError::new(
                "A user with this email address has already been registered",
            ));
        }
        let user = IdentityUser {
            id: Uuid::new_v4().to_string(),
            email: new.email,
            name: new.name,
        };
        inner.accounts.insert(
            user.id.clone(),
            Account {
                user: user.clone(),
                password_hash,
            },
        );
        Ok(user)
    }

    async fn delete_user(&self, id: &str) -> Result<(), IdentityError> {
        let mut inner = self.inner.write().await;
        if inner.accounts.remove(id).is_none() {
            return Err(IdentityError::new("User not found"));
        }
        inner.sessions.retain(|_, user_id| user_id != id);
        Ok(())
    }

    async fn update_user_password(&self, id: &str, password: &str) -> Result<(), IdentityError> {
        let password_hash = hash_password(password).await?;
        let mut inner = self.inner.write().await;
        let account = inner
            .accounts
            .get_mut(id)
            .ok_or_else(|| IdentityError::new("User not found"))?;
        account.password_hash = password_hash;
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<IdentityUser>, IdentityError> {
        let inner = self.inner.read().await;
        let mut users: Vec<IdentityUser> =
            inner.accounts.values().map(|a| a.user.clone()).collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    async fn current_user(&self, token: &str) -> Result<Option<IdentityUser>, IdentityError> {
        let inner = self.inner.read().await;
        Ok(inner
            .sessions
            .get(token)
            .and_then(|id| inner.accounts.get(id))
            .map(|a| a.user.clone()))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let invalid = || IdentityError::new("Invalid login credentials");
        let (user, password_hash) = {
            let inner = self.inner.read().await;
            inner
                .accounts
                .values()
                .find(|a| a.user.email.eq_ignore_ascii_case(email))
                .map(|a| (a.user.clone(), a.password_hash.clone()))
                .ok_or_else(invalid)?
        };
        if !verify_password(password, password_hash).await? {
            return Err(invalid());
        }

        let mut inner = self.inner.write().await;
        // deleted while the password was being checked
        if !inner.accounts.contains_key(&user.id) {
            return Err(invalid());
        }
        let access_token = Uuid::new_v4().to_string();
        inner.sessions.insert(access_token.clone(), user.id.clone());
        Ok(Session { access_token, user })
    }

    async fn sign_out(&self, token: &str) -> Result<(), IdentityError> {
        self.inner.write().await.sessions.remove(token);
        Ok(())
    }
}

#[async_trait]
impl GalleryStore for MemoryBackend {
    async fn list_folders(&self, order: FolderOrder) -> Result<Vec<Folder>, StoreError> {
        let mut folders: Vec<Folder> = self.inner.read().await.folders.values().cloned().collect();
        folders.sort_by(|a, b| match order {
            FolderOrder::Asc => a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)),
            FolderOrder::Desc => b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)),
        });
        Ok(folders)
    }

    async fn search_folders(&self, query: &str) -> Result<Vec<Folder>, StoreError> {
        let needle = query.to_lowercase();
        Ok(self
            .inner
            .read()
            .await
            .folders
            .values()
            .filter(|f| f.name.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn get_folder(&self, id: i64) -> Result<Option<Folder>, StoreError> {
        Ok(self.inner.read().await.folders.get(&id).cloned())
    }

    async fn insert_folder(
        &self,
        name: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Folder, StoreError> {
        let mut inner = self.inner.write().await;
        inner.next_folder += 1;
        let folder = Folder {
            id: inner.next_folder,
            name: name.to_string(),
            created_at,
        };
        inner.folders.insert(folder.id, folder.clone());
        Ok(folder)
    }

    async fn rename_folder(&self, id: i64, name: &str) -> Result<(), StoreError> {
        if let Some(folder) = self.inner.write().await.folders.get_mut(&id) {
            folder.name = name.to_string();
        }
        Ok(())
    }

    async fn delete_folder(&self, id: i64) -> Result<(), StoreError> {
        self.inner.write().await.folders.remove(&id);
        Ok(())
    }

    async fn list_images(&self, folder_id: i64) -> Result<Vec<Image>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .images
            .values()
            .filter(|i| i.folder_id == folder_id)
            .cloned()
            .collect())
    }

    async fn get_image(&self, id: i64) -> Result<Option<Image>, StoreError> {
        Ok(self.inner.read().await.images.get(&id).cloned())
    }

    async fn insert_image(&self, image: NewImage) -> Result<Image, StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.folders.contains_key(&image.folder_id) {
            return Err(StoreError::new(
                "insert or update on table \"images\" violates foreign key constraint",
            ));
        }
        inner.next_image += 1;
        let image = Image {
            id: inner.next_image,
            folder_id: image.folder_id,
            uri: image.uri,
            uploaded_at: image.uploaded_at,
        };
        inner.images.insert(image.id, image.clone());
        Ok(image)
    }

    async fn delete_image(&self, id: i64) -> Result<(), StoreError> {
        self.inner.write().await.images.remove(&id);
        Ok(())
    }

    async fn delete_folder_images(&self, folder_id: i64) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .images
            .retain(|_, image| image.folder_id != folder_id);
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for MemoryBackend {
    async fn upload(&self, path: &str, data: Bytes) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.objects.contains_key(path) {
            return Err(StoreError::new("The resource already exists"));
        }
        inner.objects.insert(path.to_string(), data);
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("{PUBLIC_BASE}/{path}")
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, StoreError> {
        let dir = format!("{}/", prefix.trim_end_matches('/'));
        Ok(self
            .inner
            .read()
            .await
            .objects
            .keys()
            .filter_map(|key| key.strip_prefix(&dir))
            .filter(|rest| !rest.contains('/'))
            .map(|name| StoredObject {
                name: name.to_string(),
            })
            .collect())
    }

    async fn remove(&self, paths: &[String]) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        for path in paths {
            inner.objects.remove(path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn duplicate_role_email_is_rejected() {
        let backend = MemoryBackend::new();
        let record = RoleRecord::new("a@example.com", "A", Role::User, []);
        backend.insert_role(record.clone()).await.unwrap();
        assert!(backend.insert_role(record).await.is_err());
        assert_eq!(backend.list_roles().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_of_unknown_email_matches_nothing() {
        let backend = MemoryBackend::new();
        backend
            .update_role("nobody@example.com", Role::Admin, BTreeSet::new())
            .await
            .unwrap();
        assert!(backend.list_roles().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sign_in_round_trip() {
        let backend = MemoryBackend::new();
        let user = backend
            .seed_superadmin("root@example.com", "hunter2", "Root")
            .await
            .unwrap();
        assert!(backend.sign_in("root@example.com", "wrong").await.is_err());

        let session = backend.sign_in("ROOT@example.com", "hunter2").await.unwrap();
        let current = backend.current_user(&session.access_token).await.unwrap();
        assert_eq!(current, Some(user));

        backend.sign_out(&session.access_token).await.unwrap();
        assert_eq!(backend.current_user(&session.access_token).await.unwrap(), None);
    }

    #[tokio::test]
    async fn deleting_user_ends_sessions() {
        let backend = MemoryBackend::new();
        let user = backend
            .seed_superadmin("root@example.com", "pw", "Root")
            .await
            .unwrap();
        let session = backend.sign_in("root@example.com", "pw").await.unwrap();
        backend.delete_user(&user.id).await.unwrap();
        assert_eq!(backend.current_user(&session.access_token).await.unwrap(), None);
        assert!(backend.delete_user(&user.id).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn sign_ins_do_not_hold_up_other_requests() {
        let backend = Arc::new(MemoryBackend::new());
        backend
            .seed_superadmin("root@example.com", "pw", "Root")
            .await
            .unwrap();
        let logins: Vec<_> = (0..8)
            .map(|_| {
                let backend = backend.clone();
                tokio::spawn(async move { backend.sign_in("root@example.com", "pw").await })
            })
            .collect();
        let roles = tokio::time::timeout(Duration::from_secs(5), backend.list_roles())
            .await
            .expect("read served during sign-ins")
            .unwrap();
        assert_eq!(roles.len(), 1);
        for login in logins {
            assert!(login.await.unwrap().is_ok());
        }
    }

    #[tokio::test]
    async fn object_listing_is_one_level_deep() {
        let backend = MemoryBackend::new();
        backend.upload("folder_1/a.png", Bytes::from_static(b"a")).await.unwrap();
        backend.upload("folder_1/b.png", Bytes::from_static(b"b")).await.unwrap();
        backend.upload("folder_12/c.png", Bytes::from_static(b"c")).await.unwrap();
        let names: Vec<String> = backend
            .list("folder_1")
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.name)
            .collect();
        assert_eq!(names, vec!["a.png", "b.png"]);
    }
}
