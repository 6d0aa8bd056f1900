//! Client for the hosted backend-as-a-service.
//!
//! Tables go through the REST gateway under `/rest/v1`, identities through
//! the auth admin API under `/auth/v1`. Both are called with the service key.

use crate::audit::{LogEntry, LogStore};
use crate::auth::{Claims, Hs256Verifier, TokenVerifier, UserMetadata};
use crate::error::{IdentityError, StoreError};
use crate::gallery::{Folder, FolderOrder, GalleryStore, Image, NewImage};
use crate::identity::{IdentityProvider, IdentityUser, NewIdentity, Session};
use crate::roles::{Permission, Role, RoleRecord, RoleStore};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct HostedConfig {
    pub url: String,
    pub service_key: String,
    /// When set, session tokens are verified locally instead of via `/auth/v1/user`.
    pub jwt_secret: Option<String>,
    pub request_timeout: Duration,
}

pub struct HostedBackend {
    client: Client,
    base: String,
    service_key: String,
    verifier: Option<Hs256Verifier>,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct RemoteUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: UserMetadata,
}

impl From<RemoteUser> for IdentityUser {
    fn from(user: RemoteUser) -> Self {
        IdentityUser {
            id: user.id,
            email: user.email.unwrap_or_default(),
            name: user.user_metadata.name.unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
struct UserList {
    users: Vec<RemoteUser>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    user: RemoteUser,
}

#[derive(Serialize)]
struct RoleUpdate {
    user_role: Role,
    user_permissions: BTreeSet<Permission>,
}

/// Pull the most specific message out of an error response.
async fn failure_message(resp: Response) -> String {
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(|b| b.message.or(b.msg).or(b.error_description).or(b.error))
        .unwrap_or_else(|| {
            if text.is_empty() {
                status.to_string()
            } else {
                text
            }
        })
}

async fn send(req: RequestBuilder) -> std::result::Result<Response, String> {
    let resp = req.send().await.map_err(|e| e.to_string())?;
    if resp.status().is_success() {
        Ok(resp)
    } else {
        Err(failure_message(resp).await)
    }
}

async fn fetch<T: DeserializeOwned>(req: RequestBuilder) -> std::result::Result<T, String> {
    send(req).await?.json::<T>().await.map_err(|e| e.to_string())
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

impl HostedBackend {
    pub fn new(config: HostedConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("apikey", HeaderValue::from_str(&config.service_key)?);
        let client = Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            base: config.url.trim_end_matches('/').to_string(),
            service_key: config.service_key,
            verifier: config.jwt_secret.as_deref().map(Hs256Verifier::new),
        })
    }

    fn table(&self, name: &str) -> String {
        format!("{}/rest/v1/{name}", self.base)
    }

    fn auth(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base)
    }

    fn rest_get(&self, table: &str) -> RequestBuilder {
        self.client
            .get(self.table(table))
            .bearer_auth(&self.service_key)
            .query(&[("select", "*")])
    }

    fn rest_insert(&self, table: &str, returning: bool) -> RequestBuilder {
        let prefer = if returning {
            "return=representation"
        } else {
            "return=minimal"
        };
        self.client
            .post(self.table(table))
            .bearer_auth(&self.service_key)
            .header("Prefer", prefer)
    }

    fn rest_patch(&self, table: &str) -> RequestBuilder {
        self.client
            .patch(self.table(table))
            .bearer_auth(&self.service_key)
    }

    fn rest_delete(&self, table: &str) -> RequestBuilder {
        self.client
            .delete(self.table(table))
            .bearer_auth(&self.service_key)
    }

    fn admin(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.auth(path))
            .bearer_auth(&self.service_key)
    }

    async fn first_row<T: DeserializeOwned>(req: RequestBuilder) -> Result<Option<T>, StoreError> {
        let mut rows: Vec<T> = fetch(req).await.map_err(StoreError::new)?;
        Ok(if rows.is_empty() { None } else { Some(rows.swap_remove(0)) })
    }
}

#[async_trait]
impl RoleStore for HostedBackend {
    async fn get_role(&self, email: &str) -> Result<Option<RoleRecord>, StoreError> {
        Self::first_row(self.rest_get("roles").query(&[("user_email", eq(email))])).await
    }

    async fn list_roles(&self) -> Result<Vec<RoleRecord>, StoreError> {
        fetch(self.rest_get("roles")).await.map_err(StoreError::new)
    }

    async fn insert_role(&self, record: RoleRecord) -> Result<(), StoreError> {
        send(self.rest_insert("roles", false).json(&[record]))
            .await
            .map(|_| ())
            .map_err(StoreError::new)
    }

    async fn update_role(
        &self,
        email: &str,
        role: Role,
        permissions: BTreeSet<Permission>,
    ) -> Result<(), StoreError> {
        let body = RoleUpdate {
            user_role: role,
            user_permissions: permissions,
        };
        send(
            self.rest_patch("roles")
                .query(&[("user_email", eq(email))])
                .json(&body),
        )
        .await
        .map(|_| ())
        .map_err(StoreError::new)
    }
}

#[async_trait]
impl LogStore for HostedBackend {
    async fn append_log(&self, entry: LogEntry) -> Result<(), StoreError> {
        send(self.rest_insert("logs", false).json(&[entry]))
            .await
            .map(|_| ())
            .map_err(StoreError::new)
    }

    async fn list_logs(&self) -> Result<Vec<LogEntry>, StoreError> {
        fetch(self.rest_get("logs").query(&[("order", "created_at.desc")]))
            .await
            .map_err(StoreError::new)
    }
}

#[async_trait]
impl IdentityProvider for HostedBackend {
    async fn create_user(&self, new: NewIdentity) -> Result<IdentityUser, IdentityError> {
        let body = json!({
            "email": new.email,
            "password": new.password,
            "email_confirm": true,
            "user_metadata": { "name": new.name },
        });
        fetch::<RemoteUser>(self.admin(reqwest::Method::POST, "admin/users").json(&body))
            .await
            .map(IdentityUser::from)
            .map_err(IdentityError::new)
    }

    async fn delete_user(&self, id: &str) -> Result<(), IdentityError> {
        send(self.admin(reqwest::Method::DELETE, &format!("admin/users/{id}")))
            .await
            .map(|_| ())
            .map_err(IdentityError::new)
    }

    async fn update_user_password(&self, id: &str, password: &str) -> Result<(), IdentityError> {
        send(
            self.admin(reqwest::Method::PUT, &format!("admin/users/{id}"))
                .json(&json!({ "password": password })),
        )
        .await
        .map(|_| ())
        .map_err(IdentityError::new)
    }

    async fn list_users(&self) -> Result<Vec<IdentityUser>, IdentityError> {
        fetch::<UserList>(self.admin(reqwest::Method::GET, "admin/users"))
            .await
            .map(|list| list.users.into_iter().map(IdentityUser::from).collect())
            .map_err(IdentityError::new)
    }

    async fn current_user(&self, token: &str) -> Result<Option<IdentityUser>, IdentityError> {
        if let Some(verifier) = &self.verifier {
            return Ok(verifier.verify(token).await.map(Claims::into_user));
        }
        let resp = self
            .client
            .get(self.auth("user"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| IdentityError::new(e.to_string()))?;
        match resp.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                debug!("session token rejected by provider");
                Ok(None)
            }
            status if status.is_success() => resp
                .json::<RemoteUser>()
                .await
                .map(|u| Some(u.into()))
                .map_err(|e| IdentityError::new(e.to_string())),
            _ => Err(IdentityError::new(failure_message(resp).await)),
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let req = self
            .client
            .post(self.auth("token"))
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));
        fetch::<TokenResponse>(req)
            .await
            .map(|t| Session {
                access_token: t.access_token,
                user: t.user.into(),
            })
            .map_err(IdentityError::new)
    }

    async fn sign_out(&self, token: &str) -> Result<(), IdentityError> {
        send(self.client.post(self.auth("logout")).bearer_auth(token))
            .await
            .map(|_| ())
            .map_err(IdentityError::new)
    }
}

#[async_trait]
impl GalleryStore for HostedBackend {
    async fn list_folders(&self, order: FolderOrder) -> Result<Vec<Folder>, StoreError> {
        let order = match order {
            FolderOrder::Asc => "created_at.asc",
            FolderOrder::Desc => "created_at.desc",
        };
        fetch(self.rest_get("folders").query(&[("order", order)]))
            .await
            .map_err(StoreError::new)
    }

    async fn search_folders(&self, query: &str) -> Result<Vec<Folder>, StoreError> {
        fetch(
            self.rest_get("folders")
                .query(&[("name", format!("ilike.*{query}*"))]),
        )
        .await
        .map_err(StoreError::new)
    }

    async fn get_folder(&self, id: i64) -> Result<Option<Folder>, StoreError> {
        Self::first_row(self.rest_get("folders").query(&[("id", eq(id))])).await
    }

    async fn insert_folder(
        &self,
        name: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Folder, StoreError> {
        let req = self
            .rest_insert("folders", true)
            .json(&json!([{ "name": name, "created_at": created_at }]));
        Self::first_row(req)
            .await?
            .ok_or_else(|| StoreError::new("insert returned no folder"))
    }

    async fn rename_folder(&self, id: i64, name: &str) -> Result<(), StoreError> {
        send(
            self.rest_patch("folders")
                .query(&[("id", eq(id))])
                .json(&json!({ "name": name })),
        )
        .await
        .map(|_| ())
        .map_err(StoreError::new)
    }

    async fn delete_folder(&self, id: i64) -> Result<(), StoreError> {
        send(self.rest_delete("folders").query(&[("id", eq(id))]))
            .await
            .map(|_| ())
            .map_err(StoreError::new)
    }

    async fn list_images(&self, folder_id: i64) -> Result<Vec<Image>, StoreError> {
        fetch(self.rest_get("images").query(&[("folder_id", eq(folder_id))]))
            .await
            .map_err(StoreError::new)
    }

    async fn get_image(&self, id: i64) -> Result<Option<Image>, StoreError> {
        Self::first_row(self.rest_get("images").query(&[("id", eq(id))])).await
    }

    async fn insert_image(&self, image: NewImage) -> Result<Image, StoreError> {
        Self::first_row(self.rest_insert("images", true).json(&[image]))
            .await?
            .ok_or_else(|| StoreError::new("insert returned no image"))
    }

    async fn delete_image(&self, id: i64) -> Result<(), StoreError> {
        send(self.rest_delete("images").query(&[("id", eq(id))]))
            .await
            .map(|_| ())
            .map_err(StoreError::new)
    }

    async fn delete_folder_images(&self, folder_id: i64) -> Result<(), StoreError> {
        send(self.rest_delete("images").query(&[("folder_id", eq(folder_id))]))
            .await
            .map(|_| ())
            .map_err(StoreError::new)
    }
}
