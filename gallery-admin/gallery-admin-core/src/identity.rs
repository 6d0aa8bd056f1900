//! Identity-provider contract and the identities it hands out.

use crate::error::IdentityError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A user as known to the identity provider.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityUser {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
}

/// The authenticated identity performing a privileged operation.
///
/// Passed explicitly into every operation that attributes work to someone;
/// nothing in the core reads an ambient session.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub email: String,
    pub name: String,
}

impl From<IdentityUser> for Actor {
    fn from(user: IdentityUser) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewIdentity {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// Result of a password sign-in.
#[derive(Clone, Debug, Serialize)]
pub struct Session {
    pub access_token: String,
    pub user: IdentityUser,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Not idempotent: a second call with the same email is a provider conflict.
    async fn create_user(&self, new: NewIdentity) -> Result<IdentityUser, IdentityError>;
    async fn delete_user(&self, id: &str) -> Result<(), IdentityError>;
    async fn update_user_password(&self, id: &str, password: &str) -> Result<(), IdentityError>;
    async fn list_users(&self) -> Result<Vec<IdentityUser>, IdentityError>;
    /// `Ok(None)` when the token is unknown, expired or revoked.
    async fn current_user(&self, token: &str) -> Result<Option<IdentityUser>, IdentityError>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError>;
    async fn sign_out(&self, token: &str) -> Result<(), IdentityError>;
}
