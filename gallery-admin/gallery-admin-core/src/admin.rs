//! Privileged user and role administration.
//!
//! Callers gate these operations (superadmin only) before invoking them;
//! nothing here re-checks the actor's role.
//!
//! `create_user` spans two systems and is not atomic. It runs as an ordered
//! sequence of steps:
//!
//! 1. create the identity. Failure stops here with no side effects.
//! 2. derive the role and permission set from the request flags.
//! 3. insert the role record. Failure leaves an identity with no role
//!    ([`AdminError::RoleInsert`]) unless [`CompensationPolicy::DeleteIdentity`]
//!    is selected, in which case the identity is deleted again.
//! 4. append the audit entry for the actor. Failure is returned as a warning
//!    next to the created user and undoes nothing.

use crate::audit::ActionLogger;
use crate::error::{IdentityError, LogError, StoreError};
use crate::identity::{Actor, IdentityProvider, IdentityUser, NewIdentity};
use crate::roles::{Permission, Role, RoleRecord, RoleStore};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

/// What `create_user` does when the role insert fails after the identity
/// already exists.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CompensationPolicy {
    /// Leave the orphaned identity in place.
    #[default]
    None,
    /// Delete the identity that was just created.
    DeleteIdentity,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default, alias = "canUploadImage")]
    pub can_upload: bool,
    #[serde(default, alias = "canCreateFolder")]
    pub can_create: bool,
    #[serde(default, alias = "canDeleteFolder")]
    pub can_delete: bool,
}

impl CreateUser {
    pub fn role(&self) -> Role {
        if self.is_admin {
            Role::Admin
        } else {
            Role::User
        }
    }

    pub fn permissions(&self) -> BTreeSet<Permission> {
        [
            (self.can_upload, Permission::Upload),
            (self.can_create, Permission::Create),
            (self.can_delete, Permission::Delete),
        ]
        .into_iter()
        .filter_map(|(flag, permission)| flag.then_some(permission))
        .collect()
    }
}

#[derive(Debug)]
pub struct CreatedUser {
    pub user: IdentityUser,
    pub role: RoleRecord,
    /// Set when the audit append failed.
    pub warning: Option<LogError>,
}

#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The identity exists but its role record could not be written.
    #[error("user {user_id} was created but its role was not stored: {source}")]
    RoleInsert {
        user_id: String,
        /// Whether the identity was deleted again.
        compensated: bool,
        #[source]
        source: StoreError,
    },
}

#[derive(Clone)]
pub struct AdminService {
    identity: Arc<dyn IdentityProvider>,
    roles: Arc<dyn RoleStore>,
    logger: ActionLogger,
    compensation: CompensationPolicy,
}

impl AdminService {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        roles: Arc<dyn RoleStore>,
        logger: ActionLogger,
    ) -> Self {
        Self {
            identity,
            roles,
            logger,
            compensation: CompensationPolicy::None,
        }
    }

    pub fn with_compensation(mut self, policy: CompensationPolicy) -> Self {
        self.compensation = policy;
        self
    }

    pub async fn create_user(
        &self,
        actor: &Actor,
        req: CreateUser,
    ) -> Result<CreatedUser, AdminError> {
        let role = req.role();
        let permissions = req.permissions();

        let user = self
            .identity
            .create_user(NewIdentity {
                email: req.email.clone(),
                password: req.password,
                name: req.name.clone(),
            })
            .await?;

        let record = RoleRecord {
            user_email: req.email.clone(),
            user_name: req.name,
            user_role: role,
            user_permissions: permissions,
        };
        if let Err(source) = self.roles.insert_role(record.clone()).await {
            let compensated = self.compensate(&user).await;
            return Err(AdminError::RoleInsert {
                user_id: user.id,
                compensated,
                source,
            });
        }
        info!(actor = %actor.email, user = %user.email, role = %role, "user created");

        let warning = self
            .logger
            .record(format!("New user {} created", req.email), actor)
            .await
            .err();
        Ok(CreatedUser {
            user,
            role: record,
            warning,
        })
    }

    async fn compensate(&self, user: &IdentityUser) -> bool {
        match self.compensation {
            CompensationPolicy::None => {
                warn!(user = %user.email, id = %user.id, "identity left without a role record");
                false
            }
            CompensationPolicy::DeleteIdentity => match self.identity.delete_user(&user.id).await {
                Ok(()) => {
                    info!(user = %user.email, "identity removed after failed role insert");
                    true
                }
                Err(err) => {
                    error!(
                        user = %user.email,
                        id = %user.id,
                        error = %err,
                        "compensating delete failed"
                    );
                    false
                }
            },
        }
    }

    pub async fn update_user_password(
        &self,
        user_id: &str,
        password: &str,
    ) -> Result<(), AdminError> {
        self.identity.update_user_password(user_id, password).await?;
        info!(user = %user_id, "password updated");
        Ok(())
    }

    /// Removes the identity only. The role record and any stored objects stay.
    pub async fn delete_user(&self, user_id: &str) -> Result<(), AdminError> {
        self.identity.delete_user(user_id).await?;
        info!(user = %user_id, "user deleted");
        Ok(())
    }

    pub async fn update_role(
        &self,
        email: &str,
        role: Role,
        permissions: BTreeSet<Permission>,
    ) -> Result<(), AdminError> {
        self.roles.update_role(email, role, permissions).await?;
        info!(user = %email, role = %role, "role updated");
        Ok(())
    }

    pub async fn list_users(&self) -> Result<Vec<IdentityUser>, AdminError> {
        Ok(self.identity.list_users().await?)
    }

    pub async fn list_roles(&self) -> Result<Vec<RoleRecord>, AdminError> {
        Ok(self.roles.list_roles().await?)
    }
}
