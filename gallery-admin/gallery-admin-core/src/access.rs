//! Role and permission gates.
//!
//! The role gate is an equality test on `user_role`; the permission gate is
//! set membership on `user_permissions`. Neither implies the other and roles
//! have no hierarchy. Both fail closed when the lookup fails.

use crate::error::AccessError;
use crate::identity::Actor;
use crate::roles::{Permission, Role, RoleRecord, RoleStore};
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct PermissionChecker {
    roles: Arc<dyn RoleStore>,
}

impl PermissionChecker {
    pub fn new(roles: Arc<dyn RoleStore>) -> Self {
        Self { roles }
    }

    /// The role record for `email`; a failed lookup reads as no record.
    pub async fn record(&self, email: &str) -> Option<RoleRecord> {
        match self.roles.get_role(email).await {
            Ok(record) => record,
            Err(err) => {
                warn!(%email, error = %err, "role lookup failed, denying");
                None
            }
        }
    }

    /// `true` iff a role record exists for `email` and lists `permission`.
    pub async fn has_permission(&self, email: &str, permission: Permission) -> bool {
        self.record(email)
            .await
            .map_or(false, |record| record.grants(permission))
    }

    /// The role recorded for `email`, if any.
    pub async fn role_of(&self, email: &str) -> Option<Role> {
        self.record(email).await.map(|record| record.user_role)
    }

    pub async fn require_role(&self, actor: &Actor, role: Role) -> Result<(), AccessError> {
        match self.role_of(&actor.email).await {
            Some(found) if found == role => Ok(()),
            _ => {
                warn!(actor = %actor.email, required = %role, "role gate refused");
                Err(AccessError::Forbidden(format!("requires role {role}")))
            }
        }
    }

    pub async fn require_permission(
        &self,
        actor: &Actor,
        permission: Permission,
    ) -> Result<(), AccessError> {
        if self.has_permission(&actor.email, permission).await {
            Ok(())
        } else {
            warn!(actor = %actor.email, %permission, "permission gate refused");
            Err(AccessError::Forbidden(format!(
                "requires permission {permission}"
            )))
        }
    }
}
