//! Role records and the store that holds them.

use crate::error::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Coarse access tier. Tiers are compared by equality only.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
    Superadmin,
}

/// Fine-grained capability token, independent of [`Role`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Upload,
    Create,
    Delete,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Superadmin => "superadmin",
        }
    }
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Upload => "upload",
            Permission::Create => "create",
            Permission::Delete => "delete",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the `roles` table, keyed by `user_email`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleRecord {
    pub user_email: String,
    pub user_name: String,
    pub user_role: Role,
    #[serde(default)]
    pub user_permissions: BTreeSet<Permission>,
}

impl RoleRecord {
    pub fn new(
        user_email: impl Into<String>,
        user_name: impl Into<String>,
        user_role: Role,
        user_permissions: impl IntoIterator<Item = Permission>,
    ) -> Self {
        Self {
            user_email: user_email.into(),
            user_name: user_name.into(),
            user_role,
            user_permissions: user_permissions.into_iter().collect(),
        }
    }

    /// Permission-set membership. Ignores the role entirely.
    pub fn grants(&self, permission: Permission) -> bool {
        self.user_permissions.contains(&permission)
    }

    /// Role equality. Ignores the permission set entirely.
    pub fn is(&self, role: Role) -> bool {
        self.user_role == role
    }
}

/// Access to the `roles` table.
///
/// `update_role` only ever touches `user_role` and `user_permissions`; name
/// and email are fixed at insert time.
#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn get_role(&self, email: &str) -> Result<Option<RoleRecord>, StoreError>;
    async fn list_roles(&self) -> Result<Vec<RoleRecord>, StoreError>;
    async fn insert_role(&self, record: RoleRecord) -> Result<(), StoreError>;
    async fn update_role(
        &self,
        email: &str,
        role: Role,
        permissions: BTreeSet<Permission>,
    ) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_wire_format_matches_table() {
        let record = RoleRecord::new(
            "ann@example.com",
            "Ann",
            Role::Superadmin,
            [Permission::Delete, Permission::Upload],
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["user_role"], "superadmin");
        assert_eq!(json["user_permissions"], serde_json::json!(["upload", "delete"]));

        let parsed: RoleRecord = serde_json::from_value(serde_json::json!({
            "user_email": "bob@example.com",
            "user_name": "Bob",
            "user_role": "user",
            "user_permissions": ["create", "create"]
        }))
        .unwrap();
        assert_eq!(parsed.user_permissions.len(), 1);
        assert!(parsed.grants(Permission::Create));
    }

    #[test]
    fn missing_permissions_column_is_empty_set() {
        let parsed: RoleRecord = serde_json::from_value(serde_json::json!({
            "user_email": "c@example.com",
            "user_name": "C",
            "user_role": "admin"
        }))
        .unwrap();
        assert!(parsed.user_permissions.is_empty());
    }

    #[test]
    fn role_and_permission_are_independent() {
        let superadmin = RoleRecord::new("s@example.com", "S", Role::Superadmin, []);
        assert!(superadmin.is(Role::Superadmin));
        assert!(!superadmin.is(Role::Admin));
        assert!(!superadmin.grants(Permission::Upload));

        let user = RoleRecord::new("u@example.com", "U", Role::User, [Permission::Upload]);
        assert!(user.grants(Permission::Upload));
        assert!(!user.is(Role::Admin));
    }
}
