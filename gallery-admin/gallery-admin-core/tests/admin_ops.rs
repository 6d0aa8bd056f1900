//! User administration against the in-memory backend, including injected
//! failures at each step of user creation.

use anyhow::Result;
use gallery_admin_core::{
    admin::{AdminError, AdminService, CompensationPolicy, CreateUser},
    audit::{ActionLogger, LogStore},
    backend::faulty::{Fault, FaultyBackend},
    backend::memory::MemoryBackend,
    identity::{Actor, IdentityProvider},
    roles::{Permission, Role, RoleRecord, RoleStore},
};
use std::collections::BTreeSet;
use std::sync::Arc;

fn actor() -> Actor {
    Actor {
        id: "actor-id".into(),
        email: "root@example.com".into(),
        name: "Root".into(),
    }
}

fn new_user() -> CreateUser {
    CreateUser {
        email: "new@example.com".into(),
        password: "s3cret".into(),
        name: "New Person".into(),
        is_admin: true,
        can_upload: true,
        can_create: false,
        can_delete: true,
    }
}

fn setup() -> (Arc<FaultyBackend>, AdminService) {
    let backend = Arc::new(FaultyBackend::new(Arc::new(MemoryBackend::new())));
    let service = AdminService::new(
        backend.clone(),
        backend.clone(),
        ActionLogger::new(backend.clone()),
    );
    (backend, service)
}

#[tokio::test]
async fn create_user_derives_role_and_tokens() -> Result<()> {
    let (backend, admin) = setup();
    let created = admin.create_user(&actor(), new_user()).await?;
    assert!(created.warning.is_none());

    let record = backend.get_role("new@example.com").await?.expect("role stored");
    assert_eq!(record.user_role, Role::Admin);
    assert_eq!(
        record.user_permissions,
        BTreeSet::from([Permission::Upload, Permission::Delete])
    );
    assert_eq!(record.user_name, "New Person");
    assert_eq!(created.user.email, "new@example.com");
    Ok(())
}

#[tokio::test]
async fn create_then_list_has_exactly_one_record() -> Result<()> {
    let (_backend, admin) = setup();
    admin.create_user(&actor(), new_user()).await?;
    let roles = admin.list_roles().await?;
    let matching = roles
        .iter()
        .filter(|r| r.user_email == "new@example.com")
        .count();
    assert_eq!(matching, 1);
    // reading again changes nothing
    assert_eq!(admin.list_roles().await?.len(), roles.len());
    Ok(())
}

#[tokio::test]
async fn log_entry_names_the_actor() -> Result<()> {
    let (backend, admin) = setup();
    admin.create_user(&actor(), new_user()).await?;
    let logs = backend.list_logs().await?;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].user_email, "root@example.com");
    assert_eq!(logs[0].user_name, "Root");
    assert_eq!(logs[0].action, "New user new@example.com created");
    Ok(())
}

#[tokio::test]
async fn identity_failure_has_no_side_effects() -> Result<()> {
    let (backend, admin) = setup();
    backend.inject(Fault::IdentityCreate);
    let err = admin.create_user(&actor(), new_user()).await.unwrap_err();
    assert!(matches!(err, AdminError::Identity(_)));
    assert!(backend.list_roles().await?.is_empty());
    assert!(backend.list_logs().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn duplicate_email_surfaces_provider_conflict() -> Result<()> {
    let (backend, admin) = setup();
    admin.create_user(&actor(), new_user()).await?;
    let err = admin.create_user(&actor(), new_user()).await.unwrap_err();
    match err {
        AdminError::Identity(e) => assert!(e.message.contains("already been registered")),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(backend.list_roles().await?.len(), 1);
    assert_eq!(backend.list_logs().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn role_insert_failure_leaves_orphan_identity_by_default() -> Result<()> {
    let (backend, admin) = setup();
    backend.inject(Fault::RoleWrite);
    let err = admin.create_user(&actor(), new_user()).await.unwrap_err();
    assert!(matches!(err, AdminError::RoleInsert { compensated: false, .. }));
    let users = backend.list_users().await?;
    assert!(users.iter().any(|u| u.email == "new@example.com"));
    assert!(backend.list_logs().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn role_insert_failure_with_compensation_removes_identity() -> Result<()> {
    let (backend, admin) = setup();
    let admin = admin.with_compensation(CompensationPolicy::DeleteIdentity);
    backend.inject(Fault::RoleWrite);
    let err = admin.create_user(&actor(), new_user()).await.unwrap_err();
    assert!(matches!(err, AdminError::RoleInsert { compensated: true, .. }));
    assert!(backend.list_users().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn failed_compensation_is_reported() -> Result<()> {
    let (backend, admin) = setup();
    let admin = admin.with_compensation(CompensationPolicy::DeleteIdentity);
    backend.inject(Fault::RoleWrite);
    backend.inject(Fault::IdentityDelete);
    let err = admin.create_user(&actor(), new_user()).await.unwrap_err();
    assert!(matches!(err, AdminError::RoleInsert { compensated: false, .. }));
    assert_eq!(backend.list_users().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn log_failure_is_a_warning_not_a_rollback() -> Result<()> {
    let (backend, admin) = setup();
    backend.inject(Fault::LogAppend);
    let created = admin.create_user(&actor(), new_user()).await?;
    assert!(created.warning.is_some());
    assert!(backend.get_role("new@example.com").await?.is_some());
    assert!(backend.list_logs().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn update_role_downgrades_without_touching_identity_fields() -> Result<()> {
    let (backend, admin) = setup();
    backend
        .insert_role(RoleRecord::new(
            "boss@example.com",
            "Boss",
            Role::Superadmin,
            [Permission::Upload, Permission::Create, Permission::Delete],
        ))
        .await?;
    admin
        .update_role("boss@example.com", Role::User, BTreeSet::new())
        .await?;
    let record = backend.get_role("boss@example.com").await?.expect("still there");
    assert_eq!(record.user_role, Role::User);
    assert!(record.user_permissions.is_empty());
    assert_eq!(record.user_name, "Boss");
    assert_eq!(record.user_email, "boss@example.com");
    // no audit entry for role edits
    assert!(backend.list_logs().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn delete_user_keeps_role_record() -> Result<()> {
    let (backend, admin) = setup();
    let created = admin.create_user(&actor(), new_user()).await?;
    admin.delete_user(&created.user.id).await?;
    assert!(backend.list_users().await?.is_empty());
    assert!(backend.get_role("new@example.com").await?.is_some());
    Ok(())
}

#[tokio::test]
async fn password_update_allows_new_sign_in_and_is_not_logged() -> Result<()> {
    let (backend, admin) = setup();
    let created = admin.create_user(&actor(), new_user()).await?;
    admin.update_user_password(&created.user.id, "changed").await?;
    assert!(backend.sign_in("new@example.com", "s3cret").await.is_err());
    assert!(backend.sign_in("new@example.com", "changed").await.is_ok());
    assert_eq!(backend.list_logs().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn unknown_user_id_is_an_identity_error() {
    let (_backend, admin) = setup();
    assert!(matches!(
        admin.delete_user("missing").await,
        Err(AdminError::Identity(_))
    ));
    assert!(matches!(
        admin.update_user_password("missing", "pw").await,
        Err(AdminError::Identity(_))
    ));
}
