//! Backend implementations of the store, identity and object-storage traits.

#[cfg(any(test, feature = "test-util"))]
pub mod faulty;
pub mod hosted;
pub mod memory;
pub mod s3;

use crate::audit::LogStore;
use crate::gallery::{GalleryStore, ObjectStorage};
use crate::identity::IdentityProvider;
use crate::roles::RoleStore;
use std::sync::Arc;

/// Handles to every external collaborator the services need.
#[derive(Clone)]
pub struct Backend {
    pub roles: Arc<dyn RoleStore>,
    pub logs: Arc<dyn LogStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub gallery: Arc<dyn GalleryStore>,
    pub objects: Arc<dyn ObjectStorage>,
}

impl Backend {
    /// Use one value for every collaborator.
    pub fn uniform<B>(backend: Arc<B>) -> Self
    where
        B: RoleStore + LogStore + IdentityProvider + GalleryStore + ObjectStorage + 'static,
    {
        Self {
            roles: backend.clone(),
            logs: backend.clone(),
            identity: backend.clone(),
            gallery: backend.clone(),
            objects: backend,
        }
    }

    /// The hosted REST backend for tables and identities, S3 for objects.
    pub fn hosted(rest: Arc<hosted::HostedBackend>, objects: Arc<s3::S3ObjectStorage>) -> Self {
        Self {
            roles: rest.clone(),
            logs: rest.clone(),
            identity: rest.clone(),
            gallery: rest,
            objects,
        }
    }
}
