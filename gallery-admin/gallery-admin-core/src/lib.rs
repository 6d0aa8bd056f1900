pub mod access;
pub mod admin;
pub mod audit;
pub mod auth;
pub mod backend;
pub mod error;
pub mod gallery;
pub mod identity;
pub mod roles;

use access::PermissionChecker;
use admin::{AdminService, CompensationPolicy};
use audit::ActionLogger;
use backend::Backend;
use gallery::GalleryService;
use identity::IdentityProvider;
use std::sync::Arc;

/// Every service wired to one [`Backend`].
#[derive(Clone)]
pub struct Services {
    pub identity: Arc<dyn IdentityProvider>,
    pub checker: PermissionChecker,
    pub logger: ActionLogger,
    pub admin: AdminService,
    pub gallery: GalleryService,
}

impl Services {
    pub fn new(backend: Backend, compensation: CompensationPolicy) -> Self {
        let logger = ActionLogger::new(backend.logs.clone());
        Self {
            checker: PermissionChecker::new(backend.roles.clone()),
            admin: AdminService::new(
                backend.identity.clone(),
                backend.roles.clone(),
                logger.clone(),
            )
            .with_compensation(compensation),
            gallery: GalleryService::new(backend.gallery, backend.objects, logger.clone()),
            identity: backend.identity,
            logger,
        }
    }
}
