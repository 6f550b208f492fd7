//! Shared handler state.

use crate::services::{admin_auth::AdminAuth, gallery_service::GalleryService};

/// Everything handlers need; cheap to clone, all shared mutable state lives
/// in the SQLite pool behind the services.
#[derive(Clone)]
pub struct AppState {
    pub gallery: GalleryService,
    pub auth: AdminAuth,
}

impl AppState {
    pub fn new(gallery: GalleryService, auth: AdminAuth) -> Self {
        Self { gallery, auth }
    }
}
