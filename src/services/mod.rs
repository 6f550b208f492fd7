pub mod admin_auth;
pub mod gallery_service;
pub mod upload;
