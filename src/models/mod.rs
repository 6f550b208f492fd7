//! Core data models for the gallery service.
//!
//! These entities map to the `photos`, `comments` and `likes` tables via
//! `sqlx::FromRow` and serialize as the JSON shapes the HTTP API returns.

pub mod comment;
pub mod like;
pub mod photo;
