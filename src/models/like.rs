//! Represents a single like on a photo.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// A like row.
///
/// Likes carry no viewer identity: every like is its own row, so repeated
/// likes from the same visitor accumulate.
#[derive(Serialize, Clone, FromRow, Debug, PartialEq)]
pub struct Like {
    pub id: i64,
    pub photo_id: i64,
    pub like_date: DateTime<Utc>,
}
