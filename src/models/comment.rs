//! Represents a visitor comment attached to a photo.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// A comment row. Removed together with its photo.
#[derive(Serialize, Clone, FromRow, Debug, PartialEq)]
pub struct Comment {
    pub id: i64,

    /// The photo this comment belongs to.
    pub photo_id: i64,

    /// Trimmed comment text, never empty.
    pub comment: String,

    pub comment_date: DateTime<Utc>,
}
