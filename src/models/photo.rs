//! Represents an uploaded photo and its aggregated listing form.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// A single photo row.
///
/// The `filename` names a file inside the uploads directory. A photo is
/// immutable once created; it only ever goes away through deletion.
#[derive(Serialize, Clone, FromRow, Debug, PartialEq)]
pub struct Photo {
    /// Generated row id.
    pub id: i64,

    /// Display title, never empty.
    pub title: String,

    /// Free-form category used by the listing filter, never empty.
    pub category: String,

    /// Generated name of the stored image file.
    pub filename: String,

    /// When the photo was uploaded.
    pub upload_date: DateTime<Utc>,
}

/// A photo annotated with live like and comment counts.
///
/// The counts are derived at query time and never stored.
#[derive(Serialize, Clone, FromRow, Debug, PartialEq)]
pub struct PhotoSummary {
    pub id: i64,
    pub title: String,
    pub category: String,
    pub filename: String,
    pub upload_date: DateTime<Utc>,
    pub like_count: i64,
    pub comment_count: i64,
}
