//! src/services/gallery_service.rs
//!
//! GalleryService — photo lifecycle backed by SQLite for the catalog
//! (photos, comments, likes) and a flat uploads directory for the image
//! files. Every photo row names exactly one file in `uploads_dir`; the
//! upload path, administrative deletion and cleanup reconciliation keep the
//! two sides consistent.

use crate::{
    models::{
        comment::Comment,
        like::Like,
        photo::{Photo, PhotoSummary},
    },
    services::upload::{self, ImageKind, MAX_UPLOAD_BYTES},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt, future::join_all, pin_mut};
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::{
    io::{self, ErrorKind},
    path::PathBuf,
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs::{self, File, OpenOptions},
    io::AsyncWriteExt,
};
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("{0}")]
    Validation(String),
    #[error("Photo not found")]
    PhotoNotFound(i64),
    #[error("File `{0}` not found")]
    FileNotFound(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type GalleryResult<T> = Result<T, GalleryError>;

/// Listing order by upload date.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PhotoSort {
    #[default]
    Newest,
    Oldest,
}

impl PhotoSort {
    /// `"oldest"` selects ascending order; anything else falls back to
    /// newest first.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("oldest") => Self::Oldest,
            _ => Self::Newest,
        }
    }

    fn sql(self) -> &'static str {
        match self {
            Self::Newest => " ORDER BY p.upload_date DESC, p.id DESC",
            Self::Oldest => " ORDER BY p.upload_date ASC, p.id ASC",
        }
    }
}

/// Filter, search and sort parameters for the public listing.
#[derive(Clone, Debug, Default)]
pub struct PhotoQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub sort: PhotoSort,
}

impl PhotoQuery {
    /// Exact category to filter on; `"all"` and empty mean no filter.
    fn category_filter(&self) -> Option<&str> {
        self.category
            .as_deref()
            .filter(|category| !category.is_empty() && *category != "all")
    }

    fn search_filter(&self) -> Option<&str> {
        self.search.as_deref().filter(|search| !search.is_empty())
    }
}

/// An image file written to the uploads directory but not yet referenced
/// by a photo row.
#[derive(Debug)]
pub struct StoredImage {
    pub filename: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Outcome of a cleanup reconciliation pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Photo rows examined.
    pub checked: usize,
    /// Photo rows removed because their file was missing.
    pub removed: usize,
}

/// GalleryService provides the photo lifecycle:
/// - Upload (stream the image to disk, then insert the photo row)
/// - Listing with live like/comment counts
/// - Comments and likes
/// - Administrative deletion (row, cascade, then file)
/// - Cleanup of rows whose file went missing
#[derive(Clone)]
pub struct GalleryService {
    /// Shared SQLite connection pool holding the catalog.
    pub db: Arc<SqlitePool>,

    /// Directory holding the uploaded image files.
    pub uploads_dir: PathBuf,
}

const SUMMARY_SELECT: &str = "SELECT p.id, p.title, p.category, p.filename, p.upload_date, \
     (SELECT COUNT(*) FROM likes l WHERE l.photo_id = p.id) AS like_count, \
     (SELECT COUNT(*) FROM comments c WHERE c.photo_id = p.id) AS comment_count \
     FROM photos p";

const MAX_NAME_ATTEMPTS: usize = 8;

impl GalleryService {
    pub fn new(db: Arc<SqlitePool>, uploads_dir: impl Into<PathBuf>) -> Self {
        Self {
            db,
            uploads_dir: uploads_dir.into(),
        }
    }

    /// Insert a photo row stamped with the current time.
    pub async fn insert_photo(
        &self,
        title: &str,
        category: &str,
        filename: &str,
    ) -> GalleryResult<Photo> {
        self.insert_photo_at(title, category, filename, Utc::now())
            .await
    }

    pub(crate) async fn insert_photo_at(
        &self,
        title: &str,
        category: &str,
        filename: &str,
        upload_date: DateTime<Utc>,
    ) -> GalleryResult<Photo> {
        if title.trim().is_empty() || category.trim().is_empty() {
            return Err(GalleryError::Validation(
                "Title and category are required".into(),
            ));
        }

        let photo = sqlx::query_as::<_, Photo>(
            "INSERT INTO photos (title, category, filename, upload_date)
             VALUES (?, ?, ?, ?)
             RETURNING id, title, category, filename, upload_date",
        )
        .bind(title)
        .bind(category)
        .bind(filename)
        .bind(upload_date)
        .fetch_one(&*self.db)
        .await?;

        Ok(photo)
    }

    /// Fetch the bare photo row.
    pub async fn fetch_photo(&self, id: i64) -> GalleryResult<Photo> {
        sqlx::query_as::<_, Photo>(
            "SELECT id, title, category, filename, upload_date FROM photos WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(GalleryError::PhotoNotFound(id))
    }

    /// Fetch one photo with its like and comment counts.
    pub async fn get_photo(&self, id: i64) -> GalleryResult<PhotoSummary> {
        let mut builder = QueryBuilder::<Sqlite>::new(SUMMARY_SELECT);
        builder.push(" WHERE p.id = ");
        builder.push_bind(id);

        builder
            .build_query_as::<PhotoSummary>()
            .fetch_optional(&*self.db)
            .await?
            .ok_or(GalleryError::PhotoNotFound(id))
    }

    /// List photos with live counts.
    ///
    /// Category is an exact match, search is a case-insensitive substring
    /// match on title or category, and both combine with AND.
    pub async fn list_photos(&self, query: &PhotoQuery) -> GalleryResult<Vec<PhotoSummary>> {
        let mut builder = QueryBuilder::<Sqlite>::new(SUMMARY_SELECT);
        let mut has_condition = false;

        if let Some(category) = query.category_filter() {
            builder.push(" WHERE p.category = ");
            builder.push_bind(category.to_string());
            has_condition = true;
        }

        if let Some(search) = query.search_filter() {
            let pattern = format!("%{}%", escape_like(search));
            builder.push(if has_condition { " AND " } else { " WHERE " });
            builder.push("(p.title LIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" ESCAPE '\\' OR p.category LIKE ");
            builder.push_bind(pattern);
            builder.push(" ESCAPE '\\')");
        }

        builder.push(query.sort.sql());

        let photos = builder
            .build_query_as::<PhotoSummary>()
            .fetch_all(&*self.db)
            .await?;
        Ok(photos)
    }

    /// Admin listing: every photo, newest first.
    pub async fn list_all_photos(&self) -> GalleryResult<Vec<PhotoSummary>> {
        self.list_photos(&PhotoQuery::default()).await
    }

    /// Add a comment. The text is trimmed and must not be empty.
    pub async fn add_comment(&self, photo_id: i64, text: &str) -> GalleryResult<Comment> {
        let text = text.trim();
        if text.is_empty() {
            return Err(GalleryError::Validation("Comment cannot be empty".into()));
        }

        sqlx::query_as::<_, Comment>(
            "INSERT INTO comments (photo_id, comment, comment_date)
             VALUES (?, ?, ?)
             RETURNING id, photo_id, comment, comment_date",
        )
        .bind(photo_id)
        .bind(text)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await
        .map_err(|err| photo_reference_error(err, photo_id))
    }

    /// Comments of a photo, newest first.
    pub async fn list_comments(&self, photo_id: i64) -> GalleryResult<Vec<Comment>> {
        let comments = sqlx::query_as::<_, Comment>(
            "SELECT id, photo_id, comment, comment_date
             FROM comments
             WHERE photo_id = ?
             ORDER BY comment_date DESC, id DESC",
        )
        .bind(photo_id)
        .fetch_all(&*self.db)
        .await?;
        Ok(comments)
    }

    /// Record a like. Every call adds a row.
    pub async fn add_like(&self, photo_id: i64) -> GalleryResult<Like> {
        sqlx::query_as::<_, Like>(
            "INSERT INTO likes (photo_id, like_date)
             VALUES (?, ?)
             RETURNING id, photo_id, like_date",
        )
        .bind(photo_id)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await
        .map_err(|err| photo_reference_error(err, photo_id))
    }

    pub async fn like_count(&self, photo_id: i64) -> GalleryResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM likes WHERE photo_id = ?")
            .bind(photo_id)
            .fetch_one(&*self.db)
            .await?;
        Ok(count)
    }

    /// Stream an uploaded image into the uploads directory.
    ///
    /// - Checks the original extension and the declared media type against
    ///   the allow-list before writing anything.
    /// - Counts bytes while streaming and gives up past `MAX_UPLOAD_BYTES`.
    /// - Writes under a freshly generated, exclusively created name.
    ///
    /// Partially written files are removed on every error path.
    pub async fn store_image<S>(
        &self,
        file_name: Option<&str>,
        media_type: Option<&str>,
        stream: S,
    ) -> GalleryResult<StoredImage>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        let ext = upload::accepted_extension(file_name, media_type).ok_or_else(|| {
            GalleryError::Validation("Only image files are allowed!".into())
        })?;

        let (filename, path, mut file) = self.create_unique_file(&ext).await?;

        let mut size_bytes: u64 = 0;
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&path).await;
                    return Err(GalleryError::Validation(format!(
                        "Failed to read uploaded file: {}",
                        err
                    )));
                }
            };
            size_bytes += chunk.len() as u64;
            if size_bytes > MAX_UPLOAD_BYTES {
                let _ = fs::remove_file(&path).await;
                return Err(GalleryError::Validation(
                    "File too large (max 10 MiB)".into(),
                ));
            }
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&path).await;
                return Err(GalleryError::Io(err));
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&path).await;
            return Err(GalleryError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&path).await;
            return Err(GalleryError::Io(err));
        }

        debug!("stored upload {} ({} bytes)", filename, size_bytes);
        Ok(StoredImage {
            filename,
            path,
            size_bytes,
        })
    }

    /// Turn a stored image into a photo row.
    ///
    /// The image file is removed when the image is accompanied by missing
    /// metadata or when the insert fails, so no orphan file survives a
    /// rejected upload.
    pub async fn register_photo(
        &self,
        title: Option<&str>,
        category: Option<&str>,
        image: Option<StoredImage>,
    ) -> GalleryResult<Photo> {
        let Some(image) = image else {
            return Err(GalleryError::Validation("No image file uploaded".into()));
        };

        let (Some(title), Some(category)) = (non_empty(title), non_empty(category)) else {
            self.discard_image(&image).await;
            return Err(GalleryError::Validation(
                "Title and category are required".into(),
            ));
        };

        match self.insert_photo(title, category, &image.filename).await {
            Ok(photo) => {
                info!(
                    "uploaded photo {} as {} ({} bytes)",
                    photo.id, photo.filename, image.size_bytes
                );
                Ok(photo)
            }
            Err(err) => {
                self.discard_image(&image).await;
                Err(err)
            }
        }
    }

    /// Best-effort removal of a stored image that will not be registered.
    pub async fn discard_image(&self, image: &StoredImage) {
        match fs::remove_file(&image.path).await {
            Ok(_) => debug!("discarded upload {}", image.filename),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!("failed to discard upload {}: {}", image.filename, err),
        }
    }

    /// Open a stored image for streaming out.
    pub async fn open_upload(&self, filename: &str) -> GalleryResult<(File, &'static str)> {
        if !upload::is_safe_filename(filename) {
            return Err(GalleryError::Validation("Invalid file name".into()));
        }

        let path = self.uploads_dir.join(filename);
        let file = File::open(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                GalleryError::FileNotFound(filename.to_string())
            } else {
                GalleryError::Io(err)
            }
        })?;

        let media_type = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(ImageKind::from_extension)
            .map(ImageKind::media_type)
            .unwrap_or("application/octet-stream");

        Ok((file, media_type))
    }

    /// Delete a photo, its comments and likes, then its file.
    ///
    /// The row (with its cascade) goes before the file. A file that is
    /// already gone is not an error.
    pub async fn delete_photo(&self, id: i64) -> GalleryResult<Photo> {
        let photo = self.fetch_photo(id).await?;

        let result = sqlx::query("DELETE FROM photos WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(GalleryError::PhotoNotFound(id));
        }

        let file_path = self.uploads_dir.join(&photo.filename);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed physical file {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("file {} already missing", file_path.display());
            }
            Err(err) => return Err(GalleryError::Io(err)),
        }

        info!("deleted photo {} ({})", photo.id, photo.filename);
        Ok(photo)
    }

    /// Remove photo rows whose file no longer exists.
    ///
    /// All photos are checked concurrently and the pass completes only
    /// once every check has finished. Failures on single rows are logged
    /// and skipped. Files are never touched.
    pub async fn cleanup_missing_files(&self) -> GalleryResult<CleanupReport> {
        let photos = sqlx::query_as::<_, (i64, String)>("SELECT id, filename FROM photos")
            .fetch_all(&*self.db)
            .await?;

        let checked = photos.len();
        let outcomes = join_all(
            photos
                .into_iter()
                .map(|(id, filename)| self.reconcile_photo(id, filename)),
        )
        .await;
        let removed = outcomes.into_iter().filter(|removed| *removed).count();

        info!(
            "cleanup checked {} photos, removed {} orphaned records",
            checked, removed
        );
        Ok(CleanupReport { checked, removed })
    }

    /// Check one photo's file; delete the row when the file is missing.
    /// Returns whether a row was removed.
    async fn reconcile_photo(&self, id: i64, filename: String) -> bool {
        let path = self.uploads_dir.join(&filename);
        match fs::try_exists(&path).await {
            Ok(true) => false,
            Ok(false) => match sqlx::query("DELETE FROM photos WHERE id = ?")
                .bind(id)
                .execute(&*self.db)
                .await
            {
                Ok(result) => {
                    let removed = result.rows_affected() > 0;
                    if removed {
                        debug!("removed photo {} with missing file {}", id, filename);
                    }
                    removed
                }
                Err(err) => {
                    warn!("cleanup could not delete photo {}: {}", id, err);
                    false
                }
            },
            Err(err) => {
                warn!("cleanup could not check {}: {}", path.display(), err);
                false
            }
        }
    }

    /// Create a new file with a generated name that does not exist yet.
    async fn create_unique_file(&self, ext: &str) -> GalleryResult<(String, PathBuf, File)> {
        for _ in 0..MAX_NAME_ATTEMPTS {
            let filename = upload::generate_filename(ext);
            let path = self.uploads_dir.join(&filename);
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => return Ok((filename, path, file)),
                Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(GalleryError::Io(err)),
            }
        }

        Err(GalleryError::Io(io::Error::new(
            ErrorKind::AlreadyExists,
            "could not generate a unique file name",
        )))
    }
}

/// Map a foreign key violation on `photo_id` to `PhotoNotFound`.
fn photo_reference_error(err: sqlx::Error, photo_id: i64) -> GalleryError {
    match err {
        sqlx::Error::Database(ref db_err)
            if db_err.is_foreign_key_violation()
                || db_err.message().contains("FOREIGN KEY constraint failed") =>
        {
            GalleryError::PhotoNotFound(photo_id)
        }
        other => GalleryError::Sqlx(other),
    }
}

/// Escape `LIKE` wildcards so the search term matches literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use chrono::Duration;
    use futures::stream;
    use std::path::Path;
    use tempfile::TempDir;

    async fn service() -> (TempDir, GalleryService) {
        let tmp = tempfile::tempdir().unwrap();
        let pool = db::testing::pool(tmp.path()).await;
        let uploads = tmp.path().join("uploads");
        std::fs::create_dir_all(&uploads).unwrap();
        (tmp, GalleryService::new(Arc::new(pool), uploads))
    }

    fn body(bytes: &'static [u8]) -> impl Stream<Item = io::Result<Bytes>> {
        stream::iter(vec![Ok(Bytes::from_static(bytes))])
    }

    fn files_in(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    async fn upload(svc: &GalleryService, title: &str, category: &str) -> Photo {
        let image = svc
            .store_image(Some("photo.png"), Some("image/png"), body(b"png-bytes"))
            .await
            .unwrap();
        svc.register_photo(Some(title), Some(category), Some(image))
            .await
            .unwrap()
    }

    async fn count_rows(svc: &GalleryService, table: &str, photo_id: i64) -> i64 {
        sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM {} WHERE photo_id = ?",
            table
        ))
        .bind(photo_id)
        .fetch_one(&*svc.db)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn upload_writes_one_file_and_one_row() {
        let (_tmp, svc) = service().await;

        let photo = upload(&svc, "Sunset", "Nature").await;

        assert_eq!(files_in(&svc.uploads_dir), 1);
        assert!(svc.uploads_dir.join(&photo.filename).exists());
        assert!(photo.filename.ends_with(".png"));
        let stored = std::fs::read(svc.uploads_dir.join(&photo.filename)).unwrap();
        assert_eq!(stored, b"png-bytes");
        assert_eq!(svc.fetch_photo(photo.id).await.unwrap(), photo);
    }

    #[tokio::test]
    async fn disallowed_media_type_leaves_nothing_behind() {
        let (_tmp, svc) = service().await;

        let err = svc
            .store_image(Some("notes.txt"), Some("text/plain"), body(b"hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, GalleryError::Validation(_)));

        let err = svc
            .store_image(Some("evil.png"), Some("application/x-sh"), body(b"#!"))
            .await
            .unwrap_err();
        assert!(matches!(err, GalleryError::Validation(_)));

        assert_eq!(files_in(&svc.uploads_dir), 0);
        assert!(svc.list_all_photos().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn oversize_upload_is_rejected_and_removed() {
        let (_tmp, svc) = service().await;
        let chunks = vec![
            Ok(Bytes::from(vec![0u8; MAX_UPLOAD_BYTES as usize])),
            Ok(Bytes::from_static(b"x")),
        ];

        let err = svc
            .store_image(Some("big.jpg"), Some("image/jpeg"), stream::iter(chunks))
            .await
            .unwrap_err();

        assert!(matches!(err, GalleryError::Validation(msg) if msg.contains("too large")));
        assert_eq!(files_in(&svc.uploads_dir), 0);
    }

    #[tokio::test]
    async fn broken_stream_removes_partial_file() {
        let (_tmp, svc) = service().await;
        let chunks = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(io::Error::new(ErrorKind::ConnectionReset, "client went away")),
        ];

        let err = svc
            .store_image(Some("a.gif"), Some("image/gif"), stream::iter(chunks))
            .await
            .unwrap_err();

        assert!(matches!(err, GalleryError::Validation(_)));
        assert_eq!(files_in(&svc.uploads_dir), 0);
    }

    #[tokio::test]
    async fn missing_metadata_discards_received_file() {
        let (_tmp, svc) = service().await;
        let image = svc
            .store_image(Some("a.webp"), Some("image/webp"), body(b"webp"))
            .await
            .unwrap();
        assert_eq!(files_in(&svc.uploads_dir), 1);

        let err = svc
            .register_photo(Some("  "), Some("Nature"), Some(image))
            .await
            .unwrap_err();

        assert!(matches!(err, GalleryError::Validation(_)));
        assert_eq!(files_in(&svc.uploads_dir), 0);
    }

    #[tokio::test]
    async fn missing_image_is_a_validation_error() {
        let (_tmp, svc) = service().await;
        let err = svc
            .register_photo(Some("Sunset"), Some("Nature"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, GalleryError::Validation(msg) if msg == "No image file uploaded"));
    }

    #[tokio::test]
    async fn failed_insert_removes_stored_file() {
        let (_tmp, svc) = service().await;
        sqlx::query(
            "CREATE TRIGGER reject_photos BEFORE INSERT ON photos
             BEGIN SELECT RAISE(ABORT, 'forced failure'); END",
        )
        .execute(&*svc.db)
        .await
        .unwrap();

        let image = svc
            .store_image(Some("a.jpeg"), Some("image/jpeg"), body(b"jpeg"))
            .await
            .unwrap();
        let err = svc
            .register_photo(Some("Sunset"), Some("Nature"), Some(image))
            .await
            .unwrap_err();

        assert!(matches!(err, GalleryError::Sqlx(_)));
        assert_eq!(files_in(&svc.uploads_dir), 0);
    }

    #[tokio::test]
    async fn listing_counts_match_rows() {
        let (_tmp, svc) = service().await;
        let liked = upload(&svc, "Sunset", "Nature").await;
        let quiet = upload(&svc, "Skyline", "City").await;

        for _ in 0..3 {
            svc.add_like(liked.id).await.unwrap();
        }
        svc.add_comment(liked.id, "lovely").await.unwrap();
        svc.add_comment(liked.id, "wow").await.unwrap();

        let photos = svc.list_all_photos().await.unwrap();
        assert_eq!(photos.len(), 2);
        for photo in &photos {
            assert_eq!(photo.like_count, count_rows(&svc, "likes", photo.id).await);
            assert_eq!(
                photo.comment_count,
                count_rows(&svc, "comments", photo.id).await
            );
        }

        let quiet = svc.get_photo(quiet.id).await.unwrap();
        assert_eq!((quiet.like_count, quiet.comment_count), (0, 0));
        let liked = svc.get_photo(liked.id).await.unwrap();
        assert_eq!((liked.like_count, liked.comment_count), (3, 2));
        assert_eq!(svc.like_count(liked.id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn repeated_likes_accumulate() {
        let (_tmp, svc) = service().await;
        let photo = upload(&svc, "Sunset", "Nature").await;

        let first = svc.add_like(photo.id).await.unwrap();
        let second = svc.add_like(photo.id).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(svc.like_count(photo.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn comments_and_likes_require_an_existing_photo() {
        let (_tmp, svc) = service().await;

        let err = svc.add_comment(42, "hello").await.unwrap_err();
        assert!(matches!(err, GalleryError::PhotoNotFound(42)));

        let err = svc.add_like(42).await.unwrap_err();
        assert!(matches!(err, GalleryError::PhotoNotFound(42)));
    }

    #[tokio::test]
    async fn blank_comment_is_rejected() {
        let (_tmp, svc) = service().await;
        let photo = upload(&svc, "Sunset", "Nature").await;

        let err = svc.add_comment(photo.id, "   \n").await.unwrap_err();
        assert!(matches!(err, GalleryError::Validation(_)));

        let comment = svc.add_comment(photo.id, "  nice  ").await.unwrap();
        assert_eq!(comment.comment, "nice");
    }

    #[tokio::test]
    async fn comments_are_listed_newest_first() {
        let (_tmp, svc) = service().await;
        let photo = upload(&svc, "Sunset", "Nature").await;

        let first = svc.add_comment(photo.id, "first").await.unwrap();
        let second = svc.add_comment(photo.id, "second").await.unwrap();

        let ids: Vec<i64> = svc
            .list_comments(photo.id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn delete_cascades_and_removes_file() {
        let (_tmp, svc) = service().await;
        let photo = upload(&svc, "Sunset", "Nature").await;
        svc.add_like(photo.id).await.unwrap();
        svc.add_comment(photo.id, "bye").await.unwrap();

        svc.delete_photo(photo.id).await.unwrap();

        assert_eq!(count_rows(&svc, "likes", photo.id).await, 0);
        assert_eq!(count_rows(&svc, "comments", photo.id).await, 0);
        assert!(!svc.uploads_dir.join(&photo.filename).exists());
        assert!(matches!(
            svc.get_photo(photo.id).await,
            Err(GalleryError::PhotoNotFound(_))
        ));
        assert!(matches!(
            svc.delete_photo(photo.id).await,
            Err(GalleryError::PhotoNotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_tolerates_missing_file() {
        let (_tmp, svc) = service().await;
        let photo = upload(&svc, "Sunset", "Nature").await;
        std::fs::remove_file(svc.uploads_dir.join(&photo.filename)).unwrap();

        svc.delete_photo(photo.id).await.unwrap();
        assert!(svc.list_all_photos().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cleanup_removes_only_rows_with_missing_files() {
        let (_tmp, svc) = service().await;
        let kept = upload(&svc, "Sunset", "Nature").await;
        let lost = upload(&svc, "Skyline", "City").await;
        svc.add_like(lost.id).await.unwrap();
        svc.add_comment(lost.id, "gone soon").await.unwrap();

        let report = svc.cleanup_missing_files().await.unwrap();
        assert_eq!(report, CleanupReport { checked: 2, removed: 0 });

        std::fs::remove_file(svc.uploads_dir.join(&lost.filename)).unwrap();
        let report = svc.cleanup_missing_files().await.unwrap();
        assert_eq!(report, CleanupReport { checked: 2, removed: 1 });
        assert_eq!(count_rows(&svc, "likes", lost.id).await, 0);
        assert_eq!(count_rows(&svc, "comments", lost.id).await, 0);
        assert!(svc.get_photo(kept.id).await.is_ok());
        assert!(svc.uploads_dir.join(&kept.filename).exists());

        let report = svc.cleanup_missing_files().await.unwrap();
        assert_eq!(report, CleanupReport { checked: 1, removed: 0 });
    }

    #[tokio::test]
    async fn cleanup_skips_rows_that_fail_to_delete() {
        let (_tmp, svc) = service().await;
        let stuck = svc
            .insert_photo("Stuck", "Nature", "stuck.png")
            .await
            .unwrap();
        let gone = svc
            .insert_photo("Gone", "Nature", "gone.png")
            .await
            .unwrap();
        sqlx::query(&format!(
            "CREATE TRIGGER keep_photo BEFORE DELETE ON photos WHEN old.id = {}
             BEGIN SELECT RAISE(ABORT, 'locked'); END",
            stuck.id
        ))
        .execute(&*svc.db)
        .await
        .unwrap();

        let report = svc.cleanup_missing_files().await.unwrap();

        assert_eq!(report, CleanupReport { checked: 2, removed: 1 });
        assert!(svc.get_photo(stuck.id).await.is_ok());
        assert!(matches!(
            svc.get_photo(gone.id).await,
            Err(GalleryError::PhotoNotFound(_))
        ));
    }

    #[tokio::test]
    async fn cleanup_on_empty_catalog() {
        let (_tmp, svc) = service().await;
        let report = svc.cleanup_missing_files().await.unwrap();
        assert_eq!(report, CleanupReport::default());
    }

    #[tokio::test]
    async fn sort_defaults_to_newest_first() {
        let (_tmp, svc) = service().await;
        let base = Utc::now();
        let old = svc
            .insert_photo_at("Old", "Art", "old.png", base - Duration::hours(2))
            .await
            .unwrap();
        let mid = svc
            .insert_photo_at("Mid", "Art", "mid.png", base - Duration::hours(1))
            .await
            .unwrap();
        let new = svc
            .insert_photo_at("New", "Art", "new.png", base)
            .await
            .unwrap();

        let ids = |photos: Vec<PhotoSummary>| photos.into_iter().map(|p| p.id).collect::<Vec<_>>();

        let oldest = PhotoQuery {
            sort: PhotoSort::parse(Some("oldest")),
            ..Default::default()
        };
        assert_eq!(
            ids(svc.list_photos(&oldest).await.unwrap()),
            vec![old.id, mid.id, new.id]
        );

        for sort in [None, Some("newest"), Some("sideways")] {
            let query = PhotoQuery {
                sort: PhotoSort::parse(sort),
                ..Default::default()
            };
            assert_eq!(
                ids(svc.list_photos(&query).await.unwrap()),
                vec![new.id, mid.id, old.id]
            );
        }
    }

    #[tokio::test]
    async fn search_matches_title_or_category_case_insensitively() {
        let (_tmp, svc) = service().await;
        let sunset = svc
            .insert_photo("Sunset", "Nature", "sunset.png")
            .await
            .unwrap();
        let tower = svc
            .insert_photo("Tower", "Sunny Cities", "tower.png")
            .await
            .unwrap();
        svc.insert_photo("Forest", "Nature", "forest.png")
            .await
            .unwrap();

        let query = PhotoQuery {
            search: Some("SUN".into()),
            ..Default::default()
        };
        let mut ids: Vec<i64> = svc
            .list_photos(&query)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec![sunset.id, tower.id]);
    }

    #[tokio::test]
    async fn category_and_search_combine() {
        let (_tmp, svc) = service().await;
        let sunset = svc
            .insert_photo("Sunset", "Nature", "sunset.png")
            .await
            .unwrap();
        svc.insert_photo("Sunrise", "City", "sunrise.png")
            .await
            .unwrap();

        let query = PhotoQuery {
            category: Some("Nature".into()),
            search: Some("sun".into()),
            ..Default::default()
        };
        let photos = svc.list_photos(&query).await.unwrap();
        assert_eq!(photos.len(), 1);
        assert_eq!(photos[0].id, sunset.id);

        let all = PhotoQuery {
            category: Some("all".into()),
            ..Default::default()
        };
        assert_eq!(svc.list_photos(&all).await.unwrap().len(), 2);

        let exact = PhotoQuery {
            category: Some("nature".into()),
            ..Default::default()
        };
        assert!(svc.list_photos(&exact).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_wildcards_match_literally() {
        let (_tmp, svc) = service().await;
        let discount = svc
            .insert_photo("50% off", "Ads", "ads.png")
            .await
            .unwrap();
        svc.insert_photo("500 miles", "Travel", "miles.png")
            .await
            .unwrap();

        let query = PhotoQuery {
            search: Some("0%".into()),
            ..Default::default()
        };
        let photos = svc.list_photos(&query).await.unwrap();
        assert_eq!(photos.len(), 1);
        assert_eq!(photos[0].id, discount.id);
    }

    #[test]
    fn escape_like_escapes_wildcards() {
        assert_eq!(escape_like("a%b_c\\d"), "a\\%b\\_c\\\\d");
        assert_eq!(escape_like("plain"), "plain");
    }
}
