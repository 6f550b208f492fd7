//! Visitor-facing handlers: listings, comments, likes and the uploaded
//! image files themselves.

use crate::{
    errors::AppError,
    handlers::extract::{ApiPath, ApiQuery},
    models::{comment::Comment, photo::PhotoSummary},
    services::gallery_service::{PhotoQuery, PhotoSort},
    state::AppState,
};
use axum::{
    Json,
    body::Body,
    extract::{State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

/// Query params accepted by `GET /photos`.
#[derive(Debug, Default, Deserialize)]
pub struct PhotoListQuery {
    pub category: Option<String>,
    pub sort: Option<String>,
    pub search: Option<String>,
}

impl From<PhotoListQuery> for PhotoQuery {
    fn from(q: PhotoListQuery) -> Self {
        PhotoQuery {
            sort: PhotoSort::parse(q.sort.as_deref()),
            category: q.category,
            search: q.search,
        }
    }
}

/// Request body for `POST /comment/{photo_id}`.
#[derive(Debug, Default, Deserialize)]
pub struct CommentBody {
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CommentCreated {
    pub id: i64,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct LikeCount {
    pub count: i64,
}

/// GET `/photos` — filtered listing, supports ?category=&sort=&search=
pub async fn list_photos(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<PhotoListQuery>,
) -> Result<Json<Vec<PhotoSummary>>, AppError> {
    let photos = state.gallery.list_photos(&q.into()).await?;
    Ok(Json(photos))
}

/// GET `/photos/{id}` — a single photo with its counts.
pub async fn get_photo(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<PhotoSummary>, AppError> {
    Ok(Json(state.gallery.get_photo(id).await?))
}

/// POST `/comment/{photo_id}`
pub async fn add_comment(
    State(state): State<AppState>,
    ApiPath(photo_id): ApiPath<i64>,
    payload: Result<Json<CommentBody>, JsonRejection>,
) -> Result<Json<CommentCreated>, AppError> {
    // A request without a JSON content type carries no comment at all.
    let body = match payload {
        Ok(Json(body)) => body,
        Err(JsonRejection::MissingJsonContentType(_)) => CommentBody::default(),
        Err(rejection) => return Err(rejection.into()),
    };
    let text = body.comment.unwrap_or_default();
    let comment = state.gallery.add_comment(photo_id, &text).await?;
    Ok(Json(CommentCreated {
        id: comment.id,
        message: "Comment added successfully".into(),
    }))
}

/// GET `/comments/{photo_id}` — newest first.
pub async fn list_comments(
    State(state): State<AppState>,
    ApiPath(photo_id): ApiPath<i64>,
) -> Result<Json<Vec<Comment>>, AppError> {
    Ok(Json(state.gallery.list_comments(photo_id).await?))
}

/// POST `/like/{photo_id}`
pub async fn add_like(
    State(state): State<AppState>,
    ApiPath(photo_id): ApiPath<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    state.gallery.add_like(photo_id).await?;
    Ok(Json(MessageResponse {
        message: "Like added successfully".into(),
    }))
}

/// GET `/likes/{photo_id}`
pub async fn like_count(
    State(state): State<AppState>,
    ApiPath(photo_id): ApiPath<i64>,
) -> Result<Json<LikeCount>, AppError> {
    let count = state.gallery.like_count(photo_id).await?;
    Ok(Json(LikeCount { count }))
}

/// GET `/uploads/{filename}` — stream a stored image.
pub async fn serve_upload(
    State(state): State<AppState>,
    ApiPath(filename): ApiPath<String>,
) -> Result<Response, AppError> {
    let (file, media_type) = state.gallery.open_upload(&filename).await?;
    let body = Body::from_stream(ReaderStream::new(file));

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(media_type));
    Ok(response)
}
