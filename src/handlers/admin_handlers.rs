//! Admin handlers: login, listing, upload, deletion and cleanup.
//! Everything except `login` sits behind `require_admin`.

use crate::{
    errors::AppError,
    handlers::{
        admin_gate::bearer_token,
        extract::{ApiJson, ApiPath},
        photo_handlers::MessageResponse,
    },
    models::photo::PhotoSummary,
    services::gallery_service::{GalleryService, StoredImage},
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, State},
    http::HeaderMap,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::io;
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub id: i64,
    pub message: String,
    pub filename: String,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub message: String,
    #[serde(rename = "deletedCount")]
    pub deleted_count: usize,
}

/// Fields collected from the upload form. Multipart fields arrive in any
/// order, so the image may already be on disk when metadata is found
/// missing.
#[derive(Default)]
struct UploadForm {
    title: Option<String>,
    category: Option<String>,
    image: Option<StoredImage>,
}

/// POST `/admin/login` — exchange the admin password for a session token.
pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginBody>,
) -> Result<Json<LoginResponse>, AppError> {
    let token = state.auth.login(&body.password).await?;
    Ok(Json(LoginResponse { token }))
}

/// POST `/admin/logout`
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, AppError> {
    if let Some(token) = bearer_token(&headers) {
        state.auth.logout(&token).await?;
    }
    Ok(Json(MessageResponse {
        message: "Logged out".into(),
    }))
}

/// GET `/admin/photos` — every photo, newest first.
pub async fn list_photos(
    State(state): State<AppState>,
) -> Result<Json<Vec<PhotoSummary>>, AppError> {
    Ok(Json(state.gallery.list_all_photos().await?))
}

/// POST `/admin/upload` — multipart form with `title`, `category`, `image`.
pub async fn upload_photo(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut form = UploadForm::default();
    if let Err(err) = read_upload_form(&state.gallery, &mut multipart, &mut form).await {
        if let Some(image) = form.image.take() {
            state.gallery.discard_image(&image).await;
        }
        return Err(err);
    }

    let photo = state
        .gallery
        .register_photo(form.title.as_deref(), form.category.as_deref(), form.image)
        .await?;

    Ok(Json(UploadResponse {
        id: photo.id,
        message: "Photo uploaded successfully".into(),
        filename: photo.filename,
    }))
}

/// DELETE `/admin/delete/{id}`
pub async fn delete_photo(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    state.gallery.delete_photo(id).await?;
    Ok(Json(MessageResponse {
        message: "Photo deleted successfully".into(),
    }))
}

/// DELETE `/admin/cleanup` — drop rows whose image file is gone.
pub async fn cleanup(State(state): State<AppState>) -> Result<Json<CleanupResponse>, AppError> {
    let report = state.gallery.cleanup_missing_files().await?;
    let message = if report.checked == 0 {
        "No photos to check".to_string()
    } else {
        format!(
            "Cleanup completed. Removed {} orphaned records.",
            report.removed
        )
    };

    Ok(Json(CleanupResponse {
        message,
        deleted_count: report.removed,
    }))
}

async fn read_upload_form(
    service: &GalleryService,
    multipart: &mut Multipart,
    form: &mut UploadForm,
) -> Result<(), AppError> {
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => form.title = Some(field.text().await?),
            "category" => form.category = Some(field.text().await?),
            "image" => {
                if form.image.is_some() {
                    return Err(AppError::bad_request("Only one image may be uploaded"));
                }
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let stream = field.map(|chunk| chunk.map_err(io::Error::other));
                let image = service
                    .store_image(file_name.as_deref(), content_type.as_deref(), stream)
                    .await?;
                form.image = Some(image);
            }
            other => debug!("ignoring multipart field `{}`", other),
        }
    }
    Ok(())
}
