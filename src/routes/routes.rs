//! Defines routes for the gallery API.
//!
//! ## Structure
//! - **Visitor endpoints**
//!   - `GET    /photos` — filtered listing (category, sort, search)
//!   - `GET    /photos/{id}` — one photo with counts
//!   - `POST   /comment/{photo_id}` / `GET /comments/{photo_id}`
//!   - `POST   /like/{photo_id}` / `GET /likes/{photo_id}`
//!   - `GET    /uploads/{filename}` — stored image files
//!
//! - **Admin endpoints** (bearer session required, except `login`)
//!   - `POST   /admin/login`, `POST /admin/logout`
//!   - `GET    /admin/photos`
//!   - `POST   /admin/upload`
//!   - `DELETE /admin/delete/{id}`
//!   - `DELETE /admin/cleanup`

use crate::{
    handlers::{
        admin_gate::require_admin,
        admin_handlers,
        health_handlers::{healthz, readyz},
        photo_handlers::{
            add_comment, add_like, get_photo, like_count, list_comments, list_photos, serve_upload,
        },
    },
    services::upload::MAX_UPLOAD_BYTES,
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
};
use std::path::Path;
use tower_http::services::ServeDir;

/// Multipart framing and text fields on top of the image itself; the
/// image size limit is enforced while streaming.
const UPLOAD_BODY_LIMIT: usize = MAX_UPLOAD_BYTES as usize + 1024 * 1024;

/// Build the application router with state applied.
///
/// When `public_dir` is given, its files are served for every path no
/// route claims.
pub fn routes(state: AppState, public_dir: Option<&Path>) -> Router {
    let admin = Router::new()
        .route("/photos", get(admin_handlers::list_photos))
        .route(
            "/upload",
            post(admin_handlers::upload_photo).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/delete/{id}", delete(admin_handlers::delete_photo))
        .route("/cleanup", delete(admin_handlers::cleanup))
        .route("/logout", post(admin_handlers::logout))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin))
        .route("/login", post(admin_handlers::login));

    let router = Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/photos", get(list_photos))
        .route("/photos/{id}", get(get_photo))
        .route("/comment/{photo_id}", post(add_comment))
        .route("/comments/{photo_id}", get(list_comments))
        .route("/like/{photo_id}", post(add_like))
        .route("/likes/{photo_id}", get(like_count))
        .route("/uploads/{filename}", get(serve_upload))
        .nest("/admin", admin)
        .with_state(state);

    match public_dir {
        Some(dir) => router
            .fallback_service(ServeDir::new(dir).append_index_html_on_directories(true)),
        None => router,
    }
}
