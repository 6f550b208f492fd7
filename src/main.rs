use anyhow::{Context, Result};
use axum::Router;
use std::{fs, io::ErrorKind, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod db;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;

use services::{admin_auth::AdminAuth, gallery_service::GalleryService};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting photo-gallery with config: {:?}", cfg);

    // --- Ensure uploads directory exists ---
    if !Path::new(&cfg.uploads_dir).exists() {
        fs::create_dir_all(&cfg.uploads_dir)
            .with_context(|| format!("creating uploads directory {}", cfg.uploads_dir))?;
        tracing::info!("Created uploads directory at {}", cfg.uploads_dir);
    }

    // --- Initialize SQLite connection ---
    let db_url = &cfg.database_url;
    let db_path = db_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .trim_start_matches("file:");
    tracing::debug!("Interpreted SQLite path => {}", db_path);

    // Create parent directory if needed
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    let options = db::connect_options(db_url)
        .with_context(|| format!("parsing database URL `{}`", db_url))?;
    let db = Arc::new(db::connect(options).await?);

    db::run_migrations(&db).await?;

    // --- Handle migration mode ---
    if migrate {
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    // --- Initialize core services ---
    let gallery = GalleryService::new(db.clone(), cfg.uploads_dir.clone());
    let auth = AdminAuth::new(
        db.clone(),
        cfg.admin_password.clone(),
        chrono::Duration::seconds(
            i64::try_from(cfg.session_ttl_secs)
                .unwrap_or(i64::MAX)
                .min(i64::MAX / 1000),
        ),
    );
    if !auth.is_enabled() {
        tracing::warn!("No admin password configured; /admin routes are not gated");
    }

    // --- Build router ---
    let app: Router = routes::routes::routes(
        state::AppState::new(gallery, auth),
        cfg.public_dir.as_deref().map(Path::new),
    );

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
