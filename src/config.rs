use anyhow::{Context, Result};
use clap::Parser;
use std::{env, fmt};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub uploads_dir: String,
    pub database_url: String,
    pub admin_password: Option<String>,
    pub session_ttl_secs: u64,
    pub public_dir: Option<String>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Photo gallery API")]
pub struct Args {
    /// Host to bind to (overrides GALLERY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides GALLERY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where uploaded images are stored (overrides GALLERY_UPLOADS_DIR)
    #[arg(long)]
    pub uploads_dir: Option<String>,

    /// Database URL (overrides GALLERY_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Shared admin password (overrides GALLERY_ADMIN_PASSWORD); the admin
    /// gate is disabled when neither is set
    #[arg(long)]
    pub admin_password: Option<String>,

    /// Admin session lifetime in seconds (overrides GALLERY_SESSION_TTL_SECS)
    #[arg(long)]
    pub session_ttl_secs: Option<u64>,

    /// Directory of static UI assets served as fallback (overrides GALLERY_PUBLIC_DIR)
    #[arg(long)]
    pub public_dir: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        Ok((Self::merge(args)?, migrate))
    }

    /// Fill every setting not given on the command line from the
    /// environment, then from defaults.
    fn merge(args: Args) -> Result<Self> {
        let env_host = env::var("GALLERY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_env("GALLERY_PORT", 3000u16)?;
        let env_uploads = env::var("GALLERY_UPLOADS_DIR").unwrap_or_else(|_| "./uploads".into());
        let env_db = env::var("GALLERY_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/gallery.db".into());
        let env_ttl = parse_env("GALLERY_SESSION_TTL_SECS", 12 * 60 * 60u64)?;

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            uploads_dir: args.uploads_dir.unwrap_or(env_uploads),
            database_url: args.database_url.unwrap_or(env_db),
            admin_password: args
                .admin_password
                .or_else(|| env::var("GALLERY_ADMIN_PASSWORD").ok())
                .filter(|p| !p.is_empty()),
            session_ttl_secs: args.session_ttl_secs.unwrap_or(env_ttl),
            public_dir: args
                .public_dir
                .or_else(|| env::var("GALLERY_PUBLIC_DIR").ok()),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("uploads_dir", &self.uploads_dir)
            .field("database_url", &self.database_url)
            .field(
                "admin_password",
                &self.admin_password.as_ref().map(|_| "<redacted>"),
            )
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("public_dir", &self.public_dir)
            .finish()
    }
}

fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}
