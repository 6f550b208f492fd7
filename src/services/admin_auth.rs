//! Server-side admin gate: shared-secret login and session tokens kept in
//! the `admin_sessions` table.

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid password")]
    InvalidPassword,
    #[error("Admin session required")]
    SessionRequired,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Checks the admin password and tracks admin sessions.
///
/// Without a configured password the gate is open: `verify` accepts every
/// request and `login` refuses every password.
#[derive(Clone)]
pub struct AdminAuth {
    db: Arc<SqlitePool>,
    password: Option<Arc<str>>,
    session_ttl: Duration,
}

impl AdminAuth {
    pub fn new(db: Arc<SqlitePool>, password: Option<String>, session_ttl: Duration) -> Self {
        Self {
            db,
            password: password.filter(|p| !p.is_empty()).map(Arc::from),
            session_ttl,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.password.is_some()
    }

    /// Exchange the admin password for a new session token.
    pub async fn login(&self, candidate: &str) -> AuthResult<String> {
        let Some(expected) = self.password.as_deref() else {
            return Err(AuthError::InvalidPassword);
        };
        if !secrets_match(candidate, expected) {
            debug!("rejected admin login");
            return Err(AuthError::InvalidPassword);
        }

        let token = format!(
            "{}{}",
            Uuid::new_v4().simple(),
            Uuid::new_v4().simple()
        );
        self.purge_expired().await?;
        sqlx::query("INSERT INTO admin_sessions (token, created_at) VALUES (?, ?)")
            .bind(&token)
            .bind(Utc::now())
            .execute(&*self.db)
            .await?;

        info!("admin session started");
        Ok(token)
    }

    /// Drop every session older than the TTL.
    async fn purge_expired(&self) -> AuthResult<()> {
        let Some(cutoff) = Utc::now().checked_sub_signed(self.session_ttl) else {
            return Ok(());
        };
        let purged = sqlx::query("DELETE FROM admin_sessions WHERE created_at < ?")
            .bind(cutoff)
            .execute(&*self.db)
            .await?
            .rows_affected();
        if purged > 0 {
            debug!("purged {} expired admin sessions", purged);
        }
        Ok(())
    }

    pub async fn logout(&self, token: &str) -> AuthResult<()> {
        sqlx::query("DELETE FROM admin_sessions WHERE token = ?")
            .bind(token)
            .execute(&*self.db)
            .await?;
        Ok(())
    }

    /// Accept the request if `token` names a live session.
    ///
    /// Expired sessions are deleted when they are presented.
    pub async fn verify(&self, token: Option<&str>) -> AuthResult<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        let token = token.ok_or(AuthError::SessionRequired)?;

        let created_at = sqlx::query_scalar::<_, DateTime<Utc>>(
            "SELECT created_at FROM admin_sessions WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&*self.db)
        .await?;

        match created_at {
            None => Err(AuthError::SessionRequired),
            Some(created_at) if Utc::now() - created_at > self.session_ttl => {
                debug!("admin session expired");
                self.logout(token).await?;
                Err(AuthError::SessionRequired)
            }
            Some(_) => Ok(()),
        }
    }
}

/// Password comparison whose running time does not depend on where the
/// first differing byte sits.
fn secrets_match(candidate: &str, expected: &str) -> bool {
    let (candidate, expected) = (candidate.as_bytes(), expected.as_bytes());
    let diff = candidate
        .iter()
        .zip(expected)
        .fold(0u8, |acc, (c, e)| acc | (c ^ e));
    candidate.len() == expected.len() && diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn auth(password: Option<&str>, ttl: Duration) -> (tempfile::TempDir, AdminAuth) {
        let tmp = tempfile::tempdir().unwrap();
        let pool = db::testing::pool(tmp.path()).await;
        let auth = AdminAuth::new(Arc::new(pool), password.map(str::to_string), ttl);
        (tmp, auth)
    }

    async fn session_count(auth: &AdminAuth) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM admin_sessions")
            .fetch_one(&*auth.db)
            .await
            .unwrap()
    }

    #[test]
    fn password_prefixes_and_extensions_do_not_match() {
        assert!(secrets_match("hunter2", "hunter2"));
        assert!(!secrets_match("hunter", "hunter2"));
        assert!(!secrets_match("hunter22", "hunter2"));
        assert!(!secrets_match("Hunter2", "hunter2"));
        assert!(!secrets_match("", "hunter2"));
    }

    #[tokio::test]
    async fn login_issues_a_verifiable_session() {
        let (_tmp, auth) = auth(Some("s3cret"), Duration::hours(1)).await;

        assert!(matches!(
            auth.login("wrong").await,
            Err(AuthError::InvalidPassword)
        ));

        let token = auth.login("s3cret").await.unwrap();
        auth.verify(Some(&token)).await.unwrap();
        assert!(matches!(
            auth.verify(Some("forged")).await,
            Err(AuthError::SessionRequired)
        ));
        assert!(matches!(
            auth.verify(None).await,
            Err(AuthError::SessionRequired)
        ));

        auth.logout(&token).await.unwrap();
        assert!(auth.verify(Some(&token)).await.is_err());
    }

    #[tokio::test]
    async fn expired_sessions_are_rejected() {
        let (_tmp, auth) = auth(Some("s3cret"), Duration::seconds(-1)).await;

        let token = auth.login("s3cret").await.unwrap();
        assert!(matches!(
            auth.verify(Some(&token)).await,
            Err(AuthError::SessionRequired)
        ));
    }

    #[tokio::test]
    async fn login_purges_expired_sessions() {
        let (_tmp, auth) = auth(Some("s3cret"), Duration::seconds(-1)).await;

        auth.login("s3cret").await.unwrap();
        auth.login("s3cret").await.unwrap();
        let latest = auth.login("s3cret").await.unwrap();

        assert_eq!(session_count(&auth).await, 1);
        let remaining: String = sqlx::query_scalar("SELECT token FROM admin_sessions")
            .fetch_one(&*auth.db)
            .await
            .unwrap();
        assert_eq!(remaining, latest);
    }

    #[tokio::test]
    async fn login_keeps_live_sessions() {
        let (_tmp, auth) = auth(Some("s3cret"), Duration::hours(1)).await;

        let first = auth.login("s3cret").await.unwrap();
        auth.login("s3cret").await.unwrap();

        assert_eq!(session_count(&auth).await, 2);
        auth.verify(Some(&first)).await.unwrap();
    }

    #[tokio::test]
    async fn gate_is_open_without_password() {
        let (_tmp, auth) = auth(None, Duration::hours(1)).await;

        assert!(!auth.is_enabled());
        auth.verify(None).await.unwrap();
        assert!(auth.login("").await.is_err());
    }
}
