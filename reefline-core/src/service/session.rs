//! Session lookup
//!
//! The gate only needs "who is calling": an [`AuthSession`] or nothing.
//! Creating and revoking sessions belongs to the auth service that issues
//! the cookie.

use crate::domain::{AuthSession, Session, SessionUser};
use crate::error::Result;
use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Resolve the caller's session from request headers. `Ok(None)` when
    /// there is no token or it is unknown or expired.
    async fn get_session(&self, headers: &HeaderMap) -> Result<Option<AuthSession>>;
}

/// Extract a session token from the session cookie, falling back to an
/// `Authorization: Bearer` header for non-browser clients.
pub fn extract_session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(cookie_name) {
        let value = cookie.value().trim();
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

#[derive(FromRow)]
struct SessionRow {
    session_id: Uuid,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
    email: String,
    name: String,
    force_password_change: bool,
}

impl From<SessionRow> for AuthSession {
    fn from(row: SessionRow) -> Self {
        AuthSession {
            user: SessionUser {
                id: row.user_id,
                email: row.email,
                name: row.name,
                force_password_change: row.force_password_change,
            },
            session: Session {
                id: row.session_id,
                user_id: row.user_id,
                expires_at: row.expires_at,
            },
        }
    }
}

/// Session provider backed by the `sessions` and `users` tables
pub struct DbSessionProvider {
    pool: PgPool,
    cookie_name: String,
}

impl DbSessionProvider {
    pub fn new(pool: PgPool, cookie_name: impl Into<String>) -> Self {
        Self {
            pool,
            cookie_name: cookie_name.into(),
        }
    }
}

#[async_trait]
impl SessionProvider for DbSessionProvider {
    async fn get_session(&self, headers: &HeaderMap) -> Result<Option<AuthSession>> {
        let token = match extract_session_token(headers, &self.cookie_name) {
            Some(token) => token,
            None => return Ok(None),
        };

        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT s.id AS session_id, s.user_id, s.expires_at,
                   u.email, u.name, u.force_password_change
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token = $1 AND s.expires_at > NOW()
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(AuthSession::from))
    }
}
