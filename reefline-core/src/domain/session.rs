//! Session models returned by the session collaborator

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// The authenticated account behind a session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    /// Set by an administrator; the user must change their password before
    /// using anything else
    pub force_password_change: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthSession {
    pub user: SessionUser,
    pub session: Session,
}
