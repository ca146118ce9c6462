//! Liveness and readiness endpoints for the load balancer

use crate::scope::OrgScope;
use crate::state::HasOrgScope;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessResponse {
    pub database: bool,
    /// `None` when no row-level security role is configured
    pub scope_role: Option<bool>,
}

impl ReadinessResponse {
    pub fn is_ready(&self) -> bool {
        self.database && self.scope_role != Some(false)
    }
}

pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Ready once the database answers and the connection may assume the scope role
pub async fn ready<S: HasOrgScope>(State(state): State<S>) -> impl IntoResponse {
    let readiness = check(state.org_scope()).await;
    let status = if readiness.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(readiness))
}

async fn check(scope: &OrgScope) -> ReadinessResponse {
    let database = sqlx::query("SELECT 1").execute(scope.pool()).await.is_ok();

    let scope_role = match scope.rls_role() {
        Some(role) if database => {
            let granted: Result<(bool,), _> =
                sqlx::query_as("SELECT pg_has_role(current_user, $1, 'MEMBER')")
                    .bind(role)
                    .fetch_one(scope.pool())
                    .await;
            match granted {
                Ok((granted,)) => Some(granted),
                Err(e) => {
                    // Missing role raises rather than returning false
                    warn!(role = %role, error = %e, "Scope role check failed");
                    Some(false)
                }
            }
        }
        Some(_) => Some(false),
        None => None,
    };

    ReadinessResponse {
        database,
        scope_role,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_readiness_requires_database_and_granted_role() {
        let cases = [
            (true, None, true),
            (true, Some(true), true),
            (true, Some(false), false),
            (false, None, false),
            (false, Some(false), false),
        ];
        for (database, scope_role, ready) in cases {
            let readiness = ReadinessResponse {
                database,
                scope_role,
            };
            assert_eq!(readiness.is_ready(), ready, "{:?}", readiness);
        }
    }

    #[test]
    fn test_readiness_serializes_camel_case() {
        let json = serde_json::to_value(ReadinessResponse {
            database: true,
            scope_role: None,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"database": true, "scopeRole": null}));
    }
}
