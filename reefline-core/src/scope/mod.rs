//! Organization-scoped units of work (row-level isolation)
//!
//! [`OrgScope::with_org_scope`] opens one transaction, pins it to an
//! organization with a transaction-local `app.current_org_id` setting and,
//! when configured, drops to an unprivileged role so the row-level security
//! policies on tenant tables apply to every statement in it.
//!
//! The transaction handle is passed to the unit of work explicitly as
//! [`ScopedTx`]. Repository functions that write tenant data take it as a
//! parameter.

use crate::error::{AppError, Result};
use metrics::counter;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, warn};
use uuid::Uuid;

/// Setting read by the row-level security policies
pub const ORG_SETTING: &str = "app.current_org_id";

/// Future returned by a unit of work running inside a scope
pub type ScopeFuture<'t, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 't>>;

tokio::task_local! {
    // Organization of the scope currently open on this task. Only used to
    // reject nested scopes for a different organization.
    static ACTIVE_ORG: Uuid;
}

lazy_static::lazy_static! {
    static ref ROLE_REGEX: regex::Regex = regex::Regex::new(r"^[a-z_][a-z0-9_]*$").unwrap();
}

/// Transaction pinned to one organization
pub struct ScopedTx {
    org_id: Uuid,
    tx: Transaction<'static, Postgres>,
}

impl ScopedTx {
    pub fn org_id(&self) -> Uuid {
        self.org_id
    }

    /// Connection to run statements on; every statement shares the scope's transaction
    pub fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }
}

#[derive(Clone)]
pub struct OrgScope {
    pool: PgPool,
    rls_role: Option<String>,
}

impl OrgScope {
    pub fn new(pool: PgPool, rls_role: Option<String>) -> Result<Self> {
        if let Some(role) = &rls_role {
            if !ROLE_REGEX.is_match(role) {
                return Err(AppError::Configuration(format!(
                    "Invalid row-level security role name '{}'",
                    role
                )));
            }
        }
        Ok(Self { pool, rls_role })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn rls_role(&self) -> Option<&str> {
        self.rls_role.as_deref()
    }

    /// Run `work` inside a transaction pinned to `org_id`.
    ///
    /// Commits when `work` returns `Ok`, rolls back otherwise. If the
    /// returned future is dropped before completion the transaction is
    /// dropped with it and rolled back. Opening a scope for a different
    /// organization while one is active on this task fails with
    /// [`AppError::ScopeViolation`].
    pub async fn with_org_scope<T, F>(&self, org_id: Uuid, work: F) -> Result<T>
    where
        T: Send,
        F: for<'t> FnOnce(&'t mut ScopedTx) -> ScopeFuture<'t, T> + Send,
    {
        ensure_no_conflicting_scope(org_id)?;
        ACTIVE_ORG.scope(org_id, self.run(org_id, work)).await
    }

    async fn run<T, F>(&self, org_id: Uuid, work: F) -> Result<T>
    where
        T: Send,
        F: for<'t> FnOnce(&'t mut ScopedTx) -> ScopeFuture<'t, T> + Send,
    {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT set_config($1, $2, true)")
            .bind(ORG_SETTING)
            .bind(org_id.to_string())
            .execute(&mut *tx)
            .await?;

        if let Some(role) = &self.rls_role {
            // Identifiers cannot be bound; the name was validated in `new`
            sqlx::query(&format!("SET LOCAL ROLE \"{}\"", role))
                .execute(&mut *tx)
                .await?;
        }

        let mut scoped = ScopedTx { org_id, tx };

        match work(&mut scoped).await {
            Ok(value) => {
                scoped.tx.commit().await?;
                counter!("reefline_org_scope_transactions_total", "outcome" => "committed")
                    .increment(1);
                debug!(org_id = %org_id, "Organization scope committed");
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = scoped.tx.rollback().await {
                    warn!(org_id = %org_id, error = %rollback_err, "Scope rollback failed");
                }
                counter!("reefline_org_scope_transactions_total", "outcome" => "rolled_back")
                    .increment(1);
                Err(err)
            }
        }
    }
}

/// Organization of the scope open on the current task, if any
pub fn active_org() -> Option<Uuid> {
    ACTIVE_ORG.try_with(|id| *id).ok()
}

fn ensure_no_conflicting_scope(requested: Uuid) -> Result<()> {
    match active_org() {
        Some(active) if active != requested => {
            Err(AppError::ScopeViolation { active, requested })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn lazy_pool() -> PgPool {
        PgPoolOptions::new()
            .connect_lazy("postgres://reefline@localhost/unused")
            .unwrap()
    }

    #[tokio::test]
    async fn test_no_active_scope_outside_work() {
        assert!(active_org().is_none());
        assert!(ensure_no_conflicting_scope(Uuid::new_v4()).is_ok());
    }

    #[tokio::test]
    async fn test_same_org_nesting_allowed() {
        let org = Uuid::new_v4();
        ACTIVE_ORG
            .scope(org, async move {
                assert_eq!(active_org(), Some(org));
                assert!(ensure_no_conflicting_scope(org).is_ok());
            })
            .await;
    }

    #[tokio::test]
    async fn test_nested_scope_for_other_org_fails_before_touching_database() {
        let scope = OrgScope::new(lazy_pool(), None).unwrap();
        let outer = Uuid::new_v4();
        let inner = Uuid::new_v4();

        let result = ACTIVE_ORG
            .scope(outer, async {
                scope
                    .with_org_scope(inner, |_tx| Box::pin(async move { Ok(()) }))
                    .await
            })
            .await;

        match result {
            Err(AppError::ScopeViolation { active, requested }) => {
                assert_eq!(active, outer);
                assert_eq!(requested, inner);
            }
            other => panic!("expected scope violation, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_rejects_unsafe_role_name() {
        let result = OrgScope::new(lazy_pool(), Some("tenant\"; DROP TABLE x; --".to_string()));
        assert!(matches!(result, Err(AppError::Configuration(_))));

        assert!(OrgScope::new(lazy_pool(), Some("reefline_tenant".to_string())).is_ok());
    }
}
