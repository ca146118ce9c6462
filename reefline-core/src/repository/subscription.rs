//! Subscription repository

use crate::domain::Subscription;
use crate::error::{AppError, Result};
use crate::scope::ScopedTx;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn find_by_organization(&self, organization_id: Uuid) -> Result<Option<Subscription>>;
}

pub struct SubscriptionRepositoryImpl {
    pool: PgPool,
}

impl SubscriptionRepositoryImpl {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionRepository for SubscriptionRepositoryImpl {
    async fn find_by_organization(&self, organization_id: Uuid) -> Result<Option<Subscription>> {
        let subscription = sqlx::query_as::<_, Subscription>(
            r#"
            SELECT id, organization_id, plan, plan_id, status, created_at, updated_at
            FROM subscriptions
            WHERE organization_id = $1
            "#,
        )
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(subscription)
    }
}

/// Return the scope organization's subscription, creating a free one if the
/// row does not exist yet. The unique index on `organization_id` makes
/// concurrent callers converge on a single row.
pub async fn ensure_for_org(tx: &mut ScopedTx) -> Result<Subscription> {
    let organization_id = tx.org_id();

    sqlx::query(
        r#"
        INSERT INTO subscriptions (id, organization_id, plan, plan_id, status, created_at, updated_at)
        VALUES ($1, $2, 'free', NULL, 'active', NOW(), NOW())
        ON CONFLICT (organization_id) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(organization_id)
    .execute(tx.conn())
    .await?;

    sqlx::query_as::<_, Subscription>(
        r#"
        SELECT id, organization_id, plan, plan_id, status, created_at, updated_at
        FROM subscriptions
        WHERE organization_id = $1
        "#,
    )
    .bind(organization_id)
    .fetch_optional(tx.conn())
    .await?
    .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to ensure subscription")))
}
