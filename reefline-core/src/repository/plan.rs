//! Plan repository

use crate::domain::Plan;
use crate::error::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlanRepository: Send + Sync {
    /// Active plan by primary key
    async fn find_active_by_id(&self, id: Uuid) -> Result<Option<Plan>>;
    /// Active plan by its (legacy) name, case-insensitive
    async fn find_active_by_name(&self, name: &str) -> Result<Option<Plan>>;
}

pub struct PlanRepositoryImpl {
    pool: PgPool,
}

impl PlanRepositoryImpl {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlanRepository for PlanRepositoryImpl {
    async fn find_active_by_id(&self, id: Uuid) -> Result<Option<Plan>> {
        let plan = sqlx::query_as::<_, Plan>(
            r#"
            SELECT id, name, display_name, monthly_price_cents, features, limits, is_active
            FROM subscription_plans
            WHERE id = $1 AND is_active = TRUE
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(plan)
    }

    async fn find_active_by_name(&self, name: &str) -> Result<Option<Plan>> {
        let plan = sqlx::query_as::<_, Plan>(
            r#"
            SELECT id, name, display_name, monthly_price_cents, features, limits, is_active
            FROM subscription_plans
            WHERE lower(name) = lower($1) AND is_active = TRUE
            LIMIT 1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(plan)
    }
}
