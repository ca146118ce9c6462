//! Usage counting queries

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsageRepository: Send + Sync {
    async fn count_customers(&self, organization_id: Uuid) -> Result<u64>;
    async fn count_tours(&self, organization_id: Uuid) -> Result<u64>;
    async fn count_bookings_since(
        &self,
        organization_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<u64>;
}

pub struct UsageRepositoryImpl {
    pool: PgPool,
}

impl UsageRepositoryImpl {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsageRepository for UsageRepositoryImpl {
    async fn count_customers(&self, organization_id: Uuid) -> Result<u64> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM customers WHERE organization_id = $1")
                .bind(organization_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0.max(0) as u64)
    }

    async fn count_tours(&self, organization_id: Uuid) -> Result<u64> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM tours WHERE organization_id = $1 AND is_active = TRUE",
        )
        .bind(organization_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0.max(0) as u64)
    }

    async fn count_bookings_since(
        &self,
        organization_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<u64> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM bookings WHERE organization_id = $1 AND created_at >= $2",
        )
        .bind(organization_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0.max(0) as u64)
    }
}
