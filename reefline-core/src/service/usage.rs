//! Usage aggregation

use crate::domain::Usage;
use crate::error::Result;
use crate::repository::UsageRepository;
use chrono::{DateTime, Utc};
use metrics::counter;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

pub struct UsageAggregator<U: UsageRepository> {
    repo: Arc<U>,
}

impl<U: UsageRepository> UsageAggregator<U> {
    pub fn new(repo: Arc<U>) -> Self {
        Self { repo }
    }

    /// Count live usage. The three counts run concurrently; a failed count
    /// degrades to zero so one bad query never blocks the request.
    pub async fn aggregate(&self, organization_id: Uuid, period_start: DateTime<Utc>) -> Usage {
        let (customers, tours, bookings) = tokio::join!(
            self.repo.count_customers(organization_id),
            self.repo.count_tours(organization_id),
            self.repo.count_bookings_since(organization_id, period_start),
        );

        Usage {
            customers: or_zero(organization_id, "customers", customers),
            tours: or_zero(organization_id, "tours", tours),
            bookings_this_month: or_zero(organization_id, "bookings", bookings),
        }
    }
}

fn or_zero(organization_id: Uuid, query: &'static str, result: Result<u64>) -> u64 {
    match result {
        Ok(count) => count,
        Err(e) => {
            warn!(
                org_id = %organization_id,
                query = query,
                error = %e,
                "Usage count failed; reporting 0"
            );
            counter!("reefline_usage_query_failures_total", "query" => query).increment(1);
            0
        }
    }
}
