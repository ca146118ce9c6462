//! Time source for usage windows

use chrono::{DateTime, Datelike, TimeZone, Utc};

/// Supplies "now" and the start of the current billing period.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Start of the current calendar month (UTC)
    fn period_start(&self) -> DateTime<Utc> {
        start_of_month(self.now())
    }
}

pub fn start_of_month(at: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(at.year(), at.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(at)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a fixed instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
