//! Usage snapshot for one organization

use serde::Serialize;

/// Live counts compared against `TierLimits`. Computed per request, never cached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub customers: u64,
    pub tours: u64,
    pub bookings_this_month: u64,
}
