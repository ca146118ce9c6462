//! Plan and entitlement models
//!
//! `Plan` mirrors the stored row, where a limit of `-1` means "unlimited".
//! `TierLimits` is the request-usable form: the sentinel is mapped to
//! [`Limit::Unlimited`] once, in [`TierLimits::from_plan`], and never
//! compared numerically afterwards.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use sqlx::FromRow;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Raw value stored in a plan to mean "no limit"
pub const UNLIMITED_SENTINEL: i64 = -1;

mod free_tier {
    pub const USERS: i64 = 1;
    pub const CUSTOMERS: i64 = 50;
    pub const TOURS: i64 = 3;
    pub const BOOKINGS_PER_MONTH: i64 = 20;
    pub const STORAGE_GB: i64 = 1;
}

/// Boolean feature flags of a plan. Absent flags read as `false`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanFeatures {
    #[serde(default)]
    pub has_pos: bool,
    #[serde(default)]
    pub has_equipment_rentals: bool,
    #[serde(default)]
    pub has_training: bool,
    #[serde(default)]
    pub has_advanced_notifications: bool,
    #[serde(default)]
    pub has_integrations: bool,
    #[serde(default)]
    pub has_api_access: bool,
    #[serde(default)]
    pub has_custom_domain: bool,
    /// Flags added to plans after this struct was written
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl PlanFeatures {
    /// Look up a flag by its storage key (`hasPos`, `has_pos`, or an extra key)
    pub fn is_enabled(&self, key: &str) -> bool {
        match key {
            "hasPos" | "has_pos" => self.has_pos,
            "hasEquipmentRentals" | "has_equipment_rentals" => self.has_equipment_rentals,
            "hasTraining" | "has_training" => self.has_training,
            "hasAdvancedNotifications" | "has_advanced_notifications" => {
                self.has_advanced_notifications
            }
            "hasIntegrations" | "has_integrations" => self.has_integrations,
            "hasApiAccess" | "has_api_access" => self.has_api_access,
            "hasCustomDomain" | "has_custom_domain" => self.has_custom_domain,
            other => self
                .extra
                .get(other)
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }
    }
}

fn default_users() -> i64 {
    free_tier::USERS
}
fn default_customers() -> i64 {
    free_tier::CUSTOMERS
}
fn default_tours() -> i64 {
    free_tier::TOURS
}
fn default_bookings() -> i64 {
    free_tier::BOOKINGS_PER_MONTH
}
fn default_storage() -> i64 {
    free_tier::STORAGE_GB
}

/// Numeric limits as stored on the plan row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanLimits {
    #[serde(default = "default_users")]
    pub users: i64,
    #[serde(default = "default_customers")]
    pub customers: i64,
    #[serde(default = "default_tours", alias = "toursPerMonth")]
    pub tours: i64,
    #[serde(default = "default_bookings")]
    pub bookings_per_month: i64,
    #[serde(default = "default_storage")]
    pub storage_gb: i64,
}

impl Default for PlanLimits {
    fn default() -> Self {
        Self {
            users: free_tier::USERS,
            customers: free_tier::CUSTOMERS,
            tours: free_tier::TOURS,
            bookings_per_month: free_tier::BOOKINGS_PER_MONTH,
            storage_gb: free_tier::STORAGE_GB,
        }
    }
}

/// Plan entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: Uuid,
    pub name: String,
    pub display_name: String,
    pub monthly_price_cents: i64,
    #[sqlx(json)]
    pub features: PlanFeatures,
    #[sqlx(json)]
    pub limits: PlanLimits,
    pub is_active: bool,
}

impl Plan {
    pub fn is_paid(&self) -> bool {
        self.monthly_price_cents > 0
    }
}

/// A single entitlement bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Bounded(u64),
    Unlimited,
}

impl Limit {
    /// Map a stored value: `-1` is unlimited, other negatives clamp to zero.
    pub fn from_raw(raw: i64) -> Self {
        if raw == UNLIMITED_SENTINEL {
            Limit::Unlimited
        } else {
            Limit::Bounded(raw.max(0) as u64)
        }
    }

    /// Whether one more item fits under this limit given current usage
    pub fn allows(&self, usage: u64) -> bool {
        match self {
            Limit::Unlimited => true,
            Limit::Bounded(max) => usage < *max,
        }
    }

    pub fn remaining(&self, usage: u64) -> Option<u64> {
        match self {
            Limit::Unlimited => None,
            Limit::Bounded(max) => Some(max.saturating_sub(usage)),
        }
    }

    pub fn is_unlimited(&self) -> bool {
        matches!(self, Limit::Unlimited)
    }
}

// Unlimited serializes as null
impl Serialize for Limit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Limit::Bounded(n) => serializer.serialize_u64(*n),
            Limit::Unlimited => serializer.serialize_none(),
        }
    }
}

impl std::fmt::Display for Limit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Limit::Bounded(n) => write!(f, "{}", n),
            Limit::Unlimited => f.write_str("unlimited"),
        }
    }
}

/// Normalized entitlements for one organization
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierLimits {
    pub users: Limit,
    pub customers: Limit,
    pub tours: Limit,
    pub bookings_per_month: Limit,
    pub storage_gb: Limit,
    pub features: PlanFeatures,
}

impl TierLimits {
    /// The only conversion from stored plan values to request limits
    pub fn from_plan(limits: &PlanLimits, features: &PlanFeatures) -> Self {
        Self {
            users: Limit::from_raw(limits.users),
            customers: Limit::from_raw(limits.customers),
            tours: Limit::from_raw(limits.tours),
            bookings_per_month: Limit::from_raw(limits.bookings_per_month),
            storage_gb: Limit::from_raw(limits.storage_gb),
            features: features.clone(),
        }
    }

    /// Limits applied when no active plan row can be found
    pub fn free_tier() -> Self {
        Self::from_plan(&PlanLimits::default(), &PlanFeatures::default())
    }
}
