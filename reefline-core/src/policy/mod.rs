//! Authorization checks for tenant route handlers.
//!
//! The checks read an already-assembled [`OrgContext`]; none of them touch
//! the database.

use crate::domain::{Limit, OrgContext, Role};
use crate::error::AppError;
use serde::Serialize;

pub type PolicyResult<T> = std::result::Result<T, AppError>;

/// Human-readable names for plan feature keys
const FEATURE_NAMES: &[(&str, &str)] = &[
    ("hasPos", "Point of Sale"),
    ("hasEquipmentRentals", "Equipment Rentals"),
    ("hasTraining", "Training Management"),
    ("hasAdvancedNotifications", "Advanced Notifications"),
    ("hasIntegrations", "Integrations"),
    ("hasApiAccess", "API Access"),
    ("hasCustomDomain", "Custom Domain"),
];

/// Resources whose count is capped by the plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Customers,
    Tours,
    Bookings,
}

impl ResourceKind {
    fn noun(&self) -> &'static str {
        match self {
            ResourceKind::Customers => "customers",
            ResourceKind::Tours => "tours",
            ResourceKind::Bookings => "bookings this month",
        }
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = AppError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "customers" => Ok(ResourceKind::Customers),
            "tours" => Ok(ResourceKind::Tours),
            "bookings" => Ok(ResourceKind::Bookings),
            other => Err(AppError::BadRequest(format!(
                "Unknown resource kind '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LimitCheck {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub fn require_role(ctx: &OrgContext, allowed: &[Role]) -> PolicyResult<()> {
    if ctx.membership.has_role(allowed) {
        return Ok(());
    }
    let names: Vec<&str> = allowed.iter().map(Role::as_str).collect();
    Err(AppError::Forbidden(format!(
        "This action requires one of the following roles: {}",
        names.join(", ")
    )))
}

pub fn require_premium(ctx: &OrgContext, feature_key: &str) -> PolicyResult<()> {
    if ctx.is_premium {
        return Ok(());
    }
    Err(AppError::Forbidden(format!(
        "{} is available on paid plans. Upgrade to unlock it.",
        feature_display_name(feature_key)
    )))
}

/// Non-failing admission check for UI warnings and create handlers
pub fn check_limit(ctx: &OrgContext, kind: ResourceKind) -> LimitCheck {
    let (allowed, limit) = match kind {
        ResourceKind::Customers => (ctx.can_add_customer, ctx.limits.customers),
        ResourceKind::Tours => (ctx.can_add_tour, ctx.limits.tours),
        ResourceKind::Bookings => (ctx.can_add_booking, ctx.limits.bookings_per_month),
    };

    if allowed {
        return LimitCheck {
            allowed: true,
            message: None,
        };
    }

    let message = match limit {
        Limit::Bounded(max) => format!(
            "You have reached your plan limit of {} {}. Upgrade to add more.",
            max,
            kind.noun()
        ),
        Limit::Unlimited => format!("Adding {} is not available right now.", kind.noun()),
    };
    LimitCheck {
        allowed: false,
        message: Some(message),
    }
}

/// Known display name, else the key title-cased without its `has` prefix
pub fn feature_display_name(feature_key: &str) -> String {
    if let Some((_, name)) = FEATURE_NAMES.iter().find(|(key, _)| *key == feature_key) {
        return (*name).to_string();
    }

    let stripped = feature_key
        .strip_prefix("has_")
        .or_else(|| {
            feature_key
                .strip_prefix("has")
                .filter(|rest| rest.starts_with(|c: char| c.is_ascii_uppercase()))
        })
        .unwrap_or(feature_key);

    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    for c in stripped.chars() {
        if c == '_' || c == '-' || c == ' ' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        } else if c.is_uppercase() && !current.is_empty() {
            words.push(std::mem::take(&mut current));
            current.push(c);
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
        .iter()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
