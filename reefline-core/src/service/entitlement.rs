//! Plan entitlement resolution
//!
//! Turns an organization's subscription into the plan in effect and its
//! normalized [`TierLimits`]. The lookup order is an explicit list so the
//! precedence between `plan_id` and the legacy plan name is visible in one
//! place.

use crate::domain::{Plan, Subscription, SubscriptionStatus, TierLimits};
use crate::repository::PlanRepository;
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Name of the plan an organization without a subscription is on
pub const FREE_PLAN_NAME: &str = "free";

/// One step of the plan lookup chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanLookup {
    ById(Uuid),
    ByName(String),
}

/// Where the limits in a [`ResolvedPlan`] came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanSource {
    PlanId,
    PlanName,
    /// No active plan row matched; hardcoded free tier
    Fallback,
}

#[derive(Debug, Clone)]
pub struct ResolvedPlan {
    pub plan: Option<Plan>,
    pub limits: TierLimits,
    pub source: PlanSource,
}

/// Ordered lookups for a subscription. `plan_id` is authoritative and goes
/// first; the legacy name (or `free`) is the fallback.
pub fn lookup_chain(subscription: Option<&Subscription>) -> Vec<PlanLookup> {
    let mut chain = Vec::with_capacity(2);
    match subscription {
        Some(sub) => {
            if let Some(plan_id) = sub.plan_id {
                chain.push(PlanLookup::ById(plan_id));
            }
            let name = sub.plan.trim();
            let name = if name.is_empty() { FREE_PLAN_NAME } else { name };
            chain.push(PlanLookup::ByName(name.to_lowercase()));
        }
        None => chain.push(PlanLookup::ByName(FREE_PLAN_NAME.to_string())),
    }
    chain
}

/// Premium: a paid plan resolved and the subscription is exactly active.
/// Trialing, past due and canceled subscriptions are never premium.
pub fn is_premium(plan: Option<&Plan>, subscription: Option<&Subscription>) -> bool {
    let paid = plan.map(Plan::is_paid).unwrap_or(false);
    let active = subscription
        .map(|s| s.status == SubscriptionStatus::Active)
        .unwrap_or(false);
    paid && active
}

pub struct PlanEntitlementResolver<P: PlanRepository> {
    plans: Arc<P>,
}

impl<P: PlanRepository> PlanEntitlementResolver<P> {
    pub fn new(plans: Arc<P>) -> Self {
        Self { plans }
    }

    pub async fn resolve(
        &self,
        organization_id: Uuid,
        subscription: Option<&Subscription>,
    ) -> ResolvedPlan {
        let chain = lookup_chain(subscription);

        for lookup in &chain {
            if let Some(plan) = self.lookup(organization_id, lookup).await {
                let source = match lookup {
                    PlanLookup::ById(_) => PlanSource::PlanId,
                    PlanLookup::ByName(_) => PlanSource::PlanName,
                };
                debug!(
                    org_id = %organization_id,
                    plan = %plan.name,
                    source = ?source,
                    "Resolved plan"
                );
                let limits = TierLimits::from_plan(&plan.limits, &plan.features);
                return ResolvedPlan {
                    plan: Some(plan),
                    limits,
                    source,
                };
            }
        }

        let looked_up_free = chain
            .iter()
            .any(|l| matches!(l, PlanLookup::ByName(name) if name == FREE_PLAN_NAME));
        if looked_up_free {
            error!(
                category = "configuration",
                org_id = %organization_id,
                "No active '{}' plan row; applying hardcoded free tier",
                FREE_PLAN_NAME
            );
        } else {
            warn!(
                org_id = %organization_id,
                chain = ?chain,
                "No active plan matched subscription; applying free tier"
            );
        }

        ResolvedPlan {
            plan: None,
            limits: TierLimits::free_tier(),
            source: PlanSource::Fallback,
        }
    }

    async fn lookup(&self, organization_id: Uuid, lookup: &PlanLookup) -> Option<Plan> {
        let result = match lookup {
            PlanLookup::ById(id) => self.plans.find_active_by_id(*id).await,
            PlanLookup::ByName(name) => self.plans.find_active_by_name(name).await,
        };
        match result {
            Ok(plan) => plan,
            Err(e) => {
                warn!(
                    org_id = %organization_id,
                    lookup = ?lookup,
                    error = %e,
                    "Plan lookup failed; treating as miss"
                );
                None
            }
        }
    }
}
