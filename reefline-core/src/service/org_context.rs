//! Organization context assembly
//!
//! Read-only. Every "not applicable" outcome (no tenant host, no session,
//! unknown organization, no membership) comes back as `None`; only the
//! access gate turns absence into a redirect or an error response.

use crate::clock::Clock;
use crate::domain::{AuthSession, OrgContext, Organization};
use crate::repository::{
    MembershipRepository, OrganizationRepository, PlanRepository, SubscriptionRepository,
    UsageRepository,
};
use crate::service::directory::TenantDirectory;
use crate::service::entitlement::{is_premium, PlanEntitlementResolver};
use crate::service::host::{HostClass, HostClassifier};
use crate::service::session::SessionProvider;
use crate::service::usage::UsageAggregator;
use axum::http::HeaderMap;
use metrics::counter;
use std::sync::Arc;
use tracing::{debug, warn};

fn record(outcome: &'static str) {
    counter!("reefline_org_context_resolutions_total", "outcome" => outcome).increment(1);
}

pub struct OrgContextService<
    O: OrganizationRepository,
    M: MembershipRepository,
    S: SubscriptionRepository,
    P: PlanRepository,
    U: UsageRepository,
    A: SessionProvider,
> {
    directory: TenantDirectory<O>,
    memberships: Arc<M>,
    subscriptions: Arc<S>,
    entitlements: PlanEntitlementResolver<P>,
    usage: UsageAggregator<U>,
    sessions: Arc<A>,
    clock: Arc<dyn Clock>,
}

impl<
        O: OrganizationRepository,
        M: MembershipRepository,
        S: SubscriptionRepository,
        P: PlanRepository,
        U: UsageRepository,
        A: SessionProvider,
    > OrgContextService<O, M, S, P, U, A>
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        classifier: HostClassifier,
        orgs: Arc<O>,
        memberships: Arc<M>,
        subscriptions: Arc<S>,
        plans: Arc<P>,
        usage: Arc<U>,
        sessions: Arc<A>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            directory: TenantDirectory::new(orgs, classifier),
            memberships,
            subscriptions,
            entitlements: PlanEntitlementResolver::new(plans),
            usage: UsageAggregator::new(usage),
            sessions,
            clock,
        }
    }

    pub fn directory(&self) -> &TenantDirectory<O> {
        &self.directory
    }

    pub fn classify(&self, host: &str) -> HostClass {
        self.directory.classifier().classify(host)
    }

    /// Session lookup with errors folded into "no session"
    pub async fn session(&self, headers: &HeaderMap) -> Option<AuthSession> {
        match self.sessions.get_session(headers).await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Session lookup failed; treating request as anonymous");
                None
            }
        }
    }

    /// Full resolution for a tenant request
    pub async fn get_org_context(&self, host: &str, headers: &HeaderMap) -> Option<OrgContext> {
        let slug = match self.classify(host) {
            HostClass::Subdomain(slug) => slug,
            other => {
                debug!(host = %host, class = ?other, "Host does not address a tenant");
                record("no_tenant");
                return None;
            }
        };

        let auth = match self.session(headers).await {
            Some(auth) => auth,
            None => {
                record("no_session");
                return None;
            }
        };

        let org = match self.directory.find_by_slug(&slug).await {
            Some(org) => org,
            None => {
                debug!(slug = %slug, "No organization for slug");
                record("unknown_org");
                return None;
            }
        };

        if !org.is_active {
            debug!(org_id = %org.id, slug = %slug, "Organization is deactivated");
            record("inactive");
            return None;
        }

        self.assemble_with(org, auth).await
    }

    /// Membership, plan and usage for an organization and session that are
    /// already resolved
    pub async fn assemble_with(&self, org: Organization, auth: AuthSession) -> Option<OrgContext> {
        let membership = match self.memberships.find(auth.user.id, org.id).await {
            Ok(Some(membership)) => membership,
            Ok(None) => {
                debug!(org_id = %org.id, user_id = %auth.user.id, "User is not a member");
                record("no_membership");
                return None;
            }
            Err(e) => {
                warn!(org_id = %org.id, user_id = %auth.user.id, error = %e, "Membership lookup failed");
                record("no_membership");
                return None;
            }
        };

        let subscription = match self.subscriptions.find_by_organization(org.id).await {
            Ok(subscription) => subscription,
            Err(e) => {
                warn!(org_id = %org.id, error = %e, "Subscription lookup failed; treating as absent");
                None
            }
        };

        let period_start = self.clock.period_start();
        let (resolved, usage) = tokio::join!(
            self.entitlements.resolve(org.id, subscription.as_ref()),
            self.usage.aggregate(org.id, period_start),
        );

        let premium = is_premium(resolved.plan.as_ref(), subscription.as_ref());
        let limits = resolved.limits;

        let can_add_customer = premium || limits.customers.allows(usage.customers);
        let can_add_tour = premium || limits.tours.allows(usage.tours);
        let can_add_booking = premium || limits.bookings_per_month.allows(usage.bookings_this_month);

        record("resolved");

        Some(OrgContext {
            user: auth.user,
            session: auth.session,
            organization: org,
            membership,
            subscription,
            plan: resolved.plan,
            limits,
            usage,
            can_add_customer,
            can_add_tour,
            can_add_booking,
            is_premium: premium,
        })
    }
}
