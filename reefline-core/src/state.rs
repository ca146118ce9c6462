//! Application state traits for dependency injection
//!
//! Middleware and handlers are generic over these traits so the same code
//! runs against the production `AppState` and the mock-backed state used in
//! tests.

use crate::config::Config;
use crate::middleware::csrf::CsrfGuard;
use crate::repository::{
    MembershipRepository, OrganizationRepository, PlanRepository, SubscriptionRepository,
    UsageRepository,
};
use crate::scope::OrgScope;
use crate::service::{OrgContextService, PlatformContextService, SessionProvider};

/// State that can resolve tenant and platform contexts for a request
pub trait TenancyState: Clone + Send + Sync + 'static {
    type OrgRepo: OrganizationRepository;
    type MembershipRepo: MembershipRepository;
    type SubscriptionRepo: SubscriptionRepository;
    type PlanRepo: PlanRepository;
    type UsageRepo: UsageRepository;
    type Sessions: SessionProvider;

    fn config(&self) -> &Config;

    fn org_context_service(
        &self,
    ) -> &OrgContextService<
        Self::OrgRepo,
        Self::MembershipRepo,
        Self::SubscriptionRepo,
        Self::PlanRepo,
        Self::UsageRepo,
        Self::Sessions,
    >;

    fn platform_context_service(
        &self,
    ) -> &PlatformContextService<Self::OrgRepo, Self::MembershipRepo, Self::Sessions>;

    fn csrf_guard(&self) -> &CsrfGuard;
}

/// State that can open organization-scoped transactions
pub trait HasOrgScope: Clone + Send + Sync + 'static {
    fn org_scope(&self) -> &OrgScope;
}
