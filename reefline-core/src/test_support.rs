//! Fixtures and mock-backed state shared by unit tests

use crate::clock::{Clock, FixedClock};
use crate::config::{
    AccessConfig, Config, CsrfConfig, DatabaseConfig, TelemetryConfig, TenancyConfig,
};
use crate::domain::{
    AuthSession, Membership, OrgContext, Organization, Plan, PlanFeatures, PlanLimits, Role,
    Session, SessionUser, Subscription, SubscriptionStatus, TierLimits, Usage,
};
use crate::middleware::csrf::CsrfGuard;
use crate::repository::membership::MockMembershipRepository;
use crate::repository::organization::MockOrganizationRepository;
use crate::repository::plan::MockPlanRepository;
use crate::repository::subscription::MockSubscriptionRepository;
use crate::repository::usage::MockUsageRepository;
use crate::scope::OrgScope;
use crate::service::host::HostClassifier;
use crate::service::session::MockSessionProvider;
use crate::service::{OrgContextService, PlatformContextService};
use crate::state::{HasOrgScope, TenancyState};
use chrono::{Duration, TimeZone, Utc};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use uuid::Uuid;

pub const BASE_DOMAIN: &str = "reefline.app";
pub const CSRF_SECRET: &str = "test-csrf-secret";

pub type TestOrgContextService = OrgContextService<
    MockOrganizationRepository,
    MockMembershipRepository,
    MockSubscriptionRepository,
    MockPlanRepository,
    MockUsageRepository,
    MockSessionProvider,
>;

pub type TestPlatformContextService = PlatformContextService<
    MockOrganizationRepository,
    MockMembershipRepository,
    MockSessionProvider,
>;

pub fn tenancy_config() -> TenancyConfig {
    TenancyConfig {
        base_domain: BASE_DOMAIN.to_string(),
        ..Default::default()
    }
}

pub fn test_config(enforce_csrf: bool) -> Config {
    Config {
        http_host: "127.0.0.1".to_string(),
        http_port: 8080,
        database: DatabaseConfig {
            url: "postgres://reefline@localhost/unused".to_string(),
            max_connections: 1,
            min_connections: 0,
            rls_role: None,
        },
        tenancy: tenancy_config(),
        access: AccessConfig::default(),
        csrf: CsrfConfig {
            secret: CSRF_SECRET.to_string(),
            enforce: enforce_csrf,
        },
        telemetry: TelemetryConfig::default(),
    }
}

pub fn csrf_guard(enforce: bool) -> CsrfGuard {
    CsrfGuard::new(CSRF_SECRET, enforce)
}

/// Mid-month instant so the billing period is unambiguous
pub fn clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(
        Utc.with_ymd_and_hms(2026, 3, 17, 9, 30, 0).unwrap(),
    ))
}

pub fn organization(slug: &str, name: &str) -> Organization {
    Organization {
        name: name.to_string(),
        slug: slug.to_string(),
        ..Default::default()
    }
}

pub fn auth_session() -> AuthSession {
    let user_id = Uuid::new_v4();
    AuthSession {
        user: SessionUser {
            id: user_id,
            email: "sam@demo.test".to_string(),
            name: "Sam Reef".to_string(),
            force_password_change: false,
        },
        session: Session {
            id: Uuid::new_v4(),
            user_id,
            expires_at: Utc::now() + Duration::hours(8),
        },
    }
}

pub fn membership(user_id: Uuid, organization_id: Uuid, role: Role) -> Membership {
    Membership {
        id: Uuid::new_v4(),
        user_id,
        organization_id,
        role,
        created_at: Utc::now(),
    }
}

pub fn subscription(
    organization_id: Uuid,
    plan: &str,
    plan_id: Option<Uuid>,
    status: SubscriptionStatus,
) -> Subscription {
    Subscription {
        id: Uuid::new_v4(),
        organization_id,
        plan: plan.to_string(),
        plan_id,
        status,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn plan(name: &str, display_name: &str, monthly_price_cents: i64, limits: PlanLimits) -> Plan {
    Plan {
        id: Uuid::new_v4(),
        name: name.to_string(),
        display_name: display_name.to_string(),
        monthly_price_cents,
        features: PlanFeatures::default(),
        limits,
        is_active: true,
    }
}

pub fn free_plan() -> Plan {
    plan("free", "Free", 0, PlanLimits::default())
}

/// A resolved context with nothing used yet
pub fn org_context(role: Role, limits: TierLimits) -> OrgContext {
    let auth = auth_session();
    let org = organization("demo", "Demo Shop");
    let membership = membership(auth.user.id, org.id, role);
    OrgContext {
        user: auth.user,
        session: auth.session,
        organization: org,
        membership,
        subscription: None,
        plan: None,
        limits,
        usage: Usage::default(),
        can_add_customer: true,
        can_add_tour: true,
        can_add_booking: true,
        is_premium: false,
    }
}

/// One mock per collaborator. Both context services share them.
#[derive(Default)]
pub struct Mocks {
    pub orgs: MockOrganizationRepository,
    pub memberships: MockMembershipRepository,
    pub subscriptions: MockSubscriptionRepository,
    pub plans: MockPlanRepository,
    pub usage: MockUsageRepository,
    pub sessions: MockSessionProvider,
}

impl Mocks {
    pub fn with_session(&mut self, auth: AuthSession) {
        self.sessions
            .expect_get_session()
            .returning(move |_| Ok(Some(auth.clone())));
    }

    pub fn with_organization(&mut self, org: Organization) {
        self.orgs
            .expect_find_by_slug()
            .returning(move |_| Ok(Some(org.clone())));
    }

    pub fn with_membership(&mut self, role: Role) {
        self.memberships
            .expect_find()
            .returning(move |user_id, org_id| Ok(Some(membership(user_id, org_id, role))));
    }

    pub fn with_subscription(&mut self, subscription: Option<Subscription>) {
        self.subscriptions
            .expect_find_by_organization()
            .returning(move |_| Ok(subscription.clone()));
    }

    pub fn with_free_plan(&mut self) {
        self.plans
            .expect_find_active_by_name()
            .returning(|_| Ok(Some(free_plan())));
    }

    pub fn with_plan_by_id(&mut self, plan: Plan) {
        self.plans
            .expect_find_active_by_id()
            .returning(move |_| Ok(Some(plan.clone())));
    }

    pub fn with_usage(&mut self, customers: u64, tours: u64, bookings: u64) {
        self.usage
            .expect_count_customers()
            .returning(move |_| Ok(customers));
        self.usage.expect_count_tours().returning(move |_| Ok(tours));
        self.usage
            .expect_count_bookings_since()
            .returning(move |_, _| Ok(bookings));
    }

    pub fn into_services(self) -> (TestOrgContextService, TestPlatformContextService) {
        let classifier = HostClassifier::new(&tenancy_config());
        let orgs = Arc::new(self.orgs);
        let memberships = Arc::new(self.memberships);
        let sessions = Arc::new(self.sessions);

        let org_context = OrgContextService::new(
            classifier.clone(),
            orgs.clone(),
            memberships.clone(),
            Arc::new(self.subscriptions),
            Arc::new(self.plans),
            Arc::new(self.usage),
            sessions.clone(),
            clock(),
        );
        let platform_context = PlatformContextService::new(
            classifier,
            tenancy_config().platform_org_slug,
            orgs,
            memberships,
            sessions,
        );
        (org_context, platform_context)
    }

    pub fn into_org_context_service(self) -> TestOrgContextService {
        self.into_services().0
    }

    pub fn into_platform_context_service(self) -> TestPlatformContextService {
        self.into_services().1
    }
}

/// Mock-backed state for middleware and handler tests
#[derive(Clone)]
pub struct TestState {
    config: Arc<Config>,
    org_context: Arc<TestOrgContextService>,
    platform_context: Arc<TestPlatformContextService>,
    csrf: CsrfGuard,
    org_scope: OrgScope,
}

impl TestState {
    /// Must be called inside a tokio runtime (the unused pool is lazy)
    pub fn new(mocks: Mocks, enforce_csrf: bool) -> Self {
        let config = test_config(enforce_csrf);
        let (org_context, platform_context) = mocks.into_services();
        let pool = PgPoolOptions::new()
            .connect_lazy(&config.database.url)
            .unwrap();
        Self {
            csrf: csrf_guard(enforce_csrf),
            config: Arc::new(config),
            org_context: Arc::new(org_context),
            platform_context: Arc::new(platform_context),
            org_scope: OrgScope::new(pool, None).unwrap(),
        }
    }
}

impl TenancyState for TestState {
    type OrgRepo = MockOrganizationRepository;
    type MembershipRepo = MockMembershipRepository;
    type SubscriptionRepo = MockSubscriptionRepository;
    type PlanRepo = MockPlanRepository;
    type UsageRepo = MockUsageRepository;
    type Sessions = MockSessionProvider;

    fn config(&self) -> &Config {
        &self.config
    }

    fn org_context_service(&self) -> &TestOrgContextService {
        &self.org_context
    }

    fn platform_context_service(&self) -> &TestPlatformContextService {
        &self.platform_context
    }

    fn csrf_guard(&self) -> &CsrfGuard {
        &self.csrf
    }
}

impl HasOrgScope for TestState {
    fn org_scope(&self) -> &OrgScope {
        &self.org_scope
    }
}
