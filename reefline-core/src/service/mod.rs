//! Business logic layer

pub mod directory;
pub mod entitlement;
pub mod host;
pub mod org_context;
pub mod platform_context;
pub mod session;
pub mod usage;

pub use directory::TenantDirectory;
pub use entitlement::{is_premium, PlanEntitlementResolver, PlanLookup, PlanSource, ResolvedPlan};
pub use host::{HostClass, HostClassifier};
pub use org_context::OrgContextService;
pub use platform_context::PlatformContextService;
pub use session::{DbSessionProvider, SessionProvider};
pub use usage::UsageAggregator;
