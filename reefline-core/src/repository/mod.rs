//! Data access layer (Repository pattern)
//!
//! Lookups used while resolving a request run directly on the pool with an
//! explicit organization filter. Writes and tenant data reads run inside an
//! [`OrgScope`](crate::scope::OrgScope) and take the scoped transaction as a
//! parameter.

pub mod customer;
pub mod membership;
pub mod organization;
pub mod plan;
pub mod subscription;
pub mod usage;

pub use membership::MembershipRepository;
pub use organization::OrganizationRepository;
pub use plan::PlanRepository;
pub use subscription::SubscriptionRepository;
pub use usage::UsageRepository;
