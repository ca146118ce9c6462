//! Domain models

pub mod context;
pub mod membership;
pub mod organization;
pub mod plan;
pub mod session;
pub mod subscription;
pub mod usage;

pub use context::{OrgContext, PlatformContext};
pub use membership::{Membership, Role};
pub use organization::{Organization, SiteSettings, SLUG_REGEX};
pub use plan::{Limit, Plan, PlanFeatures, PlanLimits, TierLimits};
pub use session::{AuthSession, Session, SessionUser};
pub use subscription::{Subscription, SubscriptionStatus};
pub use usage::Usage;
