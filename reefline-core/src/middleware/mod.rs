//! HTTP middleware for Reefline Core
//!
//! - Access gate for tenant and platform routes, with the context extractors
//! - Session-bound CSRF tokens
//! - HTTP request metrics

pub mod access_gate;
pub mod csrf;
pub mod metrics;

pub use access_gate::{
    get_org_context, get_platform_context, require_org_context, require_platform_context,
    OrgCtx, PlatformCtx,
};
pub use csrf::CsrfGuard;
pub use metrics::ObservabilityLayer;
