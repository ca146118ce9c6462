//! Request-scoped authorization contexts

use super::{
    AuthSession, Membership, Organization, Plan, Role, SessionUser, Session, Subscription,
    TierLimits, Usage,
};
use serde::Serialize;

/// Everything a tenant route handler needs to know about the caller and
/// the organization it is acting in.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgContext {
    pub user: SessionUser,
    pub session: Session,
    pub organization: Organization,
    pub membership: Membership,
    pub subscription: Option<Subscription>,
    pub plan: Option<Plan>,
    pub limits: TierLimits,
    pub usage: Usage,
    pub can_add_customer: bool,
    pub can_add_tour: bool,
    pub can_add_booking: bool,
    pub is_premium: bool,
}

impl OrgContext {
    pub fn role(&self) -> Role {
        self.membership.role
    }

    /// Display name of the plan in effect, "Free" when none resolved
    pub fn plan_display_name(&self) -> &str {
        self.plan
            .as_ref()
            .map(|p| p.display_name.as_str())
            .unwrap_or("Free")
    }
}

/// Context for the platform admin host. Not subject to plan limits.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformContext {
    pub user: SessionUser,
    pub session: Session,
    pub organization: Organization,
    pub membership: Membership,
    pub is_owner: bool,
    pub is_admin: bool,
}

impl PlatformContext {
    pub fn from_membership(
        auth: AuthSession,
        organization: Organization,
        membership: Membership,
    ) -> Self {
        let is_owner = membership.role == Role::Owner;
        let is_admin = matches!(membership.role, Role::Owner | Role::Admin);
        Self {
            user: auth.user,
            session: auth.session,
            organization,
            membership,
            is_owner,
            is_admin,
        }
    }

    pub fn role(&self) -> Role {
        self.membership.role
    }
}
