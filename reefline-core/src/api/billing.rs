//! Billing endpoints

use crate::domain::{Role, Subscription};
use crate::error::Result;
use crate::middleware::OrgCtx;
use crate::policy;
use crate::repository::subscription;
use crate::state::HasOrgScope;
use axum::{extract::State, Json};

/// POST /api/billing/subscription
///
/// Make sure the organization has a subscription row (free if it had
/// none). Owners and admins only.
pub async fn ensure_subscription<S: HasOrgScope>(
    State(state): State<S>,
    OrgCtx(ctx): OrgCtx,
) -> Result<Json<Subscription>> {
    policy::require_role(&ctx, &[Role::Owner, Role::Admin])?;

    let subscription = state
        .org_scope()
        .with_org_scope(ctx.organization.id, |tx| {
            Box::pin(async move { subscription::ensure_for_org(tx).await })
        })
        .await?;

    Ok(Json(subscription))
}
