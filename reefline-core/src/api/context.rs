//! Context, limit and feature endpoints

use crate::domain::{Role, TierLimits, Usage};
use crate::error::Result;
use crate::middleware::{OrgCtx, PlatformCtx};
use crate::policy::{self, LimitCheck, ResourceKind};
use crate::state::TenancyState;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationSummary {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSummary {
    pub organization: OrganizationSummary,
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub plan: String,
    pub is_premium: bool,
    pub limits: TierLimits,
    pub usage: Usage,
    pub can_add_customer: bool,
    pub can_add_tour: bool,
    pub can_add_booking: bool,
    /// Token to send back in `x-csrf-token` on state-changing requests
    pub csrf_token: String,
}

/// GET /api/context
pub async fn get_context<S: TenancyState>(
    State(state): State<S>,
    OrgCtx(ctx): OrgCtx,
) -> Json<ContextSummary> {
    Json(ContextSummary {
        organization: OrganizationSummary {
            id: ctx.organization.id,
            name: ctx.organization.name.clone(),
            slug: ctx.organization.slug.clone(),
        },
        user_id: ctx.user.id,
        email: ctx.user.email.clone(),
        role: ctx.role(),
        plan: ctx.plan_display_name().to_string(),
        is_premium: ctx.is_premium,
        limits: ctx.limits.clone(),
        usage: ctx.usage,
        can_add_customer: ctx.can_add_customer,
        can_add_tour: ctx.can_add_tour,
        can_add_booking: ctx.can_add_booking,
        csrf_token: state.csrf_guard().token_for(ctx.session.id),
    })
}

/// GET /api/limits/{kind}
pub async fn get_limit(OrgCtx(ctx): OrgCtx, Path(kind): Path<String>) -> Result<Json<LimitCheck>> {
    let kind: ResourceKind = kind.parse()?;
    Ok(Json(policy::check_limit(&ctx, kind)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureAccess {
    pub feature: String,
    pub name: String,
    pub enabled: bool,
}

/// GET /api/features/{key}
pub async fn get_feature(OrgCtx(ctx): OrgCtx, Path(key): Path<String>) -> Result<Json<FeatureAccess>> {
    policy::require_premium(&ctx, &key)?;
    Ok(Json(FeatureAccess {
        name: policy::feature_display_name(&key),
        enabled: ctx.limits.features.is_enabled(&key),
        feature: key,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformSummary {
    pub organization: OrganizationSummary,
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub is_owner: bool,
    pub is_admin: bool,
}

/// GET /api/platform/context
pub async fn get_platform_context(PlatformCtx(ctx): PlatformCtx) -> Json<PlatformSummary> {
    Json(PlatformSummary {
        organization: OrganizationSummary {
            id: ctx.organization.id,
            name: ctx.organization.name.clone(),
            slug: ctx.organization.slug.clone(),
        },
        user_id: ctx.user.id,
        email: ctx.user.email.clone(),
        role: ctx.role(),
        is_owner: ctx.is_owner,
        is_admin: ctx.is_admin,
    })
}
