//! Customer endpoints
//!
//! Reads and writes run inside the caller's organization scope, so the
//! row-level security policies apply even if a query forgets its filter.

use crate::api::{PaginatedResponse, PaginationQuery};
use crate::domain::Role;
use crate::error::{AppError, Result};
use crate::middleware::OrgCtx;
use crate::policy::{self, ResourceKind};
use crate::repository::customer::{self, CreateCustomerInput, Customer};
use crate::state::HasOrgScope;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use validator::Validate;

/// GET /api/customers
pub async fn list_customers<S: HasOrgScope>(
    State(state): State<S>,
    OrgCtx(ctx): OrgCtx,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<PaginatedResponse<Customer>>> {
    let offset = pagination.offset();
    let per_page = pagination.per_page;

    let customers = state
        .org_scope()
        .with_org_scope(ctx.organization.id, move |tx| {
            Box::pin(async move { customer::list(tx, offset, per_page).await })
        })
        .await?;

    Ok(Json(PaginatedResponse::new(
        customers,
        pagination.page,
        per_page,
        ctx.usage.customers as i64,
    )))
}

/// POST /api/customers
///
/// Admission is fail-closed: a plan at its customer limit gets 403 before
/// anything is written.
pub async fn create_customer<S: HasOrgScope>(
    State(state): State<S>,
    OrgCtx(ctx): OrgCtx,
    Json(input): Json<CreateCustomerInput>,
) -> Result<(StatusCode, Json<Customer>)> {
    policy::require_role(&ctx, &[Role::Owner, Role::Admin, Role::Staff])?;
    input.validate()?;

    let check = policy::check_limit(&ctx, ResourceKind::Customers);
    if !check.allowed {
        return Err(AppError::Forbidden(
            check
                .message
                .unwrap_or_else(|| "Customer limit reached".to_string()),
        ));
    }

    let created = state
        .org_scope()
        .with_org_scope(ctx.organization.id, move |tx| {
            Box::pin(async move { customer::insert(tx, &input).await })
        })
        .await?;

    info!(
        org_id = %ctx.organization.id,
        customer_id = %created.id,
        user_id = %ctx.user.id,
        "Customer created"
    );

    Ok((StatusCode::CREATED, Json(created)))
}
