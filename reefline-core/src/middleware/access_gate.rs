//! Access gate for tenant and platform routes
//!
//! The gate is the only place where "no context" becomes a redirect or an
//! error response. Guards run in a fixed order and each may short-circuit:
//!
//! 1. deactivated organization (403, before any session or membership work)
//! 2. missing context (redirect to login)
//! 3. forced password change (redirect)
//! 4. CSRF on state-changing methods (logged, or 403 when enforced)
//!
//! On success the context is stored in request extensions and read by
//! handlers through [`OrgCtx`] / [`PlatformCtx`].

use crate::domain::{OrgContext, Organization, PlatformContext, SessionUser};
use crate::error::AppError;
use crate::middleware::csrf::CsrfVerdict;
use crate::state::TenancyState;
use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, Request, StatusCode, Uri},
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use metrics::counter;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

const DEACTIVATED_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>Account deactivated</title></head>
<body>
<h1>This account has been deactivated</h1>
<p>This dive shop is no longer active. If you are the owner, contact support to reactivate it.</p>
</body>
</html>"#;

const FORBIDDEN_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>Forbidden</title></head>
<body>
<h1>Request blocked</h1>
<p>Your session could not verify this request. Reload the page and try again.</p>
</body>
</html>"#;

fn reject(reason: &'static str) {
    counter!("reefline_access_gate_rejections_total", "reason" => reason).increment(1);
}

/// Whether the caller expects a machine-readable response
pub fn wants_json(headers: &HeaderMap, uri: &Uri) -> bool {
    let accepts_json = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|accept| accept.contains("application/json"))
        .unwrap_or(false);
    if accepts_json {
        return true;
    }

    let path = uri.path();
    if path.starts_with("/api/") || path.ends_with(".data") || path.ends_with(".json") {
        return true;
    }

    uri.query()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).any(|(key, _)| key == "_data"))
        .unwrap_or(false)
}

/// Host the request was addressed to
pub fn request_host(headers: &HeaderMap, uri: &Uri) -> String {
    headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| uri.authority().map(|a| a.to_string()))
        .unwrap_or_default()
}

fn deny(json_style: bool, error: &str, message: &str, html: &'static str) -> Response {
    if json_style {
        (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": error, "message": message })),
        )
            .into_response()
    } else {
        (StatusCode::FORBIDDEN, Html(html)).into_response()
    }
}

fn deactivated_response(headers: &HeaderMap, uri: &Uri, org: &Organization) -> Response {
    info!(org_id = %org.id, slug = %org.slug, "Blocked request to deactivated organization");
    reject("deactivated");
    deny(
        wants_json(headers, uri),
        "organization_deactivated",
        "This organization has been deactivated",
        DEACTIVATED_HTML,
    )
}

fn login_redirect(login_path: &str, uri: &Uri) -> Response {
    let original = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    let target = format!("{}?redirect={}", login_path, urlencoding::encode(original));
    Redirect::to(&target).into_response()
}

/// Redirect to the password change page unless the request is already for
/// it (or for logout)
fn password_rotation_redirect<S: TenancyState>(
    state: &S,
    user: &SessionUser,
    uri: &Uri,
) -> Option<Response> {
    if !user.force_password_change {
        return None;
    }
    let access = &state.config().access;
    let path = uri.path();
    if path == access.change_password_path || path == access.logout_path {
        return None;
    }
    debug!(user_id = %user.id, path = %path, "Password change required");
    reject("password_change_required");
    Some(Redirect::to(&access.change_password_path).into_response())
}

/// Run the CSRF check. Returns the (possibly rebuilt) request, or the
/// rejection when enforcement is on.
async fn csrf_check<S: TenancyState>(
    state: &S,
    session_id: Uuid,
    user_id: Uuid,
    request: Request<Body>,
) -> Result<Request<Body>, Response> {
    let guard = state.csrf_guard();
    let (request, verdict) = guard.inspect(session_id, request).await;
    if !verdict.is_violation() {
        return Ok(request);
    }

    let enforced = guard.enforce();
    warn!(
        user_id = %user_id,
        method = %request.method(),
        path = %request.uri().path(),
        verdict = verdict.as_str(),
        enforced = enforced,
        "CSRF check failed"
    );
    counter!(
        "reefline_csrf_violations_total",
        "enforced" => if enforced { "true" } else { "false" }
    )
    .increment(1);

    if !enforced {
        return Ok(request);
    }

    reject("csrf");
    let message = match verdict {
        CsrfVerdict::Missing => "Missing CSRF token",
        _ => "Invalid CSRF token",
    };
    Err(deny(
        wants_json(request.headers(), request.uri()),
        "csrf_invalid",
        message,
        FORBIDDEN_HTML,
    ))
}

/// Resolve the organization context for a request without enforcing it.
/// Reuses a context the gate already stored.
pub async fn get_org_context<S: TenancyState>(state: &S, parts: &Parts) -> Option<OrgContext> {
    if let Some(ctx) = parts.extensions.get::<OrgContext>() {
        return Some(ctx.clone());
    }
    let host = request_host(&parts.headers, &parts.uri);
    state
        .org_context_service()
        .get_org_context(&host, &parts.headers)
        .await
}

/// Platform counterpart of [`get_org_context`]
pub async fn get_platform_context<S: TenancyState>(
    state: &S,
    parts: &Parts,
) -> Option<PlatformContext> {
    if let Some(ctx) = parts.extensions.get::<PlatformContext>() {
        return Some(ctx.clone());
    }
    let host = request_host(&parts.headers, &parts.uri);
    state
        .platform_context_service()
        .get_platform_context(&host, &parts.headers)
        .await
}

/// Middleware for tenant routes
pub async fn require_org_context<S: TenancyState>(
    State(state): State<S>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let service = state.org_context_service();
    let host = request_host(request.headers(), request.uri());
    let slug = service.classify(&host).slug().map(str::to_string);

    // Deactivation is decided from the organization alone
    let org = match &slug {
        Some(slug) => service.directory().find_by_slug(slug).await,
        None => None,
    };
    if let Some(org) = &org {
        if !org.is_active {
            return deactivated_response(request.headers(), request.uri(), org);
        }
    }

    let ctx = match org {
        Some(org) => match service.session(request.headers()).await {
            Some(auth) => service.assemble_with(org, auth).await,
            None => None,
        },
        None => None,
    };

    let ctx = match ctx {
        Some(ctx) => ctx,
        None => {
            reject("no_context");
            let access = &state.config().access;
            return match slug {
                Some(_) => login_redirect(&access.tenant_login_path, request.uri()),
                None => Redirect::to(&access.generic_login_path).into_response(),
            };
        }
    };

    if let Some(redirect) = password_rotation_redirect(&state, &ctx.user, request.uri()) {
        return redirect;
    }

    request = match csrf_check(&state, ctx.session.id, ctx.user.id, request).await {
        Ok(request) => request,
        Err(rejection) => return rejection,
    };

    request.extensions_mut().insert(ctx);
    next.run(request).await
}

/// Middleware for the platform admin host
pub async fn require_platform_context<S: TenancyState>(
    State(state): State<S>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let host = request_host(request.headers(), request.uri());
    let ctx = state
        .platform_context_service()
        .get_platform_context(&host, request.headers())
        .await;

    let ctx = match ctx {
        Some(ctx) => ctx,
        None => {
            reject("no_platform_context");
            return Redirect::to(&state.config().access.generic_login_path).into_response();
        }
    };

    if let Some(redirect) = password_rotation_redirect(&state, &ctx.user, request.uri()) {
        return redirect;
    }

    request = match csrf_check(&state, ctx.session.id, ctx.user.id, request).await {
        Ok(request) => request,
        Err(rejection) => return rejection,
    };

    request.extensions_mut().insert(ctx);
    next.run(request).await
}

/// Organization context stored by [`require_org_context`]
pub struct OrgCtx(pub OrgContext);

impl<S> FromRequestParts<S> for OrgCtx
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<OrgContext>()
            .cloned()
            .map(OrgCtx)
            .ok_or_else(|| AppError::Unauthorized("Organization context required".to_string()))
    }
}

/// Platform context stored by [`require_platform_context`]
pub struct PlatformCtx(pub PlatformContext);

impl<S> FromRequestParts<S> for PlatformCtx
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<PlatformContext>()
            .cloned()
            .map(PlatformCtx)
            .ok_or_else(|| AppError::Unauthorized("Platform context required".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Role, SubscriptionStatus};
    use crate::middleware::csrf::CSRF_HEADER;
    use crate::test_support::{self, Mocks, TestState};
    use axum::{
        body::to_bytes,
        http::Method,
        routing::{get, post},
        Router,
    };
    use tower::ServiceExt;

    async fn whoami(OrgCtx(ctx): OrgCtx) -> String {
        format!("{}:{}", ctx.organization.name, ctx.role())
    }

    async fn platform_whoami(PlatformCtx(ctx): PlatformCtx) -> String {
        format!("platform:{}", ctx.role())
    }

    fn tenant_app(state: TestState) -> Router {
        Router::new()
            .route("/dashboard", get(whoami))
            .route("/api/context", get(whoami))
            .route("/api/customers", post(whoami))
            .route("/auth/change-password", get(whoami))
            .route("/auth/logout", post(whoami))
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                require_org_context::<TestState>,
            ))
            .with_state(state)
    }

    fn platform_app(state: TestState) -> Router {
        Router::new()
            .route("/api/platform/context", get(platform_whoami))
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                require_platform_context::<TestState>,
            ))
            .with_state(state)
    }

    fn get_request(host: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::HOST, host)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn location(response: &Response) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    /// demo / Demo Shop / staff / free plan with 50 customers
    fn demo_mocks() -> Mocks {
        let mut mocks = Mocks::default();
        mocks.with_session(test_support::auth_session());
        mocks.with_organization(test_support::organization("demo", "Demo Shop"));
        mocks.with_membership(Role::Staff);
        mocks.with_subscription(None);
        mocks.with_free_plan();
        mocks.with_usage(50, 1, 2);
        mocks
    }

    fn deactivated_mocks() -> Mocks {
        let mut mocks = Mocks::default();
        let mut org = test_support::organization("demo", "Demo Shop");
        org.is_active = false;
        mocks.with_organization(org);
        mocks.sessions.expect_get_session().never();
        mocks.memberships.expect_find().never();
        mocks.plans.expect_find_active_by_name().never();
        mocks
    }

    #[test]
    fn test_wants_json() {
        let headers = HeaderMap::new();
        assert!(wants_json(&headers, &"/api/context".parse().unwrap()));
        assert!(wants_json(&headers, &"/bookings.data".parse().unwrap()));
        assert!(wants_json(&headers, &"/export.json".parse().unwrap()));
        assert!(wants_json(&headers, &"/dashboard?_data=routes/dashboard".parse().unwrap()));
        assert!(!wants_json(&headers, &"/dashboard".parse().unwrap()));
        assert!(!wants_json(&headers, &"/dashboard?data=1".parse().unwrap()));

        let mut json_headers = HeaderMap::new();
        json_headers.insert(
            header::ACCEPT,
            "application/json, text/plain".parse().unwrap(),
        );
        assert!(wants_json(&json_headers, &"/dashboard".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_demo_staff_gets_200() {
        let state = TestState::new(demo_mocks(), false);
        let response = tenant_app(state)
            .oneshot(get_request("demo.reefline.app", "/dashboard"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "Demo Shop:staff");
    }

    #[tokio::test]
    async fn test_deactivated_org_json_403_before_membership() {
        let state = TestState::new(deactivated_mocks(), false);
        let response = tenant_app(state)
            .oneshot(get_request("demo.reefline.app", "/api/context"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body: serde_json::Value =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["error"], "organization_deactivated");
    }

    #[tokio::test]
    async fn test_deactivated_org_html_403_for_navigation() {
        let state = TestState::new(deactivated_mocks(), false);
        let request = Request::builder()
            .uri("/dashboard")
            .header(header::HOST, "demo.reefline.app")
            .header(header::ACCEPT, "text/html,application/xhtml+xml")
            .body(Body::empty())
            .unwrap();

        let response = tenant_app(state).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(content_type.starts_with("text/html"));
        assert!(body_string(response).await.contains("deactivated"));
    }

    #[tokio::test]
    async fn test_anonymous_redirects_to_tenant_login() {
        let mut mocks = Mocks::default();
        mocks.with_organization(test_support::organization("demo", "Demo Shop"));
        mocks.sessions.expect_get_session().returning(|_| Ok(None));

        let response = tenant_app(TestState::new(mocks, false))
            .oneshot(get_request("demo.reefline.app", "/dashboard?tab=trips&day=2"))
            .await
            .unwrap();

        assert!(response.status().is_redirection());
        assert_eq!(
            location(&response),
            "/auth/login?redirect=%2Fdashboard%3Ftab%3Dtrips%26day%3D2"
        );
    }

    #[tokio::test]
    async fn test_non_member_redirects_to_tenant_login() {
        let mut mocks = Mocks::default();
        mocks.with_session(test_support::auth_session());
        mocks.with_organization(test_support::organization("demo", "Demo Shop"));
        mocks.memberships.expect_find().returning(|_, _| Ok(None));

        let response = tenant_app(TestState::new(mocks, false))
            .oneshot(get_request("demo.reefline.app", "/dashboard"))
            .await
            .unwrap();

        assert!(response.status().is_redirection());
        assert!(location(&response).starts_with("/auth/login?redirect="));
    }

    #[tokio::test]
    async fn test_no_tenant_host_redirects_to_generic_login() {
        let mut mocks = Mocks::default();
        mocks.orgs.expect_find_by_slug().never();

        let response = tenant_app(TestState::new(mocks, false))
            .oneshot(get_request("reefline.app", "/dashboard"))
            .await
            .unwrap();

        assert!(response.status().is_redirection());
        assert_eq!(location(&response), "/login");
    }

    #[tokio::test]
    async fn test_forced_password_change_redirects() {
        let mut mocks = demo_mocks();
        mocks.sessions = Default::default();
        let mut auth = test_support::auth_session();
        auth.user.force_password_change = true;
        mocks.with_session(auth);

        let app = tenant_app(TestState::new(mocks, false));

        let response = app
            .clone()
            .oneshot(get_request("demo.reefline.app", "/dashboard"))
            .await
            .unwrap();
        assert!(response.status().is_redirection());
        assert_eq!(location(&response), "/auth/change-password");

        let response = app
            .oneshot(get_request("demo.reefline.app", "/auth/change-password"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_logout_allowed_during_forced_password_change() {
        let mut mocks = demo_mocks();
        mocks.sessions = Default::default();
        let mut auth = test_support::auth_session();
        auth.user.force_password_change = true;
        let token = test_support::csrf_guard(false).token_for(auth.session.id);
        mocks.with_session(auth);

        let request = Request::builder()
            .method(Method::POST)
            .uri("/auth/logout")
            .header(header::HOST, "demo.reefline.app")
            .header(CSRF_HEADER, token)
            .body(Body::empty())
            .unwrap();

        let response = tenant_app(TestState::new(mocks, false))
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_csrf_soft_mode_lets_request_through() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/customers")
            .header(header::HOST, "demo.reefline.app")
            .body(Body::empty())
            .unwrap();

        let response = tenant_app(TestState::new(demo_mocks(), false))
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_csrf_enforced_rejects_missing_token() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/customers")
            .header(header::HOST, "demo.reefline.app")
            .body(Body::empty())
            .unwrap();

        let response = tenant_app(TestState::new(demo_mocks(), true))
            .oneshot(request)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body: serde_json::Value =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["error"], "csrf_invalid");
    }

    #[tokio::test]
    async fn test_csrf_enforced_accepts_valid_token() {
        let auth = test_support::auth_session();
        let token = test_support::csrf_guard(true).token_for(auth.session.id);
        let mut mocks = demo_mocks();
        mocks.sessions = Default::default();
        mocks.with_session(auth);

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/customers")
            .header(header::HOST, "demo.reefline.app")
            .header(CSRF_HEADER, token)
            .body(Body::empty())
            .unwrap();

        let response = tenant_app(TestState::new(mocks, true))
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_failed_booking_count_still_200() {
        let mut mocks = Mocks::default();
        mocks.with_session(test_support::auth_session());
        mocks.with_organization(test_support::organization("demo", "Demo Shop"));
        mocks.with_membership(Role::Staff);
        mocks.with_subscription(None);
        mocks.with_free_plan();
        mocks.usage.expect_count_customers().returning(|_| Ok(3));
        mocks.usage.expect_count_tours().returning(|_| Ok(0));
        mocks
            .usage
            .expect_count_bookings_since()
            .returning(|_, _| Err(AppError::Database(sqlx::Error::PoolTimedOut)));

        let response = tenant_app(TestState::new(mocks, false))
            .oneshot(get_request("demo.reefline.app", "/api/context"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_premium_past_due_still_served() {
        let mut mocks = Mocks::default();
        let org = test_support::organization("demo", "Demo Shop");
        let pro = test_support::plan("pro", "Pro", 4900, Default::default());
        mocks.with_session(test_support::auth_session());
        mocks.with_organization(org.clone());
        mocks.with_membership(Role::Owner);
        mocks.with_subscription(Some(test_support::subscription(
            org.id,
            "pro",
            Some(pro.id),
            SubscriptionStatus::PastDue,
        )));
        mocks.with_plan_by_id(pro);
        mocks.with_usage(0, 0, 0);

        let response = tenant_app(TestState::new(mocks, false))
            .oneshot(get_request("demo.reefline.app", "/dashboard"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "Demo Shop:owner");
    }

    #[tokio::test]
    async fn test_platform_admin_host() {
        let mut mocks = Mocks::default();
        mocks.with_session(test_support::auth_session());
        mocks.with_organization(test_support::organization("platform", "Reefline"));
        mocks.with_membership(Role::Owner);

        let response = platform_app(TestState::new(mocks, false))
            .oneshot(get_request("admin-staging.reefline.app", "/api/platform/context"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "platform:owner");
    }

    #[tokio::test]
    async fn test_platform_route_on_tenant_host_redirects() {
        let mut mocks = Mocks::default();
        mocks.sessions.expect_get_session().never();

        let response = platform_app(TestState::new(mocks, false))
            .oneshot(get_request("demo.reefline.app", "/api/platform/context"))
            .await
            .unwrap();
        assert!(response.status().is_redirection());
        assert_eq!(location(&response), "/login");
    }
}
