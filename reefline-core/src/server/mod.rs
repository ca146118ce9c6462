//! Server initialization and routing

use crate::api;
use crate::clock::SystemClock;
use crate::config::Config;
use crate::middleware::{
    require_org_context, require_platform_context, CsrfGuard, ObservabilityLayer,
};
use crate::repository::{
    membership::MembershipRepositoryImpl, organization::OrganizationRepositoryImpl,
    plan::PlanRepositoryImpl, subscription::SubscriptionRepositoryImpl,
    usage::UsageRepositoryImpl,
};
use crate::scope::OrgScope;
use crate::service::{
    DbSessionProvider, HostClassifier, OrgContextService, PlatformContextService,
};
use crate::state::{HasOrgScope, TenancyState};
use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

type ProdOrgContextService = OrgContextService<
    OrganizationRepositoryImpl,
    MembershipRepositoryImpl,
    SubscriptionRepositoryImpl,
    PlanRepositoryImpl,
    UsageRepositoryImpl,
    DbSessionProvider,
>;

type ProdPlatformContextService =
    PlatformContextService<OrganizationRepositoryImpl, MembershipRepositoryImpl, DbSessionProvider>;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub org_scope: OrgScope,
    pub org_context_service: Arc<ProdOrgContextService>,
    pub platform_context_service: Arc<ProdPlatformContextService>,
    pub csrf_guard: CsrfGuard,
}

impl TenancyState for AppState {
    type OrgRepo = OrganizationRepositoryImpl;
    type MembershipRepo = MembershipRepositoryImpl;
    type SubscriptionRepo = SubscriptionRepositoryImpl;
    type PlanRepo = PlanRepositoryImpl;
    type UsageRepo = UsageRepositoryImpl;
    type Sessions = DbSessionProvider;

    fn config(&self) -> &Config {
        &self.config
    }

    fn org_context_service(&self) -> &ProdOrgContextService {
        &self.org_context_service
    }

    fn platform_context_service(&self) -> &ProdPlatformContextService {
        &self.platform_context_service
    }

    fn csrf_guard(&self) -> &CsrfGuard {
        &self.csrf_guard
    }
}

impl HasOrgScope for AppState {
    fn org_scope(&self) -> &OrgScope {
        &self.org_scope
    }
}

impl AppState {
    /// Wire repositories and services over one connection pool
    pub fn new(config: Config, pool: sqlx::PgPool) -> Result<Self> {
        let org_scope = OrgScope::new(pool.clone(), config.database.rls_role.clone())?;
        let classifier = HostClassifier::new(&config.tenancy);

        let org_repo = Arc::new(OrganizationRepositoryImpl::new(pool.clone()));
        let membership_repo = Arc::new(MembershipRepositoryImpl::new(pool.clone()));
        let subscription_repo = Arc::new(SubscriptionRepositoryImpl::new(pool.clone()));
        let plan_repo = Arc::new(PlanRepositoryImpl::new(pool.clone()));
        let usage_repo = Arc::new(UsageRepositoryImpl::new(pool.clone()));
        let sessions = Arc::new(DbSessionProvider::new(
            pool,
            config.access.session_cookie.clone(),
        ));

        let org_context_service = Arc::new(OrgContextService::new(
            classifier.clone(),
            org_repo.clone(),
            membership_repo.clone(),
            subscription_repo,
            plan_repo,
            usage_repo,
            sessions.clone(),
            Arc::new(SystemClock),
        ));
        let platform_context_service = Arc::new(PlatformContextService::new(
            classifier,
            config.tenancy.platform_org_slug.clone(),
            org_repo,
            membership_repo,
            sessions,
        ));

        Ok(Self {
            csrf_guard: CsrfGuard::new(config.csrf.secret.clone(), config.csrf.enforce),
            config: Arc::new(config),
            org_scope,
            org_context_service,
            platform_context_service,
        })
    }
}

/// Run the HTTP server
pub async fn run(config: Config, prometheus_handle: Option<PrometheusHandle>) -> Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await?;

    info!("Connected to database");

    if config.database.rls_role.is_none() {
        tracing::warn!(
            "DATABASE_RLS_ROLE is not set; organization scopes run as the connection role, \
             which bypasses row-level security if it is a superuser or table owner"
        );
    }
    if !config.csrf.enforce {
        info!("CSRF enforcement is off; violations are logged only");
    }

    let http_addr = config.http_addr();
    let state = AppState::new(config, pool)?;
    let app = build_router(state, prometheus_handle);

    let listener = TcpListener::bind(&http_addr).await?;
    info!("HTTP server started on {}", http_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Build the HTTP router with generic state type
///
/// Tenant routes sit behind `require_org_context`, platform routes behind
/// `require_platform_context`. Health and metrics are public.
pub fn build_router<S: TenancyState + HasOrgScope>(
    state: S,
    prometheus_handle: Option<PrometheusHandle>,
) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let tenant_routes = Router::new()
        .route("/api/context", get(api::context::get_context::<S>))
        .route("/api/limits/{kind}", get(api::context::get_limit))
        .route("/api/features/{key}", get(api::context::get_feature))
        .route(
            "/api/customers",
            get(api::customer::list_customers::<S>).post(api::customer::create_customer::<S>),
        )
        .route(
            "/api/billing/subscription",
            post(api::billing::ensure_subscription::<S>),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_org_context::<S>,
        ));

    let platform_routes = Router::new()
        .route(
            "/api/platform/context",
            get(api::context::get_platform_context),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_platform_context::<S>,
        ));

    let metrics_routes = Router::new()
        .route("/metrics", get(api::metrics::metrics_handler))
        .with_state(Arc::new(prometheus_handle));

    Router::new()
        .route("/health", get(api::health::health))
        .route("/ready", get(api::health::ready::<S>))
        .merge(tenant_routes)
        .merge(platform_routes)
        .with_state(state)
        .merge(metrics_routes)
        .layer(TraceLayer::new_for_http())
        .layer(ObservabilityLayer)
        .layer(cors)
}
