//! Common test utilities
//!
//! Integration tests run against the Postgres instance named by
//! `DATABASE_URL` and skip themselves when it is unreachable. Every test
//! creates its own organizations with random slugs, so tests can share one
//! database and run concurrently.

#![allow(dead_code)]

use chrono::{Duration, Utc};
use reefline_core::config::{
    AccessConfig, Config, CsrfConfig, DatabaseConfig, TelemetryConfig, TenancyConfig,
};
use reefline_core::domain::Role;
use reefline_core::scope::OrgScope;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Once;
use uuid::Uuid;

/// Role the migrations create for scoped work
pub const RLS_ROLE: &str = "reefline_app";
pub const BASE_DOMAIN: &str = "reefline.test";
pub const CSRF_SECRET: &str = "integration-csrf-secret";

static ENV_INIT: Once = Once::new();

fn init_env() {
    ENV_INIT.call_once(|| {
        let _ = dotenvy::dotenv();
    });
}

/// Connect to the test database and apply migrations
pub async fn get_test_pool() -> Result<PgPool, sqlx::Error> {
    init_env();

    let url = std::env::var("DATABASE_URL")
        .map_err(|_| sqlx::Error::Configuration("DATABASE_URL is not set".into()))?;

    let pool = PgPoolOptions::new()
        .max_connections(8)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

pub fn org_scope(pool: &PgPool) -> OrgScope {
    OrgScope::new(pool.clone(), Some(RLS_ROLE.to_string())).unwrap()
}

pub fn test_config() -> Config {
    Config {
        http_host: "127.0.0.1".to_string(),
        http_port: 0,
        database: DatabaseConfig {
            url: std::env::var("DATABASE_URL").unwrap_or_default(),
            max_connections: 8,
            min_connections: 0,
            rls_role: Some(RLS_ROLE.to_string()),
        },
        tenancy: TenancyConfig {
            base_domain: BASE_DOMAIN.to_string(),
            ..Default::default()
        },
        access: AccessConfig::default(),
        csrf: CsrfConfig {
            secret: CSRF_SECRET.to_string(),
            enforce: true,
        },
        telemetry: TelemetryConfig::default(),
    }
}

/// Random slug that is a valid DNS label and never reserved
pub fn unique_slug(prefix: &str) -> String {
    format!("{}-{}", prefix, &Uuid::new_v4().simple().to_string()[..12])
}

pub async fn create_organization(pool: &PgPool, slug: &str, name: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO organizations (id, name, slug) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(name)
        .bind(slug)
        .execute(pool)
        .await
        .unwrap();
    id
}

pub async fn deactivate_organization(pool: &PgPool, id: Uuid) {
    sqlx::query("UPDATE organizations SET is_active = FALSE WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .unwrap();
}

pub async fn create_user(pool: &PgPool) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, email, name) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(format!("{}@example.test", id.simple()))
        .bind("Test Diver")
        .execute(pool)
        .await
        .unwrap();
    id
}

pub async fn add_member(pool: &PgPool, user_id: Uuid, organization_id: Uuid, role: Role) {
    sqlx::query(
        "INSERT INTO members (id, user_id, organization_id, role) VALUES ($1, $2, $3, $4)",
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(organization_id)
    .bind(role.to_string())
    .execute(pool)
    .await
    .unwrap();
}

/// Create a live session and return its id and token
pub async fn create_session(pool: &PgPool, user_id: Uuid) -> (Uuid, String) {
    let id = Uuid::new_v4();
    let token = Uuid::new_v4().simple().to_string();
    sqlx::query("INSERT INTO sessions (id, token, user_id, expires_at) VALUES ($1, $2, $3, $4)")
        .bind(id)
        .bind(&token)
        .bind(user_id)
        .bind(Utc::now() + Duration::hours(1))
        .execute(pool)
        .await
        .unwrap();
    (id, token)
}

/// Insert tenant rows directly (as the connection role, outside any scope)
pub async fn seed_customers(pool: &PgPool, organization_id: Uuid, count: usize) {
    for i in 0..count {
        sqlx::query(
            "INSERT INTO customers (id, organization_id, email, first_name, last_name) \
             VALUES ($1, $2, $3, 'Seed', 'Customer')",
        )
        .bind(Uuid::new_v4())
        .bind(organization_id)
        .bind(format!("seed{}@example.test", i))
        .execute(pool)
        .await
        .unwrap();
    }
}

pub async fn seed_booking(
    pool: &PgPool,
    organization_id: Uuid,
    created_at: chrono::DateTime<Utc>,
) {
    sqlx::query("INSERT INTO bookings (id, organization_id, created_at) VALUES ($1, $2, $3)")
        .bind(Uuid::new_v4())
        .bind(organization_id)
        .bind(created_at)
        .execute(pool)
        .await
        .unwrap();
}
