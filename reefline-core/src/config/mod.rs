//! Configuration management for Reefline Core

use anyhow::{Context, Result};
use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server host
    pub http_host: String,
    /// HTTP server port
    pub http_port: u16,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Host classification and platform settings
    pub tenancy: TenancyConfig,
    /// Redirect targets and session cookie used by the access gate
    pub access: AccessConfig,
    /// CSRF token settings
    pub csrf: CsrfConfig,
    /// Logging and metrics
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// Unprivileged role assumed inside organization scopes so that
    /// row-level security policies apply (superusers bypass them)
    pub rls_role: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TenancyConfig {
    /// The platform's own domain, e.g. `reefline.app` or `localhost`
    pub base_domain: String,
    /// Extra label inserted by staging hosts: `{slug}.staging.{base}`
    pub staging_segment: String,
    /// Slug of the sentinel organization whose members are platform staff
    pub platform_org_slug: String,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            base_domain: "localhost".to_string(),
            staging_segment: "staging".to_string(),
            platform_org_slug: "platform".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AccessConfig {
    pub session_cookie: String,
    pub tenant_login_path: String,
    pub generic_login_path: String,
    pub change_password_path: String,
    pub logout_path: String,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            session_cookie: "reefline.session_token".to_string(),
            tenant_login_path: "/auth/login".to_string(),
            generic_login_path: "/login".to_string(),
            change_password_path: "/auth/change-password".to_string(),
            logout_path: "/auth/logout".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CsrfConfig {
    pub secret: String,
    /// When false, violations are logged but requests proceed (rollout grace period)
    pub enforce: bool,
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// "json" or "text"
    pub log_format: String,
    pub metrics_enabled: bool,
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            metrics_enabled: false,
            service_name: "reefline-core".to_string(),
        }
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|s| s.to_lowercase() == "true")
        .unwrap_or(false)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let tenancy_defaults = TenancyConfig::default();
        let access_defaults = AccessConfig::default();

        Ok(Self {
            http_host: env::var("HTTP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: env::var("HTTP_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("Invalid HTTP_PORT")?,
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").context("DATABASE_URL is required")?,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
                min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()
                    .unwrap_or(2),
                rls_role: env::var("DATABASE_RLS_ROLE")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
            },
            tenancy: TenancyConfig {
                base_domain: env::var("BASE_DOMAIN")
                    .map(|s| s.trim().to_lowercase())
                    .unwrap_or(tenancy_defaults.base_domain),
                staging_segment: env::var("STAGING_SEGMENT")
                    .unwrap_or(tenancy_defaults.staging_segment),
                platform_org_slug: env::var("PLATFORM_ORG_SLUG")
                    .unwrap_or(tenancy_defaults.platform_org_slug),
            },
            access: AccessConfig {
                session_cookie: env::var("SESSION_COOKIE_NAME")
                    .unwrap_or(access_defaults.session_cookie),
                tenant_login_path: env::var("TENANT_LOGIN_PATH")
                    .unwrap_or(access_defaults.tenant_login_path),
                generic_login_path: env::var("GENERIC_LOGIN_PATH")
                    .unwrap_or(access_defaults.generic_login_path),
                change_password_path: env::var("CHANGE_PASSWORD_PATH")
                    .unwrap_or(access_defaults.change_password_path),
                logout_path: env::var("LOGOUT_PATH").unwrap_or(access_defaults.logout_path),
            },
            csrf: CsrfConfig {
                secret: env::var("CSRF_SECRET").context("CSRF_SECRET is required")?,
                enforce: env_flag("CSRF_ENFORCE"),
            },
            telemetry: TelemetryConfig {
                log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string()),
                metrics_enabled: env_flag("METRICS_ENABLED"),
                service_name: env::var("OTEL_SERVICE_NAME")
                    .unwrap_or_else(|_| "reefline-core".to_string()),
            },
        })
    }

    /// Get HTTP server address
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}
