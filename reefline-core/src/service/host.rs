//! Host classification
//!
//! Maps a raw `Host` header value to the kind of site being addressed. Pure
//! and total: no I/O, no panics, every input string yields a variant.

use crate::config::TenancyConfig;
use crate::domain::SLUG_REGEX;

/// Labels that can never be tenant slugs
pub const RESERVED_LABELS: &[&str] = &[
    "www",
    "app",
    "api",
    "admin",
    "dashboard",
    "staging",
    "dev",
    "mail",
    "smtp",
    "ftp",
    "cdn",
    "assets",
    "static",
    "docs",
    "help",
    "support",
    "status",
    "blog",
];

pub const PLATFORM_ADMIN_LABEL: &str = "admin";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostClass {
    /// Marketing site, bare platform domain, or a host we do not serve tenants on
    NoTenant,
    /// A denylisted label; `admin` routes to the platform console
    Reserved(String),
    /// One-level tenant subdomain
    Subdomain(String),
    /// Anything outside the platform domain. Validity is decided by lookup.
    CustomDomain(String),
}

impl HostClass {
    pub fn is_platform_admin(&self) -> bool {
        matches!(self, HostClass::Reserved(label) if label == PLATFORM_ADMIN_LABEL)
    }

    pub fn slug(&self) -> Option<&str> {
        match self {
            HostClass::Subdomain(slug) => Some(slug),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HostClassifier {
    base_domain: String,
    staging_segment: String,
}

impl HostClassifier {
    pub fn new(config: &TenancyConfig) -> Self {
        Self {
            base_domain: config.base_domain.trim().trim_matches('.').to_lowercase(),
            staging_segment: config.staging_segment.trim().to_lowercase(),
        }
    }

    pub fn base_domain(&self) -> &str {
        &self.base_domain
    }

    pub fn classify(&self, raw_host: &str) -> HostClass {
        let host = normalize_host(raw_host);
        if host.is_empty() {
            return HostClass::NoTenant;
        }

        if host == self.base_domain {
            return HostClass::NoTenant;
        }

        let prefix = match host
            .strip_suffix(self.base_domain.as_str())
            .and_then(|rest| rest.strip_suffix('.'))
        {
            Some(prefix) => prefix,
            None => return HostClass::CustomDomain(host),
        };
        if prefix.is_empty() {
            return HostClass::NoTenant;
        }

        // Dedicated platform console hosts, checked before tenant parsing
        if prefix == PLATFORM_ADMIN_LABEL
            || prefix == format!("{}-{}", PLATFORM_ADMIN_LABEL, self.staging_segment)
            || prefix == format!("{}.{}", PLATFORM_ADMIN_LABEL, self.staging_segment)
        {
            return HostClass::Reserved(PLATFORM_ADMIN_LABEL.to_string());
        }

        let labels: Vec<&str> = prefix.split('.').collect();
        let label = match labels.as_slice() {
            [only] if *only == self.staging_segment => return HostClass::NoTenant,
            [only] => *only,
            [first, second] if *second == self.staging_segment => *first,
            // Only one level of tenant subdomain is supported
            _ => return HostClass::NoTenant,
        };

        if label == "www" {
            return HostClass::NoTenant;
        }

        if !SLUG_REGEX.is_match(label) {
            return HostClass::NoTenant;
        }

        if is_reserved(label) {
            return HostClass::Reserved(label.to_string());
        }

        HostClass::Subdomain(label.to_string())
    }
}

pub fn is_reserved(label: &str) -> bool {
    RESERVED_LABELS.contains(&label)
}

/// Trim, drop a trailing dot and the port, and lowercase
fn normalize_host(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_port = if trimmed.starts_with('[') {
        // IPv6 literal: keep the bracketed address, drop any port after it
        match trimmed.find(']') {
            Some(end) => &trimmed[..=end],
            None => trimmed,
        }
    } else {
        match trimmed.rsplit_once(':') {
            Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
            _ => trimmed,
        }
    };
    without_port.trim_end_matches('.').to_lowercase()
}
