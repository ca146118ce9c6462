//! Tenant directory: organization lookup by host-derived keys
//!
//! Lookups are advisory. A store error is logged and reported as "not found";
//! the caller decides whether absence is fatal.

use crate::domain::Organization;
use crate::repository::OrganizationRepository;
use crate::service::host::{is_reserved, HostClass, HostClassifier};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct TenantDirectory<R: OrganizationRepository> {
    repo: Arc<R>,
    classifier: HostClassifier,
}

impl<R: OrganizationRepository> TenantDirectory<R> {
    pub fn new(repo: Arc<R>, classifier: HostClassifier) -> Self {
        Self { repo, classifier }
    }

    pub fn classifier(&self) -> &HostClassifier {
        &self.classifier
    }

    pub async fn find_by_slug(&self, slug: &str) -> Option<Organization> {
        let slug = slug.trim().to_lowercase();
        if slug.is_empty() || is_reserved(&slug) {
            debug!(slug = %slug, "Refusing directory lookup for reserved slug");
            return None;
        }

        match self.repo.find_by_slug(&slug).await {
            Ok(org) => org,
            Err(e) => {
                warn!(slug = %slug, error = %e, "Organization lookup by slug failed");
                None
            }
        }
    }

    pub async fn find_by_custom_domain(&self, domain: &str) -> Option<Organization> {
        let domain = domain.trim().to_lowercase();
        if domain.is_empty() {
            return None;
        }

        match self.repo.find_by_custom_domain(&domain).await {
            Ok(org) => org,
            Err(e) => {
                warn!(domain = %domain, error = %e, "Organization lookup by custom domain failed");
                None
            }
        }
    }

    /// Public-site resolution: subdomain or custom domain, nothing else
    pub async fn resolve_host(&self, host: &str) -> Option<Organization> {
        match self.classifier.classify(host) {
            HostClass::Subdomain(slug) => self.find_by_slug(&slug).await,
            HostClass::CustomDomain(domain) => self.find_by_custom_domain(&domain).await,
            HostClass::NoTenant | HostClass::Reserved(_) => None,
        }
    }
}
