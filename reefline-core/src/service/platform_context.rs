//! Platform admin context
//!
//! The admin host resolves to a fixed sentinel organization instead of a
//! subdomain. Platform staff are ordinary members of that organization.

use crate::domain::PlatformContext;
use crate::repository::{MembershipRepository, OrganizationRepository};
use crate::service::host::HostClassifier;
use crate::service::session::SessionProvider;
use axum::http::HeaderMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

pub struct PlatformContextService<
    O: OrganizationRepository,
    M: MembershipRepository,
    A: SessionProvider,
> {
    classifier: HostClassifier,
    platform_slug: String,
    orgs: Arc<O>,
    memberships: Arc<M>,
    sessions: Arc<A>,
}

impl<O: OrganizationRepository, M: MembershipRepository, A: SessionProvider>
    PlatformContextService<O, M, A>
{
    pub fn new(
        classifier: HostClassifier,
        platform_slug: impl Into<String>,
        orgs: Arc<O>,
        memberships: Arc<M>,
        sessions: Arc<A>,
    ) -> Self {
        Self {
            classifier,
            platform_slug: platform_slug.into(),
            orgs,
            memberships,
            sessions,
        }
    }

    pub fn is_platform_host(&self, host: &str) -> bool {
        self.classifier.classify(host).is_platform_admin()
    }

    pub async fn get_platform_context(
        &self,
        host: &str,
        headers: &HeaderMap,
    ) -> Option<PlatformContext> {
        if !self.is_platform_host(host) {
            debug!(host = %host, "Not the platform admin host");
            return None;
        }

        let auth = match self.sessions.get_session(headers).await {
            Ok(Some(auth)) => auth,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Session lookup failed on platform host");
                return None;
            }
        };

        // The sentinel slug may itself be a reserved label, so this bypasses
        // the tenant directory's denylist
        let org = match self.orgs.find_by_slug(&self.platform_slug).await {
            Ok(Some(org)) => org,
            Ok(None) => {
                error!(
                    category = "configuration",
                    slug = %self.platform_slug,
                    "Platform organization is missing"
                );
                return None;
            }
            Err(e) => {
                warn!(slug = %self.platform_slug, error = %e, "Platform organization lookup failed");
                return None;
            }
        };

        let membership = match self.memberships.find(auth.user.id, org.id).await {
            Ok(Some(membership)) => membership,
            Ok(None) => {
                debug!(user_id = %auth.user.id, "User is not platform staff");
                return None;
            }
            Err(e) => {
                warn!(user_id = %auth.user.id, error = %e, "Platform membership lookup failed");
                return None;
            }
        };

        Some(PlatformContext::from_membership(auth, org, membership))
    }
}
