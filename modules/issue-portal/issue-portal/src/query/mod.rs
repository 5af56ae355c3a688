//! Cache/query orchestration for portal resources.

mod keys;
mod policy;
mod store;

pub use keys::{BBOX_KEY_PRECISION, BboxKey, KeyParseError, ResourceKey, ResourceKind};
pub use policy::{Freshness, QueryPolicies, QueryPolicy};
pub use store::{QuerySnapshot, QueryStatus, QueryStore};

use issue_portal_sdk::{Category, PublicIssue, Request, Session, TenantInfo, TimelineEvent};

/// Owned cache of every portal resource, one typed store per kind.
///
/// Constructed explicitly and injected into the service; dropping it drops
/// all cached state.
pub struct QueryCache {
    policies: QueryPolicies,
    tenant_info: QueryStore<TenantInfo>,
    session: QueryStore<Session>,
    categories: QueryStore<Vec<Category>>,
    my_requests: QueryStore<Vec<Request>>,
    requests: QueryStore<Request>,
    timelines: QueryStore<Vec<TimelineEvent>>,
    public_issues: QueryStore<Vec<PublicIssue>>,
}

impl QueryCache {
    #[must_use]
    pub fn new(policies: QueryPolicies) -> Self {
        Self {
            policies,
            tenant_info: QueryStore::new(),
            session: QueryStore::new(),
            categories: QueryStore::new(),
            my_requests: QueryStore::new(),
            requests: QueryStore::new(),
            timelines: QueryStore::new(),
            public_issues: QueryStore::new(),
        }
    }

    #[must_use]
    pub fn policies(&self) -> &QueryPolicies {
        &self.policies
    }

    #[must_use]
    pub fn policy(&self, kind: ResourceKind) -> QueryPolicy {
        self.policies.get(kind)
    }

    /// Return `key` to empty so the next read fetches in the foreground.
    pub fn invalidate(&self, key: &ResourceKey) {
        match key.kind() {
            ResourceKind::TenantInfo => self.tenant_info.invalidate(key),
            ResourceKind::Session => self.session.invalidate(key),
            ResourceKind::Categories => self.categories.invalidate(key),
            ResourceKind::MyRequests => self.my_requests.invalidate(key),
            ResourceKind::Request => self.requests.invalidate(key),
            ResourceKind::RequestTimeline => self.timelines.invalidate(key),
            ResourceKind::PublicIssues => self.public_issues.invalidate(key),
        }
    }

    /// Whether a read of `key` would be served without a fetch.
    #[must_use]
    pub fn is_fresh(&self, key: &ResourceKey) -> bool {
        let policy = self.policy(key.kind());
        match key.kind() {
            ResourceKind::TenantInfo => self.tenant_info.is_fresh(key, policy),
            ResourceKind::Session => self.session.is_fresh(key, policy),
            ResourceKind::Categories => self.categories.is_fresh(key, policy),
            ResourceKind::MyRequests => self.my_requests.is_fresh(key, policy),
            ResourceKind::Request => self.requests.is_fresh(key, policy),
            ResourceKind::RequestTimeline => self.timelines.is_fresh(key, policy),
            ResourceKind::PublicIssues => self.public_issues.is_fresh(key, policy),
        }
    }

    /// Drop every cached value. Subscribers stay attached and see `Empty`.
    pub fn clear(&self) {
        tracing::debug!("clearing query cache");
        self.tenant_info.clear();
        self.session.clear();
        self.categories.clear();
        self.my_requests.clear();
        self.requests.clear();
        self.timelines.clear();
        self.public_issues.clear();
    }

    #[must_use]
    pub fn tenant_info(&self) -> &QueryStore<TenantInfo> {
        &self.tenant_info
    }

    #[must_use]
    pub fn session(&self) -> &QueryStore<Session> {
        &self.session
    }

    #[must_use]
    pub fn categories(&self) -> &QueryStore<Vec<Category>> {
        &self.categories
    }

    #[must_use]
    pub fn my_requests(&self) -> &QueryStore<Vec<Request>> {
        &self.my_requests
    }

    #[must_use]
    pub fn requests(&self) -> &QueryStore<Request> {
        &self.requests
    }

    #[must_use]
    pub fn timelines(&self) -> &QueryStore<Vec<TimelineEvent>> {
        &self.timelines
    }

    #[must_use]
    pub fn public_issues(&self) -> &QueryStore<Vec<PublicIssue>> {
        &self.public_issues
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(QueryPolicies::default())
    }
}
