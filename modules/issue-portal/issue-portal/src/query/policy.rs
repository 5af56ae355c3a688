//! Staleness windows and retry ceilings per resource kind.

use super::keys::ResourceKind;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::fmt;
use std::time::Duration;

/// How long a fetched value is served without a refetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Never stale; only invalidation triggers a refetch.
    Forever,
    /// Stale once older than the window. `ZERO` means stale immediately.
    For(Duration),
}

impl Freshness {
    #[must_use]
    pub fn is_fresh(self, age: Duration) -> bool {
        match self {
            Freshness::Forever => true,
            Freshness::For(window) => age < window,
        }
    }
}

impl fmt::Display for Freshness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Freshness::Forever => f.write_str("forever"),
            Freshness::For(window) => write!(f, "{}", humantime::format_duration(*window)),
        }
    }
}

impl Serialize for Freshness {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Freshness {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct V;

        impl de::Visitor<'_> for V {
            type Value = Freshness;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a duration such as \"5m\", or \"forever\"")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Freshness, E> {
                if v.eq_ignore_ascii_case("forever") {
                    return Ok(Freshness::Forever);
                }
                humantime::parse_duration(v)
                    .map(Freshness::For)
                    .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
            }
        }

        deserializer.deserialize_str(V)
    }
}

/// Cache behaviour for one resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryPolicy {
    pub freshness: Freshness,
    /// Further fetch attempts a failed key allows before it stays failed
    /// until invalidated.
    pub retry_ceiling: u32,
}

impl QueryPolicy {
    #[must_use]
    pub const fn new(freshness: Freshness, retry_ceiling: u32) -> Self {
        Self {
            freshness,
            retry_ceiling,
        }
    }
}

/// Resource kind to [`QueryPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPolicies {
    pub tenant_info: QueryPolicy,
    pub session: QueryPolicy,
    pub categories: QueryPolicy,
    pub my_requests: QueryPolicy,
    pub request: QueryPolicy,
    pub request_timeline: QueryPolicy,
    pub public_issues: QueryPolicy,
}

const fn minutes(m: u64) -> Freshness {
    Freshness::For(Duration::from_secs(m * 60))
}

impl Default for QueryPolicies {
    fn default() -> Self {
        Self {
            tenant_info: QueryPolicy::new(Freshness::Forever, 3),
            session: QueryPolicy::new(minutes(5), 0),
            categories: QueryPolicy::new(minutes(10), 1),
            my_requests: QueryPolicy::new(minutes(1), 1),
            request: QueryPolicy::new(Freshness::For(Duration::ZERO), 1),
            request_timeline: QueryPolicy::new(Freshness::For(Duration::ZERO), 1),
            public_issues: QueryPolicy::new(minutes(2), 1),
        }
    }
}

impl QueryPolicies {
    #[must_use]
    pub fn get(&self, kind: ResourceKind) -> QueryPolicy {
        *self.slot(kind)
    }

    /// Replace the policy of one kind.
    #[must_use]
    pub fn with(mut self, kind: ResourceKind, policy: QueryPolicy) -> Self {
        *self.slot_mut(kind) = policy;
        self
    }

    /// Override only the freshness of one kind.
    #[must_use]
    pub fn with_freshness(mut self, kind: ResourceKind, freshness: Freshness) -> Self {
        self.slot_mut(kind).freshness = freshness;
        self
    }

    /// Override only the retry ceiling of one kind.
    #[must_use]
    pub fn with_retry_ceiling(mut self, kind: ResourceKind, retry_ceiling: u32) -> Self {
        self.slot_mut(kind).retry_ceiling = retry_ceiling;
        self
    }

    fn slot(&self, kind: ResourceKind) -> &QueryPolicy {
        match kind {
            ResourceKind::TenantInfo => &self.tenant_info,
            ResourceKind::Session => &self.session,
            ResourceKind::Categories => &self.categories,
            ResourceKind::MyRequests => &self.my_requests,
            ResourceKind::Request => &self.request,
            ResourceKind::RequestTimeline => &self.request_timeline,
            ResourceKind::PublicIssues => &self.public_issues,
        }
    }

    fn slot_mut(&mut self, kind: ResourceKind) -> &mut QueryPolicy {
        match kind {
            ResourceKind::TenantInfo => &mut self.tenant_info,
            ResourceKind::Session => &mut self.session,
            ResourceKind::Categories => &mut self.categories,
            ResourceKind::MyRequests => &mut self.my_requests,
            ResourceKind::Request => &mut self.request,
            ResourceKind::RequestTimeline => &mut self.request_timeline,
            ResourceKind::PublicIssues => &mut self.public_issues,
        }
    }
}
