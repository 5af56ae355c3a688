//! Configuration for the resident issue portal.

use crate::query::{Freshness, QueryPolicies, ResourceKind};
use portal_http::{HttpClientConfig, TransportSecurity};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default tile server for the map consumer.
pub const DEFAULT_TILE_URL: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";

/// Attribution required by the default tile server.
pub const DEFAULT_TILE_ATTRIBUTION: &str =
    r#"&copy; <a href="https://www.openstreetmap.org/copyright">OpenStreetMap</a> contributors"#;

/// Portal configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PortalConfig {
    /// Absolute URL of the portal backend.
    pub api_base_url: String,

    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    pub user_agent: String,

    /// Permit a plain `http://` backend.
    pub allow_insecure_http: bool,

    /// `name=value` cookie seeded into the client, for sessions obtained
    /// out of band. Never serialized back out.
    #[serde(skip_serializing)]
    pub session_cookie: Option<String>,

    pub map: MapConfig,

    pub cache: CacheOverrides,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080".to_owned(),
            request_timeout: Duration::from_secs(30),
            user_agent: concat!("civvy-resident/", env!("CARGO_PKG_VERSION")).to_owned(),
            allow_insecure_http: false,
            session_cookie: None,
            map: MapConfig::default(),
            cache: CacheOverrides::default(),
        }
    }
}

impl fmt::Debug for PortalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortalConfig")
            .field("api_base_url", &self.api_base_url)
            .field("request_timeout", &self.request_timeout)
            .field("user_agent", &self.user_agent)
            .field("allow_insecure_http", &self.allow_insecure_http)
            .field(
                "session_cookie",
                &self.session_cookie.as_ref().map(|_| "<redacted>"),
            )
            .field("map", &self.map)
            .field("cache", &self.cache)
            .finish()
    }
}

impl PortalConfig {
    /// HTTP client settings derived from this configuration.
    #[must_use]
    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            request_timeout: self.request_timeout,
            user_agent: self.user_agent.clone(),
            transport: if self.allow_insecure_http {
                TransportSecurity::AllowInsecureHttp
            } else {
                TransportSecurity::TlsOnly
            },
            ..HttpClientConfig::for_base_url(self.api_base_url.clone())
        }
    }

    /// Default policies with the configured overrides applied.
    #[must_use]
    pub fn query_policies(&self) -> QueryPolicies {
        self.cache.apply(QueryPolicies::default())
    }
}

/// Settings handed to the map consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MapConfig {
    /// Tile URL template with `{s}`, `{z}`, `{x}`, `{y}` placeholders.
    pub tile_url: String,
    pub tile_attribution: String,
    /// `[lat, lng]` shown before the resident picks a location.
    pub default_center: [f64; 2],
    pub default_zoom: u8,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            tile_url: DEFAULT_TILE_URL.to_owned(),
            tile_attribution: DEFAULT_TILE_ATTRIBUTION.to_owned(),
            default_center: [46.8182, 8.2275],
            default_zoom: 13,
        }
    }
}

/// Partial override of one resource kind's cache policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyOverride {
    /// Humantime duration such as `"5m"`, or `"forever"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freshness: Option<Freshness>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_ceiling: Option<u32>,
}

/// Per-resource cache overrides; unset values keep the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheOverrides {
    pub tenant_info: PolicyOverride,
    pub session: PolicyOverride,
    pub categories: PolicyOverride,
    pub my_requests: PolicyOverride,
    pub request: PolicyOverride,
    pub request_timeline: PolicyOverride,
    pub public_issues: PolicyOverride,
}

impl CacheOverrides {
    fn get(&self, kind: ResourceKind) -> &PolicyOverride {
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

    /// Apply every set override on top of `policies`.
    #[must_use]
    pub fn apply(&self, mut policies: QueryPolicies) -> QueryPolicies {
        for kind in ResourceKind::ALL {
            let over = self.get(kind);
            if let Some(freshness) = over.freshness {
                policies = policies.with_freshness(kind, freshness);
            }
            if let Some(retry_ceiling) = over.retry_ceiling {
                policies = policies.with_retry_ceiling(kind, retry_ceiling);
            }
        }
        policies
    }
}

/// Serde support for `Duration` as humantime strings (`"30s"`, `"1m 30s"`).
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer, de};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text)
            .map_err(|_| de::Error::invalid_value(de::Unexpected::Str(&text), &"a duration"))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = PortalConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(!config.allow_insecure_http);
        assert_eq!(config.map.tile_url, DEFAULT_TILE_URL);
        assert!(config.map.tile_attribution.contains("OpenStreetMap"));
        assert_eq!(config.query_policies(), QueryPolicies::default());
    }

    #[test]
    fn test_config_parse_yaml() {
        let yaml = r#"
api_base_url: "https://portal.springfield.example"
request_timeout: "10s"
map:
  default_zoom: 15
cache:
  session:
    freshness: "1m"
  tenant_info:
    retry_ceiling: 5
  public_issues:
    freshness: "forever"
"#;
        let config: PortalConfig = serde_saphyr::from_str(yaml).unwrap();
        assert_eq!(config.api_base_url, "https://portal.springfield.example");
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.map.default_zoom, 15);
        assert_eq!(config.map.tile_url, DEFAULT_TILE_URL);

        let policies = config.query_policies();
        assert_eq!(policies.session.freshness, Freshness::For(Duration::from_secs(60)));
        assert_eq!(policies.session.retry_ceiling, 0);
        assert_eq!(policies.tenant_info.retry_ceiling, 5);
        assert_eq!(policies.tenant_info.freshness, Freshness::Forever);
        assert_eq!(policies.public_issues.freshness, Freshness::Forever);
    }

    #[test]
    fn test_config_reject_unknown_fields() {
        let yaml = r#"
api_base_url: "https://portal.example.org"
retries: 3
"#;
        let result: Result<PortalConfig, _> = serde_saphyr::from_str(yaml);
        assert!(result.is_err());

        let yaml = r#"
cache:
  sessions:
    freshness: "1m"
"#;
        let result: Result<PortalConfig, _> = serde_saphyr::from_str(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn test_http_client_config() {
        let config = PortalConfig {
            api_base_url: "http://localhost:9000".to_owned(),
            allow_insecure_http: true,
            request_timeout: Duration::from_secs(5),
            ..PortalConfig::default()
        };
        let http = config.http_client_config();
        assert_eq!(http.base_url, "http://localhost:9000");
        assert_eq!(http.transport, TransportSecurity::AllowInsecureHttp);
        assert_eq!(http.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_session_cookie_is_not_leaked() {
        let config = PortalConfig {
            session_cookie: Some("sid=secret".to_owned()),
            ..PortalConfig::default()
        };
        assert!(!format!("{config:?}").contains("secret"));
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("\"request_timeout\":\"30s\""));
    }
}
