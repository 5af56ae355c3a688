//! Client settings. Every field has a default except `base_url`.

use std::time::Duration;

/// Sent when the embedding application does not set its own.
pub const DEFAULT_USER_AGENT: &str = concat!("portal-http/", env!("CARGO_PKG_VERSION"));

const MIB: usize = 1024 * 1024;

/// Where trusted root certificates come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TlsRootConfig {
    /// Bundled Mozilla roots; works in minimal containers.
    #[default]
    WebPki,
    /// The operating system's certificate store.
    Native,
}

/// Whether `http://` base URLs are accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportSecurity {
    #[default]
    TlsOnly,
    /// For local backends and mock servers. The session cookie travels in
    /// clear text.
    AllowInsecureHttp,
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Absolute URL that request paths are joined onto. Left empty, the
    /// build fails with `InvalidUriKind::MissingBaseUrl`.
    pub base_url: String,

    /// Upper bound for one request, response body included.
    pub request_timeout: Duration,

    /// Responses larger than this fail with `HttpError::BodyTooLarge`.
    pub max_body_size: usize,

    pub user_agent: String,

    pub transport: TransportSecurity,

    pub tls_roots: TlsRootConfig,

    /// Queued requests beyond this fail fast with `HttpError::Overloaded`.
    pub buffer_capacity: usize,

    pub pool_idle_timeout: Option<Duration>,

    pub pool_max_idle_per_host: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            request_timeout: Duration::from_secs(30),
            max_body_size: 10 * MIB,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            transport: TransportSecurity::TlsOnly,
            tls_roots: TlsRootConfig::WebPki,
            buffer_capacity: 256,
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 8,
        }
    }
}

impl HttpClientConfig {
    /// Defaults pointed at `base_url`.
    #[must_use]
    pub fn for_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Small limits and plain HTTP, for `httpmock` servers.
    #[must_use]
    pub fn for_testing(base_url: impl Into<String>) -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            max_body_size: MIB,
            transport: TransportSecurity::AllowInsecureHttp,
            buffer_capacity: 64,
            pool_idle_timeout: Some(Duration::from_secs(10)),
            pool_max_idle_per_host: 4,
            ..Self::for_base_url(base_url)
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_default_requires_tls_and_a_base_url() {
        let config = HttpClientConfig::default();
        assert_eq!(config.transport, TransportSecurity::TlsOnly);
        assert_eq!(config.tls_roots, TlsRootConfig::WebPki);
        assert!(config.base_url.is_empty());
        assert!(config.user_agent.starts_with("portal-http/"));
    }

    #[test]
    fn test_for_testing_allows_plain_http() {
        let config = HttpClientConfig::for_testing("http://127.0.0.1:8080");
        assert_eq!(config.transport, TransportSecurity::AllowInsecureHttp);
        assert_eq!(config.base_url, "http://127.0.0.1:8080");
        assert_eq!(config.max_body_size, MIB);
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    }
}
