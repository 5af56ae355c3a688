use crate::config::{HttpClientConfig, TransportSecurity};
use crate::error::HttpError;
use crate::layers::{CookieJar, CookieLayer, DefaultHeadersLayer};
use crate::query::parse_base_url;
use crate::response::ResponseBody;
use crate::tls::build_https_connector;
use bytes::Bytes;
use http::Response;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use std::time::Duration;
use tower::buffer::Buffer;
use tower::timeout::TimeoutLayer;
use tower::{ServiceBuilder, ServiceExt};
use tower_http::decompression::DecompressionLayer;

/// Builds an [`HttpClient`](crate::HttpClient): config, cookie jar, then the
/// tower stack on top of a pooled hyper client.
pub struct HttpClientBuilder {
    config: HttpClientConfig,
    cookie_jar: Option<CookieJar>,
}

impl HttpClientBuilder {
    /// Create a new builder with default configuration
    ///
    /// A base URL must be set before [`build`](Self::build).
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: HttpClientConfig::default(),
            cookie_jar: None,
        }
    }

    /// Create a builder with a specific configuration
    #[must_use]
    pub fn with_config(config: HttpClientConfig) -> Self {
        Self {
            config,
            cookie_jar: None,
        }
    }

    /// Set the API base URL every request path is resolved against
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    /// Set the per-request timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the maximum response body size
    #[must_use]
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    /// Set transport security mode
    ///
    /// Use `TransportSecurity::AllowInsecureHttp` only against local or mock servers.
    #[must_use]
    pub fn transport(mut self, transport: TransportSecurity) -> Self {
        self.config.transport = transport;
        self
    }

    /// Use an existing cookie jar instead of a fresh one
    ///
    /// Lets callers seed a session cookie or share credentials between clients.
    #[must_use]
    pub fn cookie_jar(mut self, jar: CookieJar) -> Self {
        self.cookie_jar = Some(jar);
        self
    }

    /// Set the request queue capacity (clamped to at least 1)
    #[must_use]
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.buffer_capacity = capacity.max(1);
        self
    }

    /// Build the HTTP client with all configured layers
    ///
    /// # Errors
    /// Returns an error if the base URL is missing or invalid, the user agent
    /// is not a valid header value, or TLS initialization fails.
    pub fn build(self) -> Result<crate::HttpClient, HttpError> {
        let base_url = parse_base_url(&self.config.base_url)?;

        if self.config.transport == TransportSecurity::AllowInsecureHttp {
            tracing::warn!(
                base_url = %base_url,
                "insecure HTTP enabled (TransportSecurity::AllowInsecureHttp); \
                 use only for testing with mock servers"
            );
        }

        let timeout = self.config.request_timeout;
        let https = build_https_connector(self.config.tls_roots, self.config.transport)?;

        let mut client_builder = Client::builder(TokioExecutor::new());
        // pool_timer is required for pool_idle_timeout to take effect
        client_builder
            .pool_timer(TokioTimer::new())
            .pool_max_idle_per_host(self.config.pool_max_idle_per_host)
            .http2_only(false);
        if let Some(idle_timeout) = self.config.pool_idle_timeout {
            client_builder.pool_idle_timeout(idle_timeout);
        }
        let hyper_client = client_builder.build::<_, Full<Bytes>>(https);

        let headers_layer = DefaultHeadersLayer::try_new(&self.config.user_agent)?;
        let cookies = self.cookie_jar.unwrap_or_default();

        // Request flow (outer -> inner):
        //   Buffer -> ErrorMapping -> Timeout -> DefaultHeaders -> Cookies ->
        //   Decompression -> hyper_client
        //
        // The cookie layer sits inside the timeout so a timed-out request
        // never records cookies from a response nobody will read.
        let service = ServiceBuilder::new()
            .layer(TimeoutLayer::new(timeout))
            .layer(headers_layer)
            .layer(CookieLayer::new(cookies.clone()))
            .layer(DecompressionLayer::new())
            .service(hyper_client);

        let service = service
            .map_response(map_decompression_response)
            .map_err(move |e: tower::BoxError| map_tower_error(e, timeout));

        let buffer_capacity = self.config.buffer_capacity.max(1);
        let buffered_service: crate::client::BufferedService =
            Buffer::new(service.boxed_clone(), buffer_capacity);

        Ok(crate::HttpClient {
            service: buffered_service,
            max_body_size: self.config.max_body_size,
            transport_security: self.config.transport,
            base_url,
            cookies,
        })
    }
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Map tower errors to `HttpError`, keeping typed errors boxed by middleware
fn map_tower_error(err: tower::BoxError, timeout: Duration) -> HttpError {
    if err.is::<tower::timeout::error::Elapsed>() {
        return HttpError::Timeout(timeout);
    }

    match err.downcast::<HttpError>() {
        Ok(http_err) => *http_err,
        Err(other) => HttpError::Transport(other),
    }
}

fn map_decompression_response<B>(response: Response<B>) -> Response<ResponseBody>
where
    B: hyper::body::Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = response.into_parts();
    let boxed_body: ResponseBody = body.map_err(Into::into).boxed();
    Response::from_parts(parts, boxed_body)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::config::DEFAULT_USER_AGENT;
    use crate::error::InvalidUriKind;
    use crate::query::QueryParams;
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn test_builder_default() {
        let builder = HttpClientBuilder::new();
        assert_eq!(builder.config.request_timeout, Duration::from_secs(30));
        assert_eq!(builder.config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(builder.config.transport, TransportSecurity::TlsOnly);
    }

    #[test]
    fn test_builder_buffer_capacity_zero_clamped() {
        let builder = HttpClientBuilder::new().buffer_capacity(0);
        assert_eq!(builder.config.buffer_capacity, 1);
    }

    #[tokio::test]
    async fn test_build_requires_base_url() {
        let err = HttpClientBuilder::new().build().unwrap_err();
        assert!(matches!(
            err,
            HttpError::InvalidUri {
                kind: InvalidUriKind::MissingBaseUrl,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_build_invalid_user_agent() {
        let result = HttpClientBuilder::new()
            .base_url("https://portal.example.org")
            .user_agent("bad\nagent")
            .build();
        assert!(matches!(result, Err(HttpError::InvalidHeaderValue(_))));
    }

    #[tokio::test]
    async fn test_shared_cookie_jar_is_seeded() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/v1/auth/session")
                .header("cookie", "sid=seeded");
            then.status(200).json_body(json!({"authenticated": true}));
        });

        let jar = CookieJar::new();
        jar.apply_set_cookie(&server.host(), "sid=seeded");

        let client = HttpClientBuilder::with_config(HttpClientConfig::for_testing(server.base_url()))
            .cookie_jar(jar)
            .build()
            .unwrap();
        client
            .get_json("/api/v1/auth/session", &QueryParams::new())
            .await
            .unwrap();

        mock.assert();
    }

    #[tokio::test]
    async fn test_timeout_maps_to_timeout_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/slow");
            then.status(200).delay(Duration::from_millis(500));
        });

        let client = HttpClientBuilder::with_config(HttpClientConfig::for_testing(server.base_url()))
            .timeout(Duration::from_millis(50))
            .build()
            .unwrap();

        let err = client.get("/slow").send().await.unwrap_err();
        assert!(matches!(err, HttpError::Timeout(d) if d == Duration::from_millis(50)));
    }

    #[tokio::test]
    async fn test_gzip_response_is_decompressed() {
        use flate2::Compression;
        use flate2::write::GzEncoder;
        use std::io::Write;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(br#"{"id":"t1","name":"Springfield"}"#).unwrap();
        let compressed = encoder.finish().unwrap();

        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/public/tenant-info");
            then.status(200)
                .header("content-encoding", "gzip")
                .header("content-type", "application/json")
                .body(compressed);
        });

        let client = HttpClientBuilder::with_config(HttpClientConfig::for_testing(server.base_url()))
            .build()
            .unwrap();
        let value = client
            .get_json("/api/v1/public/tenant-info", &QueryParams::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(value["name"], "Springfield");
    }

    #[test]
    fn test_map_tower_error_preserves_http_error() {
        let err: tower::BoxError = Box::new(HttpError::Overloaded);
        assert!(matches!(
            map_tower_error(err, Duration::from_secs(1)),
            HttpError::Overloaded
        ));
    }

    #[test]
    fn test_map_tower_error_wraps_unknown_as_transport() {
        let err: tower::BoxError = Box::new(std::io::Error::other("reset"));
        assert!(matches!(
            map_tower_error(err, Duration::from_secs(1)),
            HttpError::Transport(_)
        ));
    }
}
