//! Cookie-based session credentials.
//!
//! The portal backend authenticates with a session cookie set during the
//! out-of-band login redirect. Every request replays the cookies stored for
//! its host, and every response's `Set-Cookie` headers update the jar,
//! including removal through `Max-Age=0` or a past `Expires`.
//!
//! Cookies are scoped to the exact host that set them; `Domain` and `Path`
//! attributes are not interpreted since the client talks to one API origin.

use cookie::Cookie;
use http::header::{COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderValue, Request, Response};
use parking_lot::RwLock;
use pin_project_lite::pin_project;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};
use time::OffsetDateTime;
use tower::{Layer, Service};

/// Shared, thread-safe cookie store keyed by host.
///
/// Cloning is cheap and clones share the same storage, so a jar can be
/// handed to the client builder and still inspected or seeded afterwards.
#[derive(Clone, Default)]
pub struct CookieJar {
    hosts: Arc<RwLock<HashMap<String, BTreeMap<String, String>>>>,
}

impl std::fmt::Debug for CookieJar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Cookie values are credentials; only names are printed.
        let hosts = self.hosts.read();
        let mut map = f.debug_map();
        for (host, cookies) in hosts.iter() {
            map.entry(host, &cookies.keys().collect::<Vec<_>>());
        }
        map.finish()
    }
}

impl CookieJar {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one `Set-Cookie` header value for `host`.
    ///
    /// Returns `false` if the value could not be parsed.
    pub fn apply_set_cookie(&self, host: &str, set_cookie: &str) -> bool {
        let Ok(parsed) = Cookie::parse(set_cookie.to_owned()) else {
            tracing::debug!(host, "ignoring unparsable Set-Cookie header");
            return false;
        };

        let mut hosts = self.hosts.write();
        let cookies = hosts.entry(host.to_ascii_lowercase()).or_default();
        if is_removal(&parsed) {
            cookies.remove(parsed.name());
        } else {
            cookies.insert(parsed.name().to_owned(), parsed.value().to_owned());
        }
        true
    }

    /// Record every `Set-Cookie` header of a response.
    pub fn store_from_headers(&self, host: &str, headers: &HeaderMap) {
        for value in headers.get_all(SET_COOKIE) {
            if let Ok(value) = value.to_str() {
                self.apply_set_cookie(host, value);
            }
        }
    }

    /// Current value of cookie `name` for `host`.
    #[must_use]
    pub fn get(&self, host: &str, name: &str) -> Option<String> {
        self.hosts
            .read()
            .get(&host.to_ascii_lowercase())
            .and_then(|cookies| cookies.get(name).cloned())
    }

    /// `Cookie` request header value for `host`, if any cookie is stored.
    #[must_use]
    pub fn header_value(&self, host: &str) -> Option<HeaderValue> {
        let hosts = self.hosts.read();
        let cookies = hosts.get(&host.to_ascii_lowercase())?;
        if cookies.is_empty() {
            return None;
        }
        let joined = cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        HeaderValue::from_str(&joined).ok()
    }

    /// Drop every stored cookie.
    pub fn clear(&self) {
        self.hosts.write().clear();
    }
}

fn is_removal(cookie: &Cookie<'_>) -> bool {
    if cookie
        .max_age()
        .is_some_and(|age| age <= time::Duration::ZERO)
    {
        return true;
    }
    cookie
        .expires_datetime()
        .is_some_and(|expires| expires <= OffsetDateTime::now_utc())
}

/// Tower layer wiring a [`CookieJar`] into the request path.
#[derive(Clone)]
pub struct CookieLayer {
    jar: CookieJar,
}

impl CookieLayer {
    #[must_use]
    pub fn new(jar: CookieJar) -> Self {
        Self { jar }
    }
}

impl<S> Layer<S> for CookieLayer {
    type Service = CookieService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CookieService {
            inner,
            jar: self.jar.clone(),
        }
    }
}

/// Service that attaches stored cookies and records returned ones
#[derive(Clone)]
pub struct CookieService<S> {
    inner: S,
    jar: CookieJar,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for CookieService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = ResponseFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let host = req.uri().host().map(str::to_ascii_lowercase);

        if let Some(host) = host.as_deref()
            && !req.headers().contains_key(COOKIE)
            && let Some(value) = self.jar.header_value(host)
        {
            req.headers_mut().insert(COOKIE, value);
        }

        ResponseFuture {
            inner: self.inner.call(req),
            jar: self.jar.clone(),
            host,
        }
    }
}

pin_project! {
    /// Response future that stores `Set-Cookie` headers once the response arrives.
    pub struct ResponseFuture<F> {
        #[pin]
        inner: F,
        jar: CookieJar,
        host: Option<String>,
    }
}

impl<F, ResBody, E> Future for ResponseFuture<F>
where
    F: Future<Output = Result<Response<ResBody>, E>>,
{
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let result = ready!(this.inner.poll(cx));
        if let (Ok(response), Some(host)) = (&result, this.host.as_deref()) {
            this.jar.store_from_headers(host, response.headers());
        }
        Poll::Ready(result)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{Method, StatusCode};
    use http_body_util::Full;
    use tower::ServiceExt;

    const HOST: &str = "portal.example.org";

    #[test]
    fn test_set_and_replay_cookie() {
        let jar = CookieJar::new();
        assert!(jar.apply_set_cookie(HOST, "sid=abc123; Path=/; HttpOnly"));
        assert!(jar.apply_set_cookie(HOST, "lang=fr"));

        assert_eq!(jar.get(HOST, "sid").as_deref(), Some("abc123"));
        assert_eq!(jar.header_value(HOST).unwrap(), "lang=fr; sid=abc123");
    }

    #[test]
    fn test_cookies_are_host_scoped() {
        let jar = CookieJar::new();
        jar.apply_set_cookie(HOST, "sid=abc123");

        assert!(jar.header_value("other.example.org").is_none());
        assert_eq!(jar.get("PORTAL.example.org", "sid").as_deref(), Some("abc123"));
    }

    #[test]
    fn test_max_age_zero_removes_cookie() {
        let jar = CookieJar::new();
        jar.apply_set_cookie(HOST, "sid=abc123");
        jar.apply_set_cookie(HOST, "sid=; Max-Age=0");

        assert!(jar.get(HOST, "sid").is_none());
        assert!(jar.header_value(HOST).is_none());
    }

    #[test]
    fn test_past_expiry_removes_cookie() {
        let jar = CookieJar::new();
        jar.apply_set_cookie(HOST, "sid=abc123");
        jar.apply_set_cookie(HOST, "sid=gone; Expires=Thu, 01 Jan 1970 00:00:00 GMT");

        assert!(jar.get(HOST, "sid").is_none());
    }

    #[test]
    fn test_debug_hides_values() {
        let jar = CookieJar::new();
        jar.apply_set_cookie(HOST, "sid=supersecret");
        let printed = format!("{jar:?}");

        assert!(printed.contains("sid"));
        assert!(!printed.contains("supersecret"));
    }

    /// Responds with a Set-Cookie and echoes the received Cookie header in `x-seen-cookie`.
    #[derive(Clone)]
    struct LoginBackend;

    impl Service<Request<Full<Bytes>>> for LoginBackend {
        type Response = Response<Full<Bytes>>;
        type Error = Box<dyn std::error::Error + Send + Sync>;
        type Future = std::future::Ready<Result<Self::Response, Self::Error>>;

        fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: Request<Full<Bytes>>) -> Self::Future {
            let seen = req
                .headers()
                .get(COOKIE)
                .cloned()
                .unwrap_or_else(|| HeaderValue::from_static("-"));
            let resp = Response::builder()
                .status(StatusCode::OK)
                .header(SET_COOKIE, "sid=from-server; HttpOnly")
                .header("x-seen-cookie", seen)
                .body(Full::new(Bytes::new()))
                .unwrap();
            std::future::ready(Ok(resp))
        }
    }

    #[tokio::test]
    async fn test_layer_stores_and_replays() {
        let jar = CookieJar::new();
        let mut service = CookieLayer::new(jar.clone()).layer(LoginBackend);

        let make_req = || {
            Request::builder()
                .method(Method::GET)
                .uri(format!("https://{HOST}/api/v1/auth/session"))
                .body(Full::new(Bytes::new()))
                .unwrap()
        };

        let first = service.ready().await.unwrap().call(make_req()).await.unwrap();
        assert_eq!(first.headers()["x-seen-cookie"], "-");
        assert_eq!(jar.get(HOST, "sid").as_deref(), Some("from-server"));

        let second = service.ready().await.unwrap().call(make_req()).await.unwrap();
        assert_eq!(second.headers()["x-seen-cookie"], "sid=from-server");
    }
}
