use crate::error::HttpError;
use http::header::{ACCEPT, USER_AGENT};
use http::{HeaderMap, HeaderValue, Request, Response};
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Tower layer that fills in default headers the caller did not set.
///
/// Always carries `User-Agent` and `Accept: application/json`; a header
/// already present on the request wins.
#[derive(Clone)]
pub struct DefaultHeadersLayer {
    headers: HeaderMap,
}

impl DefaultHeadersLayer {
    /// Create the layer with the given User-Agent
    ///
    /// # Errors
    /// Returns `HttpError::InvalidHeaderValue` if the user agent string is not valid
    pub fn try_new(user_agent: impl AsRef<str>) -> Result<Self, HttpError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent.as_ref()).map_err(HttpError::InvalidHeaderValue)?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        Ok(Self { headers })
    }
}

impl<S> Layer<S> for DefaultHeadersLayer {
    type Service = DefaultHeadersService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DefaultHeadersService {
            inner,
            headers: self.headers.clone(),
        }
    }
}

/// Service that adds default headers to requests
#[derive(Clone)]
pub struct DefaultHeadersService<S> {
    inner: S,
    headers: HeaderMap,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for DefaultHeadersService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        for (name, value) in &self.headers {
            if !req.headers().contains_key(name) {
                req.headers_mut().insert(name.clone(), value.clone());
            }
        }
        self.inner.call(req)
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

    /// Echoes the request headers back as response headers.
    #[derive(Clone)]
    struct EchoHeaders;

    impl Service<Request<Full<Bytes>>> for EchoHeaders {
        type Response = Response<Full<Bytes>>;
        type Error = Box<dyn std::error::Error + Send + Sync>;
        type Future = std::future::Ready<Result<Self::Response, Self::Error>>;

        fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: Request<Full<Bytes>>) -> Self::Future {
            let mut resp = Response::builder()
                .status(StatusCode::OK)
                .body(Full::new(Bytes::new()))
                .unwrap();
            *resp.headers_mut() = req.headers().clone();
            std::future::ready(Ok(resp))
        }
    }

    fn request() -> http::request::Builder {
        Request::builder()
            .method(Method::GET)
            .uri("https://portal.example.org/api/v1/auth/session")
    }

    #[tokio::test]
    async fn test_defaults_added() {
        let layer = DefaultHeadersLayer::try_new("portal-test/1.0").unwrap();
        let mut service = layer.layer(EchoHeaders);

        let resp = service
            .ready()
            .await
            .unwrap()
            .call(request().body(Full::new(Bytes::new())).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.headers()[USER_AGENT], "portal-test/1.0");
        assert_eq!(resp.headers()[ACCEPT], "application/json");
    }

    #[tokio::test]
    async fn test_caller_headers_not_overwritten() {
        let layer = DefaultHeadersLayer::try_new("portal-test/1.0").unwrap();
        let mut service = layer.layer(EchoHeaders);

        let req = request()
            .header(USER_AGENT, "custom-agent/2.0")
            .header(ACCEPT, "text/plain")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let resp = service.ready().await.unwrap().call(req).await.unwrap();

        assert_eq!(resp.headers()[USER_AGENT], "custom-agent/2.0");
        assert_eq!(resp.headers()[ACCEPT], "text/plain");
    }

    #[test]
    fn test_invalid_user_agent_rejected() {
        let result = DefaultHeadersLayer::try_new("invalid\x00agent");
        assert!(matches!(result, Err(HttpError::InvalidHeaderValue(_))));
    }
}
