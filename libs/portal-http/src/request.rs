use crate::client::{BufferedService, map_buffer_error, try_acquire_buffer_slot};
use crate::config::TransportSecurity;
use crate::error::{HttpError, InvalidUriKind};
use crate::multipart::{self, FilePart, MultipartBody};
use crate::query::QueryParams;
use crate::response::{HttpResponse, ResponseBody};
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{Request, Response};
use http_body_util::Full;
use serde::Serialize;
use tower::Service;
use url::Url;

#[derive(Clone, Debug)]
enum BodyKind {
    Empty,
    Bytes(Bytes),
    /// Serialized eagerly so `send()` cannot fail on serialization.
    Json(Bytes),
    Multipart(MultipartBody),
}

/// HTTP request builder with fluent API
///
/// Created by [`HttpClient::get`](crate::HttpClient::get),
/// [`HttpClient::post`](crate::HttpClient::post), etc. Builder errors are
/// deferred and surface from [`send()`](RequestBuilder::send).
///
/// ```ignore
/// let resp = client
///     .post("/api/v1/requests")
///     .json(&payload)
///     .send()
///     .await?;
/// ```
#[must_use = "RequestBuilder does nothing until .send() is called"]
pub struct RequestBuilder {
    service: BufferedService,
    max_body_size: usize,
    method: http::Method,
    url: Option<Url>,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: BodyKind,
    error: Option<HttpError>,
    transport_security: TransportSecurity,
}

impl RequestBuilder {
    pub(crate) fn new(
        service: BufferedService,
        max_body_size: usize,
        method: http::Method,
        url: Result<Url, HttpError>,
        transport_security: TransportSecurity,
    ) -> Self {
        let (url, error) = match url {
            Ok(url) => (Some(url), None),
            Err(e) => (None, Some(e)),
        };
        Self {
            service,
            max_body_size,
            method,
            url,
            headers: Vec::new(),
            body: BodyKind::Empty,
            error,
            transport_security,
        }
    }

    /// Append query parameters; parameters without a value are skipped.
    pub fn query(mut self, params: &QueryParams) -> Self {
        if let Some(url) = self.url.as_mut() {
            params.append_to(url);
        }
        self
    }

    /// Add a single header to the request
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if self.error.is_some() {
            return self;
        }

        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => self.headers.push((name, value)),
            (Err(e), _) => self.error = Some(HttpError::InvalidHeaderName(e)),
            (_, Err(e)) => self.error = Some(HttpError::InvalidHeaderValue(e)),
        }
        self
    }

    /// Set request body as JSON
    ///
    /// Sets `Content-Type: application/json` unless the caller supplied one.
    /// A serialization failure is deferred to `send()`.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Self {
        if self.error.is_some() {
            return self;
        }
        match serde_json::to_vec(body) {
            Ok(bytes) => self.body = BodyKind::Json(Bytes::from(bytes)),
            Err(e) => self.error = Some(HttpError::Json(e)),
        }
        self
    }

    /// Set request body as `multipart/form-data`.
    ///
    /// The boundary is generated here and the matching `Content-Type` is
    /// always the one sent; a caller-supplied `Content-Type` is dropped.
    pub fn multipart(mut self, parts: &[FilePart]) -> Self {
        self.body = BodyKind::Multipart(multipart::encode(parts));
        self
    }

    /// Set request body as raw bytes
    pub fn body_bytes(mut self, body: Bytes) -> Self {
        self.body = BodyKind::Bytes(body);
        self
    }

    /// Final URL the request will be sent to, `None` if it failed to resolve.
    #[must_use]
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    fn validate_scheme(&self, url: &Url) -> Result<(), HttpError> {
        match url.scheme() {
            "https" => Ok(()),
            "http" => match self.transport_security {
                TransportSecurity::AllowInsecureHttp => Ok(()),
                TransportSecurity::TlsOnly => Err(HttpError::InvalidScheme {
                    scheme: "http".to_owned(),
                    reason: "HTTPS required (transport security is TlsOnly)".to_owned(),
                }),
            },
            scheme => Err(HttpError::InvalidScheme {
                scheme: scheme.to_owned(),
                reason: "only http:// and https:// schemes are supported".to_owned(),
            }),
        }
    }

    /// Send the request and return the response
    ///
    /// Returns `Ok` for every HTTP status; status handling is left to the
    /// [`HttpResponse`] readers.
    ///
    /// # Errors
    ///
    /// Returns `HttpError` if:
    /// - Request building failed (invalid headers, URL, serialization)
    /// - URL scheme is not allowed by the transport security mode
    /// - Network/transport error or timeout
    /// - The request queue is full (`Overloaded`)
    pub async fn send(mut self) -> Result<HttpResponse, HttpError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        let Some(url) = self.url.take() else {
            return Err(HttpError::InvalidUri {
                url: String::new(),
                kind: InvalidUriKind::MissingBaseUrl,
                reason: "request has no URL".to_owned(),
            });
        };
        self.validate_scheme(&url)?;

        let uri: http::Uri =
            url.as_str()
                .parse()
                .map_err(|e: http::uri::InvalidUri| HttpError::InvalidUri {
                    url: url.to_string(),
                    kind: InvalidUriKind::ParseError,
                    reason: e.to_string(),
                })?;

        let mut builder = Request::builder().method(self.method.clone()).uri(uri);

        let is_multipart = matches!(self.body, BodyKind::Multipart(_));
        let caller_content_type = self.headers.iter().any(|(name, _)| name == CONTENT_TYPE);
        if is_multipart && caller_content_type {
            tracing::debug!(url = %url, "dropping caller Content-Type on multipart body");
        }

        match &self.body {
            BodyKind::Json(_) if !caller_content_type => {
                builder = builder.header(CONTENT_TYPE, "application/json");
            }
            BodyKind::Multipart(form) => {
                builder = builder.header(CONTENT_TYPE, form.content_type());
            }
            _ => {}
        }

        for (name, value) in self.headers {
            if is_multipart && name == CONTENT_TYPE {
                continue;
            }
            builder = builder.header(name, value);
        }

        let body = match self.body {
            BodyKind::Empty => Bytes::new(),
            BodyKind::Bytes(b) | BodyKind::Json(b) => b,
            BodyKind::Multipart(form) => form.body,
        };

        let request = builder.body(Full::new(body))?;
        tracing::debug!(method = %self.method, url = %url, "sending request");

        try_acquire_buffer_slot(&mut self.service).await?;

        let inner: Response<ResponseBody> =
            self.service.call(request).await.map_err(map_buffer_error)?;

        Ok(HttpResponse {
            inner,
            max_body_size: self.max_body_size,
        })
    }
}
