use crate::builder::HttpClientBuilder;
use crate::config::TransportSecurity;
use crate::error::HttpError;
use crate::layers::CookieJar;
use crate::multipart::FilePart;
use crate::query::{QueryParams, resolve_url};
use crate::request::RequestBuilder;
use crate::response::ResponseBody;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use tower::Service;
use tower::buffer::Buffer;
use url::Url;

/// Future type of the boxed inner service
pub type ServiceFuture =
    Pin<Box<dyn Future<Output = Result<Response<ResponseBody>, HttpError>> + Send>>;

/// Buffered service shared by every clone of the client
pub type BufferedService = Buffer<Request<Full<Bytes>>, ServiceFuture>;

/// HTTP client bound to the portal API base URL
///
/// `HttpClient` is `Clone + Send + Sync`; clones share the connection pool,
/// the request queue, and the cookie jar, so a session established through
/// one clone is visible to all of them.
///
/// The JSON helpers (`get_json`, `post_json`, ...) resolve a path against
/// the base URL, send the request with stored cookies, and read the body
/// leniently: non-2xx responses become [`HttpError::Status`], while 204,
/// empty, and non-JSON success bodies come back as `None`.
///
/// ```ignore
/// let client = HttpClient::builder()
///     .base_url("https://portal.example.org")
///     .build()?;
///
/// let session = client.get_json("/api/v1/auth/session", &QueryParams::new()).await?;
/// ```
#[derive(Clone)]
pub struct HttpClient {
    pub(crate) service: BufferedService,
    pub(crate) max_body_size: usize,
    pub(crate) transport_security: TransportSecurity,
    pub(crate) base_url: Url,
    pub(crate) cookies: CookieJar,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url.as_str())
            .field("max_body_size", &self.max_body_size)
            .field("transport_security", &self.transport_security)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Create a builder for configuring the HTTP client
    #[must_use]
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Cookie jar holding the session credentials.
    #[must_use]
    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    /// Absolute URL for `path` with the present `params` appended.
    ///
    /// # Errors
    /// Returns `HttpError::InvalidUri` if `path` cannot be joined onto the base URL.
    pub fn url_for(&self, path: &str, params: &QueryParams) -> Result<Url, HttpError> {
        resolve_url(&self.base_url, path, params)
    }

    /// Start a request for `path`, resolved against the base URL.
    pub fn request(&self, method: http::Method, path: &str) -> RequestBuilder {
        RequestBuilder::new(
            self.service.clone(),
            self.max_body_size,
            method,
            resolve_url(&self.base_url, path, &QueryParams::new()),
            self.transport_security,
        )
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.request(http::Method::GET, path)
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.request(http::Method::POST, path)
    }

    pub fn put(&self, path: &str) -> RequestBuilder {
        self.request(http::Method::PUT, path)
    }

    pub fn delete(&self, path: &str) -> RequestBuilder {
        self.request(http::Method::DELETE, path)
    }

    /// `GET` and read the body leniently.
    ///
    /// # Errors
    /// Transport, timeout, URL errors, and `HttpError::Status` for non-2xx.
    pub async fn get_json(&self, path: &str, params: &QueryParams) -> Result<Option<Value>, HttpError> {
        self.get(path).query(params).send().await?.into_json_value().await
    }

    /// `POST` an optional JSON body and read the response leniently.
    ///
    /// # Errors
    /// Transport, timeout, URL, serialization errors, and `HttpError::Status` for non-2xx.
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
        params: &QueryParams,
    ) -> Result<Option<Value>, HttpError> {
        let mut request = self.post(path).query(params);
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await?.into_json_value().await
    }

    /// `PUT` an optional JSON body and read the response leniently.
    ///
    /// # Errors
    /// Transport, timeout, URL, serialization errors, and `HttpError::Status` for non-2xx.
    pub async fn put_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
        params: &QueryParams,
    ) -> Result<Option<Value>, HttpError> {
        let mut request = self.put(path).query(params);
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await?.into_json_value().await
    }

    /// `DELETE` and read the response leniently.
    ///
    /// # Errors
    /// Transport, timeout, URL errors, and `HttpError::Status` for non-2xx.
    pub async fn delete_json(&self, path: &str, params: &QueryParams) -> Result<Option<Value>, HttpError> {
        self.delete(path).query(params).send().await?.into_json_value().await
    }

    /// `POST` one file as `multipart/form-data` and read the response leniently.
    ///
    /// # Errors
    /// Transport, timeout, URL errors, and `HttpError::Status` for non-2xx.
    pub async fn upload_file(
        &self,
        path: &str,
        file: FilePart,
        params: &QueryParams,
    ) -> Result<Option<Value>, HttpError> {
        tracing::debug!(path, file = file.file_name(), size = file.len(), "uploading file");
        self.post(path)
            .query(params)
            .multipart(std::slice::from_ref(&file))
            .send()
            .await?
            .into_json_value()
            .await
    }
}

/// Map buffer errors to `HttpError`
///
/// Inner service errors are unwrapped; anything else means the buffer
/// worker is gone.
pub fn map_buffer_error(err: tower::BoxError) -> HttpError {
    match err.downcast::<HttpError>() {
        Ok(http_err) => *http_err,
        Err(err) => {
            tracing::error!(
                error = %err,
                "buffer worker closed unexpectedly; service unavailable"
            );
            HttpError::ServiceClosed
        }
    }
}

/// Reserve a buffer slot without waiting.
///
/// # Errors
/// Returns `HttpError::Overloaded` if the queue is full, or the mapped
/// buffer error if the worker is gone.
pub async fn try_acquire_buffer_slot(service: &mut BufferedService) -> Result<(), HttpError> {
    use std::task::Poll;

    let poll_result = std::future::poll_fn(|cx| match service.poll_ready(cx) {
        Poll::Ready(result) => Poll::Ready(Some(result)),
        Poll::Pending => Poll::Ready(None),
    })
    .await;

    match poll_result {
        Some(Ok(())) => Ok(()),
        Some(Err(e)) => Err(map_buffer_error(e)),
        None => Err(HttpError::Overloaded),
    }
}
