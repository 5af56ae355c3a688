use crate::error::HttpError;
use bytes::Bytes;
use http::{HeaderMap, Response, StatusCode};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Upper bound on how much of a non-2xx body is read to build the error.
pub const ERROR_BODY_PREVIEW_LIMIT: usize = 8 * 1024;

/// Boxed response body, after transparent decompression.
pub type ResponseBody =
    http_body_util::combinators::BoxBody<Bytes, Box<dyn std::error::Error + Send + Sync>>;

/// HTTP response wrapper with body-reading helpers
///
/// - `resp.error_for_status()?` - Check status without reading body
/// - `resp.bytes().await?` - Read raw bytes
/// - `resp.json::<T>().await?` - Strict JSON parse with status check
/// - `resp.into_json_value().await?` - Lenient JSON parse with status check
///
/// All body reads enforce the configured `max_body_size` limit.
#[derive(Debug)]
pub struct HttpResponse {
    pub(crate) inner: Response<ResponseBody>,
    pub(crate) max_body_size: usize,
}

impl HttpResponse {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Check status without reading the body.
    ///
    /// The resulting `HttpError::Status` carries the status text as message
    /// and no body; use [`checked_bytes`](Self::checked_bytes) to get the
    /// server's own message.
    ///
    /// # Errors
    /// Returns `HttpError::Status` if the response status is not 2xx.
    pub fn error_for_status(self) -> Result<Self, HttpError> {
        let status = self.inner.status();
        if status.is_success() {
            return Ok(self);
        }
        Err(HttpError::Status {
            status,
            message: status_text(status),
            body: None,
        })
    }

    /// Read response body as bytes without status check
    ///
    /// # Errors
    /// Returns `HttpError::BodyTooLarge` if body exceeds limit.
    pub async fn bytes(self) -> Result<Bytes, HttpError> {
        read_body_limited(self.inner, self.max_body_size).await
    }

    /// Read response body as bytes with status check
    ///
    /// # Errors
    /// Returns `HttpError::Status` if status is not 2xx.
    /// Returns `HttpError::BodyTooLarge` if body exceeds limit.
    pub async fn checked_bytes(self) -> Result<Bytes, HttpError> {
        checked_body(self.inner, self.max_body_size).await
    }

    /// Strictly parse the body as `T` after a status check.
    ///
    /// # Errors
    /// Returns `HttpError::Status`, `HttpError::BodyTooLarge`, or
    /// `HttpError::Json` if the body does not deserialize.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T, HttpError> {
        let body = checked_body(self.inner, self.max_body_size).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Read response body as text (lossy UTF-8) with status check
    ///
    /// # Errors
    /// Returns `HttpError::Status` if status is not 2xx.
    /// Returns `HttpError::BodyTooLarge` if body exceeds limit.
    pub async fn text(self) -> Result<String, HttpError> {
        let body = checked_body(self.inner, self.max_body_size).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Parse a successful body leniently.
    ///
    /// `204 No Content`, an empty body, and a body that is not valid JSON
    /// all yield `Ok(None)`; the caller's validator decides whether an
    /// absent value is acceptable.
    ///
    /// # Errors
    /// Returns `HttpError::Status` if status is not 2xx.
    /// Returns `HttpError::BodyTooLarge` if body exceeds limit.
    pub async fn into_json_value(self) -> Result<Option<Value>, HttpError> {
        if self.inner.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let body = checked_body(self.inner, self.max_body_size).await?;
        if body.is_empty() {
            return Ok(None);
        }

        match serde_json::from_slice::<Value>(&body) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::debug!(error = %e, len = body.len(), "success body is not JSON; treating as empty");
                Ok(None)
            }
        }
    }

    #[must_use]
    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }
}

/// Canonical reason phrase, falling back to `HTTP {code}` for unregistered codes.
fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map_or_else(|| format!("HTTP {}", status.as_u16()), str::to_owned)
}

/// Build the status error from a (preview of a) non-2xx body.
pub(crate) fn status_error(status: StatusCode, body: &[u8]) -> HttpError {
    let parsed = serde_json::from_slice::<Value>(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|v| v.get("message"))
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map_or_else(|| status_text(status), str::to_owned);

    HttpError::Status {
        status,
        message,
        body: parsed,
    }
}

async fn checked_body(
    response: Response<ResponseBody>,
    max_body_size: usize,
) -> Result<Bytes, HttpError> {
    let status = response.status();
    if status.is_success() {
        return read_body_limited(response, max_body_size).await;
    }

    // An oversized error body must not hide the status error.
    let preview_limit = max_body_size.min(ERROR_BODY_PREVIEW_LIMIT);
    match read_body_limited(response, preview_limit).await {
        Ok(bytes) => Err(status_error(status, &bytes)),
        Err(HttpError::BodyTooLarge { .. }) => Err(status_error(status, &[])),
        Err(e) => Err(e),
    }
}

/// Collect the (decompressed) body, failing once `limit` bytes are exceeded.
async fn read_body_limited(
    response: Response<ResponseBody>,
    limit: usize,
) -> Result<Bytes, HttpError> {
    let (_parts, body) = response.into_parts();

    let mut collected = Vec::new();
    let mut body = std::pin::pin!(body);

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(HttpError::Transport)?;
        if let Some(chunk) = frame.data_ref() {
            if collected.len() + chunk.len() > limit {
                return Err(HttpError::BodyTooLarge {
                    limit,
                    actual: collected.len() + chunk.len(),
                });
            }
            collected.extend_from_slice(chunk);
        }
    }

    Ok(Bytes::from(collected))
}
