//! Errors produced by [`HttpClient`](crate::HttpClient).
//!
//! Only [`HttpError::Status`] carries a server answer; every other variant
//! means the request never produced a usable response.

use std::time::Duration;
use thiserror::Error;

/// Why a path or base URL was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvalidUriKind {
    /// Not a URL, or the path does not join onto the base.
    ParseError,
    /// Parsed, but has no host to send credentials to.
    MissingAuthority,
    /// `HttpClientConfig::base_url` was left empty.
    MissingBaseUrl,
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HttpError {
    #[error("Failed to build request: {0}")]
    RequestBuild(#[from] http::Error),

    #[error("Invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// No complete response within `request_timeout`.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection refused, reset, DNS failure and the like.
    #[error("Transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("TLS error: {0}")]
    Tls(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Response body too large: limit {limit} bytes, got {actual} bytes")]
    BodyTooLarge { limit: usize, actual: usize },

    /// Non-2xx answer from the portal backend.
    ///
    /// `message` is the string `message` field of a JSON error body, or the
    /// canonical status text when there is none. `body` keeps the parsed
    /// JSON for diagnostics.
    #[error("HTTP {status}: {message}")]
    Status {
        status: http::StatusCode,
        message: String,
        body: Option<serde_json::Value>,
    },

    /// A request body could not be serialized.
    #[error("JSON processing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// The request queue is full; nothing was sent.
    #[error("Client overloaded: request queue is full")]
    Overloaded,

    /// The buffer worker is gone.
    #[error("Client unavailable: internal failure")]
    ServiceClosed,

    /// `reason` is for logs; match on `kind`.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUri {
        url: String,
        kind: InvalidUriKind,
        reason: String,
    },

    /// `http://` without `TransportSecurity::AllowInsecureHttp`, or a
    /// scheme the client does not speak.
    #[error("URL scheme '{scheme}' not allowed: {reason}")]
    InvalidScheme { scheme: String, reason: String },
}

impl HttpError {
    /// The response status, present only on [`HttpError::Status`].
    #[must_use]
    pub fn status(&self) -> Option<http::StatusCode> {
        if let Self::Status { status, .. } = self {
            Some(*status)
        } else {
            None
        }
    }
}

impl From<hyper::Error> for HttpError {
    fn from(err: hyper::Error) -> Self {
        Self::Transport(Box::new(err))
    }
}

impl From<hyper_util::client::legacy::Error> for HttpError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        Self::Transport(Box::new(err))
    }
}
