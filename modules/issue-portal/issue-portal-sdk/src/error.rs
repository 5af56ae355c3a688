//! Error types for the issue portal.

use crate::validation::ValidationError;
use portal_http::HttpError;
use serde_json::Value;
use thiserror::Error;

/// Errors surfaced by portal accessors and the portal service.
///
/// `Clone` so that one fetch outcome can be handed to every caller that
/// waited on the same deduplicated request.
#[derive(Debug, Clone, Error)]
pub enum PortalError {
    /// Network failure, timeout, or a request that could not be built.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// The backend answered with a non-2xx status.
    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        message: String,
        /// Parsed JSON error body, when there was one.
        body: Option<Value>,
    },

    /// A response did not match its schema.
    #[error("invalid response: {0}")]
    Validation(ValidationError),

    /// A write payload was rejected before any network call.
    #[error("invalid input: {0}")]
    InvalidInput(ValidationError),

    /// The operation needs a signed-in resident.
    #[error("not authenticated")]
    NotAuthenticated,
}

impl PortalError {
    /// HTTP status for `Http` errors.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            PortalError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// 401 from the backend or a local session check.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, PortalError::NotAuthenticated) || self.status() == Some(401)
    }
}

impl From<HttpError> for PortalError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Status {
                status,
                message,
                body,
            } => PortalError::Http {
                status: status.as_u16(),
                message,
                body,
            },
            other => PortalError::Transport {
                message: other.to_string(),
            },
        }
    }
}
