#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! HTTP client for the resident issue portal
//!
//! A hyper-based client bound to one API base URL, with:
//! - Session credentials carried by a client-owned cookie jar
//! - Path + query resolution against the base URL (absent parameters are omitted)
//! - Typed status errors carrying the JSON error body and its `message`
//! - Lenient success bodies: 204, empty, or non-JSON bodies read as `None`
//! - Multipart file upload with a generated boundary
//! - Automatic TLS via rustls (HTTPS only by default)
//! - Per-request timeouts, body size limits, User-Agent injection
//! - Transparent response decompression (gzip, brotli, deflate)
//!
//! # Example
//!
//! ```ignore
//! use portal_http::{HttpClient, QueryParams};
//! use std::time::Duration;
//!
//! let client = HttpClient::builder()
//!     .base_url("https://portal.example.org")
//!     .timeout(Duration::from_secs(10))
//!     .build()?;
//!
//! let issues = client
//!     .get_json(
//!         "/api/v1/public/issues",
//!         &QueryParams::new().with("bbox", "2,1,4,3"),
//!     )
//!     .await?;
//! ```

mod builder;
mod client;
mod config;
mod error;
mod layers;
mod multipart;
mod query;
mod request;
mod response;
mod tls;

pub use builder::HttpClientBuilder;
pub use client::HttpClient;
pub use config::{DEFAULT_USER_AGENT, HttpClientConfig, TlsRootConfig, TransportSecurity};
pub use error::{HttpError, InvalidUriKind};
pub use http::StatusCode;
pub use layers::{CookieJar, CookieLayer, CookieService, DefaultHeadersLayer, DefaultHeadersService};
pub use mime::Mime;
pub use multipart::FilePart;
pub use query::QueryParams;
pub use request::RequestBuilder;
pub use response::{ERROR_BODY_PREVIEW_LIMIT, HttpResponse, ResponseBody};
