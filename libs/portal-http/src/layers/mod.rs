//! Tower layers for the HTTP client middleware stack
//!
//! - [`DefaultHeadersLayer`] - Adds User-Agent / Accept unless the request sets them
//! - [`CookieLayer`] - Replays stored cookies and records `Set-Cookie` responses

mod cookies;
mod headers;

pub use cookies::{CookieJar, CookieLayer, CookieService};
pub use headers::{DefaultHeadersLayer, DefaultHeadersService};
