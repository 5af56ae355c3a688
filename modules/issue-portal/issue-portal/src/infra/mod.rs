//! Infrastructure adapters.

mod api_client;

pub use api_client::{HttpPortalApi, paths};
