#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Resident Issue Portal
//!
//! The data-access core of the resident portal:
//!
//! - [`HttpPortalApi`] - [`PortalApi`] over the validated HTTP client
//! - [`QueryCache`] - Keyed fetch cache with deduplication, staleness windows
//!   and retry ceilings
//! - [`PortalService`] - The facade a view layer talks to
//! - [`MapViewport`] - Bounds-change subscription for a map view
//!
//! ```ignore
//! let config = PortalConfig::default();
//! let service = PortalService::from_config(&config)?;
//! let issues = service.public_issues(&BoundingBox::new(46.0, 7.0, 47.0, 8.0)).await?;
//! ```

pub mod config;
pub mod domain;
pub mod infra;
pub mod query;

pub use config::{CacheOverrides, MapConfig, PolicyOverride, PortalConfig};
pub use domain::{
    AttachmentOutcome, MapViewport, PortalService, SubmittedReport, ViewportSubscription,
};
pub use infra::HttpPortalApi;
pub use query::{
    Freshness, QueryCache, QueryPolicies, QueryPolicy, QuerySnapshot, QueryStatus, ResourceKey,
    ResourceKind,
};

pub use issue_portal_sdk::PortalApi;
