#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Resident Issue Portal SDK
//!
//! Public surface shared by the portal implementation and its consumers:
//!
//! - [`PortalApi`] - One async method per backend resource
//! - [`TenantInfo`], [`Session`], [`Request`], [`PublicIssue`], ... - Domain models
//! - [`Schema`] - Structural validators for untrusted response bodies
//! - [`PortalError`], [`ValidationError`] - Error types
//! - [`BrandingTheme`] - Title and colour palette derived from tenant info

pub mod api;
pub mod branding;
pub mod error;
pub mod models;
pub mod validation;

pub use api::PortalApi;
pub use branding::{BrandingTheme, Palette, Rgb};
pub use error::PortalError;
pub use models::{
    Attachment, BoundingBox, Category, CreateRequestPayload, PublicIssue, Request, RequestStatus,
    Session, SessionUser, TenantInfo, TimelineEvent, UnknownStatus, UploadedAttachment,
};
pub use portal_http::FilePart;
pub use validation::{FieldViolation, Schema, ValidationError};
