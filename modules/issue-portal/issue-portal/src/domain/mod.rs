pub mod service;
pub mod viewport;

pub use service::{AttachmentOutcome, PortalService, SubmittedReport};
pub use viewport::{MapViewport, ViewportSubscription};
