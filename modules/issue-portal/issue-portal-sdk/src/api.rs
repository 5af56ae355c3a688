//! Public API trait for the resident portal backend.

use async_trait::async_trait;
use portal_http::FilePart;

use crate::error::PortalError;
use crate::models::{
    BoundingBox, Category, CreateRequestPayload, PublicIssue, Request, Session, TenantInfo,
    TimelineEvent, UploadedAttachment,
};

/// One method per REST resource of the portal backend.
///
/// Every response is validated before it is returned. Failures propagate
/// unchanged, with one exception: [`get_categories`](PortalApi::get_categories)
/// resolves to an empty list on any failure.
///
/// ```ignore
/// let api: Arc<dyn PortalApi> = Arc::new(HttpPortalApi::new(client));
/// let tenant = api.get_tenant_info().await?;
/// let issues = api.get_public_issues(&BoundingBox::new(1.0, 2.0, 3.0, 4.0)).await?;
/// ```
#[async_trait]
pub trait PortalApi: Send + Sync {
    /// Branding of the municipality.
    async fn get_tenant_info(&self) -> Result<TenantInfo, PortalError>;

    /// Current session state.
    async fn get_session(&self) -> Result<Session, PortalError>;

    /// End the session. The backend clears the session cookie.
    async fn logout(&self) -> Result<(), PortalError>;

    /// Issue categories; empty on any failure.
    async fn get_categories(&self) -> Result<Vec<Category>, PortalError>;

    /// Submit a new issue report.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the payload fails client-side checks; nothing is sent
    async fn create_request(&self, payload: &CreateRequestPayload)
    -> Result<Request, PortalError>;

    /// The signed-in resident's own requests.
    async fn get_my_requests(&self) -> Result<Vec<Request>, PortalError>;

    async fn get_request(&self, id: &str) -> Result<Request, PortalError>;

    /// Timeline of a request, in backend order.
    async fn get_request_timeline(&self, id: &str) -> Result<Vec<TimelineEvent>, PortalError>;

    /// Public issues inside `bbox`.
    async fn get_public_issues(&self, bbox: &BoundingBox)
    -> Result<Vec<PublicIssue>, PortalError>;

    /// Attach a file to an existing request (multipart field `file`).
    async fn upload_attachment(
        &self,
        request_id: &str,
        file: FilePart,
    ) -> Result<UploadedAttachment, PortalError>;
}
