//! Portal service: the facade the view layer talks to.

use crate::config::PortalConfig;
use crate::infra::{HttpPortalApi, paths};
use crate::query::{QueryCache, ResourceKey, ResourceKind};
use issue_portal_sdk::{
    BoundingBox, BrandingTheme, Category, CreateRequestPayload, FilePart, PortalApi, PortalError,
    PublicIssue, Request, Session, SessionUser, TenantInfo, TimelineEvent, UploadedAttachment,
};
use portal_http::{HttpClientBuilder, QueryParams};
use std::sync::Arc;

/// What happened to the photo of a submitted report.
#[derive(Debug, Clone)]
pub enum AttachmentOutcome {
    NotProvided,
    Uploaded(UploadedAttachment),
    /// The request exists; only the photo is missing.
    Failed(PortalError),
}

/// Result of [`PortalService::submit_report`].
#[derive(Debug, Clone)]
pub struct SubmittedReport {
    pub request: Request,
    pub attachment: AttachmentOutcome,
}

/// Binds every resource to its cache key and accessor, and runs mutations
/// together with their cache side effects.
pub struct PortalService {
    api: Arc<dyn PortalApi>,
    cache: Arc<QueryCache>,
    login_url: String,
}

impl PortalService {
    #[must_use]
    pub fn new(api: Arc<dyn PortalApi>, cache: Arc<QueryCache>, login_url: impl Into<String>) -> Self {
        Self {
            api,
            cache,
            login_url: login_url.into(),
        }
    }

    /// Build the HTTP client, accessors and cache described by `config`.
    ///
    /// # Errors
    /// `PortalError::Transport` if the client cannot be built (bad base URL,
    /// user agent, or TLS setup).
    pub fn from_config(config: &PortalConfig) -> Result<Self, PortalError> {
        let client = HttpClientBuilder::with_config(config.http_client_config()).build()?;

        if let Some(cookie) = &config.session_cookie {
            let host = client.base_url().host_str().unwrap_or_default();
            if !client.cookies().apply_set_cookie(host, cookie) {
                tracing::warn!("configured session cookie is not a valid name=value pair; ignored");
            }
        }

        let login_url = client.url_for(paths::LOGIN, &QueryParams::new())?.to_string();
        let cache = Arc::new(QueryCache::new(config.query_policies()));
        Ok(Self::new(Arc::new(HttpPortalApi::new(client)), cache, login_url))
    }

    #[must_use]
    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Absolute URL that starts the out-of-band login redirect.
    #[must_use]
    pub fn login_url(&self) -> &str {
        &self.login_url
    }

    /// # Errors
    /// The accessor error once the retry ceiling is used up.
    pub async fn tenant_info(&self) -> Result<TenantInfo, PortalError> {
        let api = Arc::clone(&self.api);
        self.cache
            .tenant_info()
            .read(
                &ResourceKey::TenantInfo,
                self.cache.policy(ResourceKind::TenantInfo),
                move || async move { api.get_tenant_info().await },
            )
            .await
    }

    /// Title and palette for the tenant.
    ///
    /// # Errors
    /// Same as [`tenant_info`](Self::tenant_info).
    pub async fn branding(&self) -> Result<BrandingTheme, PortalError> {
        let tenant = self.tenant_info().await?;
        Ok(BrandingTheme::from_tenant(&tenant))
    }

    /// Current session; signed out when the backend cannot say otherwise.
    ///
    /// A failed fetch, in the foreground or while revalidating a stale
    /// session, replaces the cached session with a signed-out one.
    pub async fn session(&self) -> Session {
        let api = Arc::clone(&self.api);
        let store = self.cache.session();
        let result = store
            .read(
                &ResourceKey::Session,
                self.cache.policy(ResourceKind::Session),
                move || async move { api.get_session().await },
            )
            .await;

        let err = match result {
            Ok(session) => match store.last_error(&ResourceKey::Session) {
                None => return session,
                Some(err) => err,
            },
            Err(err) => err,
        };
        if !err.is_unauthorized() {
            tracing::warn!(error = %err, "session unavailable; treating as signed out");
        }
        store.set(&ResourceKey::Session, Session::anonymous());
        Session::anonymous()
    }

    /// The signed-in resident.
    ///
    /// # Errors
    /// `PortalError::NotAuthenticated` when nobody is signed in.
    pub async fn require_session(&self) -> Result<SessionUser, PortalError> {
        self.session()
            .await
            .authenticated_user()
            .cloned()
            .ok_or(PortalError::NotAuthenticated)
    }

    /// # Errors
    /// Only if the injected accessor does not degrade.
    pub async fn categories(&self) -> Result<Vec<Category>, PortalError> {
        let api = Arc::clone(&self.api);
        self.cache
            .categories()
            .read(
                &ResourceKey::Categories,
                self.cache.policy(ResourceKind::Categories),
                move || async move { api.get_categories().await },
            )
            .await
    }

    /// # Errors
    /// The accessor error; `Http` 401 when signed out.
    pub async fn my_requests(&self) -> Result<Vec<Request>, PortalError> {
        let api = Arc::clone(&self.api);
        self.cache
            .my_requests()
            .read(
                &ResourceKey::MyRequests,
                self.cache.policy(ResourceKind::MyRequests),
                move || async move { api.get_my_requests().await },
            )
            .await
    }

    /// # Errors
    /// The accessor error, e.g. `Http` 404 for an unknown id.
    pub async fn request(&self, id: &str) -> Result<Request, PortalError> {
        let api = Arc::clone(&self.api);
        let owned_id = id.to_owned();
        self.cache
            .requests()
            .read(
                &ResourceKey::request(id),
                self.cache.policy(ResourceKind::Request),
                move || async move { api.get_request(&owned_id).await },
            )
            .await
    }

    /// # Errors
    /// The accessor error.
    pub async fn request_timeline(&self, id: &str) -> Result<Vec<TimelineEvent>, PortalError> {
        let api = Arc::clone(&self.api);
        let owned_id = id.to_owned();
        self.cache
            .timelines()
            .read(
                &ResourceKey::request_timeline(id),
                self.cache.policy(ResourceKind::RequestTimeline),
                move || async move { api.get_request_timeline(&owned_id).await },
            )
            .await
    }

    /// Issues inside `bbox`, cached under the canonical box.
    ///
    /// # Errors
    /// The accessor error.
    pub async fn public_issues(&self, bbox: &BoundingBox) -> Result<Vec<PublicIssue>, PortalError> {
        let api = Arc::clone(&self.api);
        let bbox = *bbox;
        self.cache
            .public_issues()
            .read(
                &ResourceKey::public_issues(&bbox),
                self.cache.policy(ResourceKind::PublicIssues),
                move || async move { api.get_public_issues(&bbox).await },
            )
            .await
    }

    /// Submit a report. On success the resident's request list is
    /// invalidated and the new request is cached under its id.
    ///
    /// # Errors
    /// `InvalidInput` before any network call if the payload is rejected,
    /// otherwise the accessor error.
    pub async fn create_request(&self, payload: &CreateRequestPayload) -> Result<Request, PortalError> {
        payload.check().map_err(PortalError::InvalidInput)?;
        let request = self.api.create_request(payload).await?;
        tracing::debug!(request_id = %request.id, "request created");
        self.cache.invalidate(&ResourceKey::MyRequests);
        self.cache
            .requests()
            .set(&ResourceKey::request(&request.id), request.clone());
        Ok(request)
    }

    /// End the session. The cached session becomes signed out in one step
    /// and the previous resident's request list is dropped.
    ///
    /// # Errors
    /// The accessor error; the cache is untouched on failure.
    pub async fn logout(&self) -> Result<(), PortalError> {
        self.api.logout().await?;
        self.cache
            .session()
            .set(&ResourceKey::Session, Session::anonymous());
        self.cache.invalidate(&ResourceKey::MyRequests);
        Ok(())
    }

    /// Attach a file to a request; the cached request is invalidated.
    ///
    /// # Errors
    /// The accessor error.
    pub async fn upload_attachment(
        &self,
        request_id: &str,
        file: FilePart,
    ) -> Result<UploadedAttachment, PortalError> {
        let uploaded = self.api.upload_attachment(request_id, file).await?;
        self.cache.invalidate(&ResourceKey::request(request_id));
        Ok(uploaded)
    }

    /// Create a request, then upload its photo if one is given.
    ///
    /// A failed upload is logged and reported in the outcome; the
    /// submission itself still succeeds.
    ///
    /// # Errors
    /// Same as [`create_request`](Self::create_request).
    pub async fn submit_report(
        &self,
        payload: &CreateRequestPayload,
        photo: Option<FilePart>,
    ) -> Result<SubmittedReport, PortalError> {
        let request = self.create_request(payload).await?;

        let attachment = match photo {
            None => AttachmentOutcome::NotProvided,
            Some(file) => match self.upload_attachment(&request.id, file).await {
                Ok(uploaded) => AttachmentOutcome::Uploaded(uploaded),
                Err(err) => {
                    tracing::warn!(
                        request_id = %request.id,
                        error = %err,
                        "photo upload failed; the request was created without it"
                    );
                    AttachmentOutcome::Failed(err)
                }
            },
        };

        Ok(SubmittedReport { request, attachment })
    }
}
