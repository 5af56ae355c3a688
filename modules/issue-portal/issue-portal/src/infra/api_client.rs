//! [`PortalApi`] over the validated HTTP client.

use async_trait::async_trait;
use issue_portal_sdk::{
    BoundingBox, Category, CreateRequestPayload, FilePart, PortalApi, PortalError, PublicIssue,
    Request, Schema, Session, TenantInfo, TimelineEvent, UploadedAttachment,
};
use portal_http::{HttpClient, QueryParams};
use serde_json::Value;

/// Backend routes.
pub mod paths {
    pub const TENANT_INFO: &str = "/api/v1/public/tenant-info";
    pub const SESSION: &str = "/api/v1/auth/session";
    pub const LOGIN: &str = "/api/v1/auth/login";
    pub const LOGOUT: &str = "/api/v1/auth/logout";
    pub const CATEGORIES: &str = "/api/v1/public/categories";
    pub const REQUESTS: &str = "/api/v1/requests";
    pub const MY_REQUESTS: &str = "/api/v1/requests/mine";
    pub const PUBLIC_ISSUES: &str = "/api/v1/public/issues";
}

/// `/api/v1/requests/{id}` with `id` percent-encoded as one segment.
fn request_path(id: &str) -> String {
    format!("{}/{}", paths::REQUESTS, urlencoding::encode(id))
}

fn parse<T: Schema>(body: Option<&Value>) -> Result<T, PortalError> {
    T::parse_body(body).map_err(PortalError::Validation)
}

/// HTTP-backed portal accessors.
///
/// Every response goes through its [`Schema`]; failures propagate
/// unchanged except for categories, which degrade to an empty list.
#[derive(Clone)]
pub struct HttpPortalApi {
    client: HttpClient,
}

impl HttpPortalApi {
    #[must_use]
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    #[must_use]
    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    async fn fetch_categories(&self) -> Result<Vec<Category>, PortalError> {
        let body = self
            .client
            .get_json(paths::CATEGORIES, &QueryParams::new())
            .await?;
        parse(body.as_ref())
    }
}

#[async_trait]
impl PortalApi for HttpPortalApi {
    async fn get_tenant_info(&self) -> Result<TenantInfo, PortalError> {
        let body = self
            .client
            .get_json(paths::TENANT_INFO, &QueryParams::new())
            .await?;
        parse(body.as_ref())
    }

    async fn get_session(&self) -> Result<Session, PortalError> {
        let body = self.client.get_json(paths::SESSION, &QueryParams::new()).await?;
        parse(body.as_ref())
    }

    async fn logout(&self) -> Result<(), PortalError> {
        self.client
            .post_json::<Value>(paths::LOGOUT, None, &QueryParams::new())
            .await?;
        Ok(())
    }

    async fn get_categories(&self) -> Result<Vec<Category>, PortalError> {
        match self.fetch_categories().await {
            Ok(categories) => Ok(categories),
            Err(err) => {
                tracing::warn!(error = %err, "categories unavailable; using an empty list");
                Ok(Vec::new())
            }
        }
    }

    async fn create_request(&self, payload: &CreateRequestPayload) -> Result<Request, PortalError> {
        payload.check().map_err(PortalError::InvalidInput)?;
        let body = self
            .client
            .post_json(paths::REQUESTS, Some(payload), &QueryParams::new())
            .await?;
        parse(body.as_ref())
    }

    async fn get_my_requests(&self) -> Result<Vec<Request>, PortalError> {
        let body = self
            .client
            .get_json(paths::MY_REQUESTS, &QueryParams::new())
            .await?;
        parse(body.as_ref())
    }

    async fn get_request(&self, id: &str) -> Result<Request, PortalError> {
        let body = self
            .client
            .get_json(&request_path(id), &QueryParams::new())
            .await?;
        parse(body.as_ref())
    }

    async fn get_request_timeline(&self, id: &str) -> Result<Vec<TimelineEvent>, PortalError> {
        let path = format!("{}/timeline", request_path(id));
        let body = self.client.get_json(&path, &QueryParams::new()).await?;
        parse(body.as_ref())
    }

    async fn get_public_issues(&self, bbox: &BoundingBox) -> Result<Vec<PublicIssue>, PortalError> {
        let params = QueryParams::new().with("bbox", bbox.to_query_value());
        let body = self.client.get_json(paths::PUBLIC_ISSUES, &params).await?;
        parse(body.as_ref())
    }

    async fn upload_attachment(
        &self,
        request_id: &str,
        file: FilePart,
    ) -> Result<UploadedAttachment, PortalError> {
        let path = format!("{}/attachments", request_path(request_id));
        let body = self
            .client
            .upload_file(&path, file, &QueryParams::new())
            .await?;
        parse(body.as_ref())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use portal_http::{HttpClientBuilder, HttpClientConfig};
    use serde_json::json;

    fn api(server: &MockServer) -> HttpPortalApi {
        let client = HttpClientBuilder::with_config(HttpClientConfig::for_testing(server.base_url()))
            .build()
            .unwrap();
        HttpPortalApi::new(client)
    }

    fn request_json(id: &str) -> Value {
        json!({
            "id": id,
            "category_id": "c1",
            "category_name": "Pothole",
            "status": "pending",
            "description": "Deep pothole on Main Street",
            "latitude": 46.8,
            "longitude": 8.2,
            "created_at": "2026-01-10T08:00:00Z",
            "updated_at": "2026-01-10T08:00:00Z"
        })
    }

    fn payload(description: &str) -> CreateRequestPayload {
        CreateRequestPayload {
            category_id: "c1".to_owned(),
            description: description.to_owned(),
            latitude: 46.8,
            longitude: 8.2,
        }
    }

    #[tokio::test]
    async fn test_tenant_info() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(paths::TENANT_INFO);
            then.status(200).json_body(json!({
                "id": "t1",
                "name": "Springfield",
                "primary_color": "#3080f0",
                "logo_url": null
            }));
        });

        let tenant = api(&server).get_tenant_info().await.unwrap();
        assert_eq!(tenant.name, "Springfield");
        assert_eq!(tenant.primary_color.as_deref(), Some("#3080f0"));
        assert_eq!(tenant.logo_url, None);
    }

    #[tokio::test]
    async fn test_get_request_not_found() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/requests/x");
            then.status(404).json_body(json!({"message": "Not found"}));
        });

        let err = api(&server).get_request("x").await.unwrap_err();
        match err {
            PortalError::Http { status, message, body } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Not found");
                assert_eq!(body, Some(json!({"message": "Not found"})));
            }
            other => panic!("expected Http error, got {other:?}"),
        }
    }

    #[test]
    fn test_request_path_keeps_id_in_one_segment() {
        assert_eq!(request_path("req-1_a.b~c"), "/api/v1/requests/req-1_a.b~c");
        assert_eq!(request_path("a/b?c#d"), "/api/v1/requests/a%2Fb%3Fc%23d");
        assert_eq!(request_path("é"), "/api/v1/requests/%C3%A9");
    }

    #[tokio::test]
    async fn test_request_id_is_path_encoded() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/api/v1/requests/a%2Fb/timeline");
            then.status(200).json_body(json!([]));
        });

        let events = api(&server).get_request_timeline("a/b").await.unwrap();
        assert!(events.is_empty());
        mock.assert();
    }

    #[tokio::test]
    async fn test_categories_degrade_to_empty() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(paths::CATEGORIES);
            then.status(500).json_body(json!({"message": "boom"}));
        });

        let categories = api(&server).get_categories().await.unwrap();
        assert!(categories.is_empty());
    }

    #[tokio::test]
    async fn test_categories_degrade_on_invalid_shape() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(paths::CATEGORIES);
            then.status(200).json_body(json!([{"id": 1, "name": "Pothole"}]));
        });

        assert!(api(&server).get_categories().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_public_issues_bbox_order() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path(paths::PUBLIC_ISSUES)
                .query_param("bbox", "2,1,4,3");
            then.status(200).json_body(json!([{
                "id": "i1",
                "category_id": "c1",
                "status": "in_progress",
                "latitude": 2.0,
                "longitude": 3.0,
                "created_at": "2026-01-10T08:00:00Z"
            }]));
        });

        let issues = api(&server)
            .get_public_issues(&BoundingBox::new(1.0, 2.0, 3.0, 4.0))
            .await
            .unwrap();
        mock.assert();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].status, issue_portal_sdk::RequestStatus::InProgress);
    }

    #[tokio::test]
    async fn test_invalid_status_is_validation_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(paths::MY_REQUESTS);
            let mut bad = request_json("r2");
            bad["status"] = json!("closed");
            then.status(200).json_body(json!([request_json("r1"), bad]));
        });

        let err = api(&server).get_my_requests().await.unwrap_err();
        let PortalError::Validation(validation) = err else {
            panic!("expected validation error");
        };
        assert!(validation.has_violation_at("[1].status"));
    }

    #[tokio::test]
    async fn test_short_description_never_reaches_network() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path(paths::REQUESTS);
            then.status(201).json_body(request_json("r1"));
        });

        let err = api(&server)
            .create_request(&payload("123456789"))
            .await
            .unwrap_err();
        let PortalError::InvalidInput(validation) = err else {
            panic!("expected invalid input");
        };
        assert!(validation.has_violation_at("description"));
        assert_eq!(mock.calls(), 0);

        let created = api(&server).create_request(&payload("1234567890")).await.unwrap();
        assert_eq!(created.id, "r1");
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_create_request_sends_json_payload() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path(paths::REQUESTS)
                .header("content-type", "application/json")
                .json_body(json!({
                    "category_id": "c1",
                    "description": "Broken street light",
                    "latitude": 46.8,
                    "longitude": 8.2
                }));
            then.status(201).json_body(request_json("r9"));
        });

        let created = api(&server)
            .create_request(&payload("Broken street light"))
            .await
            .unwrap();
        mock.assert();
        assert_eq!(created.id, "r9");
    }

    #[tokio::test]
    async fn test_logout_accepts_empty_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path(paths::LOGOUT);
            then.status(204);
        });

        api(&server).logout().await.unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn test_empty_success_body_fails_validation() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(paths::SESSION);
            then.status(200).body("");
        });

        let err = api(&server).get_session().await.unwrap_err();
        assert!(matches!(err, PortalError::Validation(_)));
    }

    #[tokio::test]
    async fn test_upload_attachment() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v1/requests/r1/attachments")
                .body_includes("name=\"file\"; filename=\"photo.jpg\"");
            then.status(201)
                .json_body(json!({"id": "a1", "url": "/files/a1.jpg"}));
        });

        let file = FilePart::new("photo.jpg", mime::IMAGE_JPEG, b"jpeg-bytes".to_vec());
        let uploaded = api(&server).upload_attachment("r1", file).await.unwrap();
        mock.assert();
        assert_eq!(uploaded.id, "a1");
    }

    #[tokio::test]
    async fn test_transport_error() {
        let client = HttpClientBuilder::with_config(HttpClientConfig::for_testing("http://127.0.0.1:1"))
            .build()
            .unwrap();

        let err = HttpPortalApi::new(client).get_session().await.unwrap_err();
        assert!(matches!(err, PortalError::Transport { .. }));
    }
}
