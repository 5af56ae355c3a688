//! Domain models for the resident issue portal.
//!
//! Response records are produced only by the validators in
//! [`crate::validation`]; `Deserialize` is derived for consumers that
//! persist or replay already-validated data.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

/// Branding of the municipality the portal serves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantInfo {
    pub id: String,
    pub name: String,
    pub logo_url: Option<String>,
    /// Hex colour, `#rrggbb`.
    pub primary_color: Option<String>,
    pub commune_name: Option<String>,
}

impl TenantInfo {
    /// Name shown to residents: the commune name when set, else the tenant name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.commune_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
}

/// Current authentication state as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub authenticated: bool,
    pub user: Option<SessionUser>,
}

impl Session {
    /// The signed-out session.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            authenticated: false,
            user: None,
        }
    }

    /// The user, only when the session is authenticated.
    #[must_use]
    pub fn authenticated_user(&self) -> Option<&SessionUser> {
        if self.authenticated {
            self.user.as_ref()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
}

/// Lifecycle state of a submitted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    InProgress,
    Completed,
    Rejected,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 4] = [
        RequestStatus::Pending,
        RequestStatus::InProgress,
        RequestStatus::Completed,
        RequestStatus::Rejected,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::InProgress => "in_progress",
            RequestStatus::Completed => "completed",
            RequestStatus::Rejected => "rejected",
        }
    }

    /// Whether the backend will still act on the request.
    #[must_use]
    pub fn is_open(self) -> bool {
        matches!(self, RequestStatus::Pending | RequestStatus::InProgress)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a status literal outside the fixed set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown request status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for RequestStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequestStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_owned()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub url: String,
    pub thumbnail_url: Option<String>,
}

/// A resident's own issue report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    pub category_id: String,
    pub category_name: Option<String>,
    pub status: RequestStatus,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub created_at: String,
    pub updated_at: String,
    /// Backend order; empty when the field is absent.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// Append-only status change or annotation on a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub id: String,
    pub request_id: String,
    pub event_type: String,
    pub description: String,
    pub created_at: String,
    pub user_name: Option<String>,
}

/// Anonymised issue shown on the public map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicIssue {
    pub id: String,
    pub category_id: String,
    pub category_name: Option<String>,
    pub status: RequestStatus,
    pub latitude: f64,
    pub longitude: f64,
    pub created_at: String,
}

/// Result of an attachment upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedAttachment {
    pub id: String,
    pub url: String,
}

/// New issue report, checked client-side before submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CreateRequestPayload {
    #[validate(length(min = 1, message = "Category is required"))]
    pub category_id: String,
    #[validate(length(min = 10, message = "Description must be at least 10 characters"))]
    pub description: String,
    #[validate(range(min = -90.0, max = 90.0, message = "Latitude must be between -90 and 90"))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0, message = "Longitude must be between -180 and 180"))]
    pub longitude: f64,
}

/// Geographic rectangle scoping a map query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lng: f64,
    pub max_lat: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    #[must_use]
    pub fn new(min_lat: f64, min_lng: f64, max_lat: f64, max_lng: f64) -> Self {
        Self {
            min_lat,
            min_lng,
            max_lat,
            max_lng,
        }
    }

    /// `bbox` query value: `minLng,minLat,maxLng,maxLat`.
    #[must_use]
    pub fn to_query_value(&self) -> String {
        format!(
            "{},{},{},{}",
            self.min_lng, self.min_lat, self.max_lng, self.max_lat
        )
    }

    #[must_use]
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&latitude)
            && (self.min_lng..=self.max_lng).contains(&longitude)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_status_literals_round_trip() {
        for status in RequestStatus::ALL {
            assert_eq!(status.as_str().parse::<RequestStatus>().unwrap(), status);
            assert_eq!(
                serde_json::to_value(status).unwrap(),
                serde_json::json!(status.as_str())
            );
        }
        assert!("closed".parse::<RequestStatus>().is_err());
        assert!("In_Progress".parse::<RequestStatus>().is_err());
    }

    #[test]
    fn test_bbox_query_value_order() {
        let bbox = BoundingBox::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(bbox.to_query_value(), "2,1,4,3");
        assert!(bbox.contains(2.0, 3.0));
        assert!(!bbox.contains(0.5, 3.0));
    }

    #[test]
    fn test_display_name_prefers_commune() {
        let mut tenant = TenantInfo {
            id: "t1".to_owned(),
            name: "Springfield Tenant".to_owned(),
            logo_url: None,
            primary_color: None,
            commune_name: Some("Springfield".to_owned()),
        };
        assert_eq!(tenant.display_name(), "Springfield");

        tenant.commune_name = None;
        assert_eq!(tenant.display_name(), "Springfield Tenant");
    }

    #[test]
    fn test_unauthenticated_session_hides_user() {
        let session = Session {
            authenticated: false,
            user: Some(SessionUser {
                id: "u1".to_owned(),
                email: "a@example.org".to_owned(),
                name: None,
            }),
        };
        assert!(session.authenticated_user().is_none());
        assert_eq!(Session::anonymous().user, None);
    }
}
