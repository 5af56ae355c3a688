//! Structural validation of untrusted JSON into typed records.
//!
//! Every response body passes through a [`Schema`] before it is trusted.
//! Validation does not stop at the first problem: each mismatched field is
//! reported with its path (`status`, `user.email`, `[2].attachments[0].url`),
//! what was expected, and what was found.
//!
//! Optional fields may be absent or `null`. Required fields must be present
//! with the right JSON type. Unknown fields are ignored.

use crate::models::{
    Attachment, Category, CreateRequestPayload, PublicIssue, Request, RequestStatus, Session,
    SessionUser, TenantInfo, TimelineEvent, UploadedAttachment,
};
use serde_json::{Map, Value};
use std::fmt;
use validator::{Validate, ValidateEmail};

/// One field that did not match its schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    /// Path from the document root; empty for the root itself.
    pub path: String,
    pub expected: String,
    pub found: String,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "<root>" } else { &self.path };
        write!(f, "{path}: expected {}, found {}", self.expected, self.found)
    }
}

/// A document that failed validation, with every violation found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Name of the resource shape that was checked.
    pub resource: &'static str,
    pub violations: Vec<FieldViolation>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed validation: ", self.resource)?;
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    /// Whether some violation is reported at exactly `path`.
    #[must_use]
    pub fn has_violation_at(&self, path: &str) -> bool {
        self.violations.iter().any(|v| v.path == path)
    }
}

/// A resource shape that can be parsed from untrusted JSON.
pub trait Schema: Sized {
    /// Resource name used in error reports.
    const NAME: &'static str;

    /// Read `value` found at `path`, pushing violations.
    ///
    /// Returns `None` if any violation was pushed for this value.
    fn read(value: &Value, path: &str, violations: &mut Vec<FieldViolation>) -> Option<Self>;

    /// Parse a whole document.
    ///
    /// # Errors
    /// Returns `ValidationError` listing every mismatched field.
    fn parse(value: &Value) -> Result<Self, ValidationError> {
        let mut violations = Vec::new();
        match Self::read(value, "", &mut violations) {
            Some(parsed) if violations.is_empty() => Ok(parsed),
            _ => Err(ValidationError {
                resource: Self::NAME,
                violations,
            }),
        }
    }

    /// Parse a lenient response body; an absent body is a root violation.
    ///
    /// # Errors
    /// Returns `ValidationError` if the body is absent or does not match.
    fn parse_body(body: Option<&Value>) -> Result<Self, ValidationError> {
        match body {
            Some(value) => Self::parse(value),
            None => Err(ValidationError {
                resource: Self::NAME,
                violations: vec![FieldViolation {
                    path: String::new(),
                    expected: "object".to_owned(),
                    found: "empty body".to_owned(),
                }],
            }),
        }
    }
}

/// JSON type name as reported in violations.
#[must_use]
pub fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn join(path: &str, field: &str) -> String {
    if path.is_empty() {
        field.to_owned()
    } else {
        format!("{path}.{field}")
    }
}

/// Field reader over one JSON object, accumulating violations.
struct Fields<'a> {
    object: &'a Map<String, Value>,
    path: &'a str,
    violations: &'a mut Vec<FieldViolation>,
    failed: bool,
}

impl<'a> Fields<'a> {
    fn open(
        value: &'a Value,
        path: &'a str,
        violations: &'a mut Vec<FieldViolation>,
    ) -> Option<Self> {
        if let Value::Object(object) = value {
            Some(Self {
                object,
                path,
                violations,
                failed: false,
            })
        } else {
            violations.push(FieldViolation {
                path: path.to_owned(),
                expected: "object".to_owned(),
                found: json_type(value).to_owned(),
            });
            None
        }
    }

    fn violation(&mut self, field: &str, expected: impl Into<String>, found: impl Into<String>) {
        self.failed = true;
        self.violations.push(FieldViolation {
            path: join(self.path, field),
            expected: expected.into(),
            found: found.into(),
        });
    }

    /// Present, non-null value of `field`.
    fn present(&self, field: &str) -> Option<&'a Value> {
        self.object.get(field).filter(|v| !v.is_null())
    }

    fn required<T>(
        &mut self,
        field: &str,
        expected: &str,
        extract: impl FnOnce(&'a Value) -> Option<T>,
    ) -> Option<T> {
        match self.object.get(field) {
            None => {
                self.violation(field, expected, "absent");
                None
            }
            Some(value) => {
                let found = json_type(value);
                let extracted = extract(value);
                if extracted.is_none() {
                    self.violation(field, expected, found);
                }
                extracted
            }
        }
    }

    fn optional<T>(
        &mut self,
        field: &str,
        expected: &str,
        extract: impl FnOnce(&'a Value) -> Option<T>,
    ) -> Option<T> {
        let value = self.present(field)?;
        let extracted = extract(value);
        if extracted.is_none() {
            self.violation(field, expected, json_type(value));
        }
        extracted
    }

    fn string(&mut self, field: &str) -> Option<String> {
        self.required(field, "string", |v| v.as_str().map(str::to_owned))
    }

    fn opt_string(&mut self, field: &str) -> Option<String> {
        self.optional(field, "string", |v| v.as_str().map(str::to_owned))
    }

    fn boolean(&mut self, field: &str) -> Option<bool> {
        self.required(field, "boolean", Value::as_bool)
    }

    fn number(&mut self, field: &str) -> Option<f64> {
        self.required(field, "number", Value::as_f64)
    }

    fn status(&mut self, field: &str) -> Option<RequestStatus> {
        let expected = "one of pending, in_progress, completed, rejected";
        match self.object.get(field) {
            None => {
                self.violation(field, expected, "absent");
                None
            }
            Some(Value::String(s)) => {
                let parsed = s.parse::<RequestStatus>().ok();
                if parsed.is_none() {
                    self.violation(field, expected, format!("\"{s}\""));
                }
                parsed
            }
            Some(other) => {
                self.violation(field, expected, json_type(other));
                None
            }
        }
    }

    fn email(&mut self, field: &str) -> Option<String> {
        let email = self.string(field)?;
        if email.validate_email() {
            Some(email)
        } else {
            self.violation(field, "email address", format!("\"{email}\""));
            None
        }
    }

    /// Optional nested object.
    fn opt_nested<T: Schema>(&mut self, field: &str) -> Option<T> {
        let value = self.present(field)?;
        let path = join(self.path, field);
        let before = self.violations.len();
        let parsed = T::read(value, &path, self.violations);
        if self.violations.len() > before {
            self.failed = true;
        }
        parsed
    }

    /// Optional array; absent or null reads as empty.
    fn opt_list<T: Schema>(&mut self, field: &str) -> Vec<T> {
        let Some(value) = self.present(field) else {
            return Vec::new();
        };
        let path = join(self.path, field);
        let before = self.violations.len();
        let parsed = read_list::<T>(value, &path, self.violations);
        if self.violations.len() > before {
            self.failed = true;
        }
        parsed.unwrap_or_default()
    }

    /// Finish the object: `Some(built)` only if no field failed.
    fn finish<T>(self, build: impl FnOnce() -> Option<T>) -> Option<T> {
        if self.failed { None } else { build() }
    }
}

fn read_list<T: Schema>(
    value: &Value,
    path: &str,
    violations: &mut Vec<FieldViolation>,
) -> Option<Vec<T>> {
    let Value::Array(items) = value else {
        violations.push(FieldViolation {
            path: path.to_owned(),
            expected: "array".to_owned(),
            found: json_type(value).to_owned(),
        });
        return None;
    };

    let before = violations.len();
    let parsed: Vec<T> = items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| T::read(item, &format!("{path}[{i}]"), violations))
        .collect();

    (violations.len() == before).then_some(parsed)
}

/// A collection validates every element; one bad element fails the whole list.
impl<T: Schema> Schema for Vec<T> {
    const NAME: &'static str = T::NAME;

    fn read(value: &Value, path: &str, violations: &mut Vec<FieldViolation>) -> Option<Self> {
        read_list(value, path, violations)
    }

    fn parse_body(body: Option<&Value>) -> Result<Self, ValidationError> {
        match body {
            Some(value) => Self::parse(value),
            None => Err(ValidationError {
                resource: Self::NAME,
                violations: vec![FieldViolation {
                    path: String::new(),
                    expected: "array".to_owned(),
                    found: "empty body".to_owned(),
                }],
            }),
        }
    }
}

impl Schema for TenantInfo {
    const NAME: &'static str = "tenant info";

    fn read(value: &Value, path: &str, violations: &mut Vec<FieldViolation>) -> Option<Self> {
        let mut f = Fields::open(value, path, violations)?;
        let id = f.string("id");
        let name = f.string("name");
        let logo_url = f.opt_string("logo_url");
        let primary_color = f.opt_string("primary_color");
        let commune_name = f.opt_string("commune_name");
        f.finish(|| {
            Some(TenantInfo {
                id: id?,
                name: name?,
                logo_url,
                primary_color,
                commune_name,
            })
        })
    }
}

impl Schema for SessionUser {
    const NAME: &'static str = "session user";

    fn read(value: &Value, path: &str, violations: &mut Vec<FieldViolation>) -> Option<Self> {
        let mut f = Fields::open(value, path, violations)?;
        let id = f.string("id");
        let email = f.email("email");
        let name = f.opt_string("name");
        f.finish(|| {
            Some(SessionUser {
                id: id?,
                email: email?,
                name,
            })
        })
    }
}

impl Schema for Session {
    const NAME: &'static str = "session";

    fn read(value: &Value, path: &str, violations: &mut Vec<FieldViolation>) -> Option<Self> {
        let mut f = Fields::open(value, path, violations)?;
        let authenticated = f.boolean("authenticated");
        let user = f.opt_nested::<SessionUser>("user");
        f.finish(|| {
            Some(Session {
                authenticated: authenticated?,
                user,
            })
        })
    }
}

impl Schema for Category {
    const NAME: &'static str = "category";

    fn read(value: &Value, path: &str, violations: &mut Vec<FieldViolation>) -> Option<Self> {
        let mut f = Fields::open(value, path, violations)?;
        let id = f.string("id");
        let name = f.string("name");
        let description = f.opt_string("description");
        let icon = f.opt_string("icon");
        f.finish(|| {
            Some(Category {
                id: id?,
                name: name?,
                description,
                icon,
            })
        })
    }
}

impl Schema for Attachment {
    const NAME: &'static str = "attachment";

    fn read(value: &Value, path: &str, violations: &mut Vec<FieldViolation>) -> Option<Self> {
        let mut f = Fields::open(value, path, violations)?;
        let id = f.string("id");
        let url = f.string("url");
        let thumbnail_url = f.opt_string("thumbnail_url");
        f.finish(|| {
            Some(Attachment {
                id: id?,
                url: url?,
                thumbnail_url,
            })
        })
    }
}

impl Schema for Request {
    const NAME: &'static str = "request";

    fn read(value: &Value, path: &str, violations: &mut Vec<FieldViolation>) -> Option<Self> {
        let mut f = Fields::open(value, path, violations)?;
        let id = f.string("id");
        let category_id = f.string("category_id");
        let category_name = f.opt_string("category_name");
        let status = f.status("status");
        let description = f.string("description");
        let latitude = f.number("latitude");
        let longitude = f.number("longitude");
        let created_at = f.string("created_at");
        let updated_at = f.string("updated_at");
        let attachments = f.opt_list::<Attachment>("attachments");
        f.finish(|| {
            Some(Request {
                id: id?,
                category_id: category_id?,
                category_name,
                status: status?,
                description: description?,
                latitude: latitude?,
                longitude: longitude?,
                created_at: created_at?,
                updated_at: updated_at?,
                attachments,
            })
        })
    }
}

impl Schema for TimelineEvent {
    const NAME: &'static str = "timeline event";

    fn read(value: &Value, path: &str, violations: &mut Vec<FieldViolation>) -> Option<Self> {
        let mut f = Fields::open(value, path, violations)?;
        let id = f.string("id");
        let request_id = f.string("request_id");
        let event_type = f.string("event_type");
        let description = f.string("description");
        let created_at = f.string("created_at");
        let user_name = f.opt_string("user_name");
        f.finish(|| {
            Some(TimelineEvent {
                id: id?,
                request_id: request_id?,
                event_type: event_type?,
                description: description?,
                created_at: created_at?,
                user_name,
            })
        })
    }
}

impl Schema for PublicIssue {
    const NAME: &'static str = "public issue";

    fn read(value: &Value, path: &str, violations: &mut Vec<FieldViolation>) -> Option<Self> {
        let mut f = Fields::open(value, path, violations)?;
        let id = f.string("id");
        let category_id = f.string("category_id");
        let category_name = f.opt_string("category_name");
        let status = f.status("status");
        let latitude = f.number("latitude");
        let longitude = f.number("longitude");
        let created_at = f.string("created_at");
        f.finish(|| {
            Some(PublicIssue {
                id: id?,
                category_id: category_id?,
                category_name,
                status: status?,
                latitude: latitude?,
                longitude: longitude?,
                created_at: created_at?,
            })
        })
    }
}

impl Schema for UploadedAttachment {
    const NAME: &'static str = "uploaded attachment";

    fn read(value: &Value, path: &str, violations: &mut Vec<FieldViolation>) -> Option<Self> {
        let mut f = Fields::open(value, path, violations)?;
        let id = f.string("id");
        let url = f.string("url");
        f.finish(|| Some(UploadedAttachment { id: id?, url: url? }))
    }
}

impl CreateRequestPayload {
    /// Client-side check run before the payload is submitted.
    ///
    /// # Errors
    /// Returns `ValidationError` with one violation per rejected field.
    pub fn check(&self) -> Result<(), ValidationError> {
        let mut violations = Vec::new();

        // NaN compares false against both range bounds.
        for (field, value) in [("latitude", self.latitude), ("longitude", self.longitude)] {
            if !value.is_finite() {
                violations.push(FieldViolation {
                    path: field.to_owned(),
                    expected: "finite number".to_owned(),
                    found: value.to_string(),
                });
            }
        }

        if let Err(errors) = self.validate() {
            let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
            fields.sort_by(|a, b| a.0.cmp(&b.0));
            for (field, field_errors) in fields {
                let field: &str = &field;
                if violations.iter().any(|v| v.path == field) {
                    continue;
                }
                for error in field_errors {
                    violations.push(FieldViolation {
                        path: field.to_owned(),
                        expected: error
                            .message
                            .as_ref()
                            .map_or_else(|| error.code.to_string(), ToString::to_string),
                        found: self.describe(field),
                    });
                }
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                resource: "create request payload",
                violations,
            })
        }
    }

    fn describe(&self, field: &str) -> String {
        match field {
            "category_id" => format!("{} characters", self.category_id.chars().count()),
            "description" => format!("{} characters", self.description.chars().count()),
            "latitude" => self.latitude.to_string(),
            "longitude" => self.longitude.to_string(),
            _ => String::new(),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    fn request_json() -> Value {
        json!({
            "id": "r1",
            "category_id": "c1",
            "category_name": "Roads",
            "status": "in_progress",
            "description": "Pothole on Main Street",
            "latitude": 45.5,
            "longitude": -73.6,
            "created_at": "2024-05-01T10:00:00Z",
            "updated_at": "2024-05-02T10:00:00Z",
            "attachments": [{"id": "a1", "url": "/files/a1"}]
        })
    }

    #[test]
    fn test_request_parses() {
        let request = Request::parse(&request_json()).unwrap();
        assert_eq!(request.status, RequestStatus::InProgress);
        assert_eq!(request.attachments.len(), 1);
        assert_eq!(request.attachments[0].thumbnail_url, None);
    }

    #[test]
    fn test_missing_required_field_rejected() {
        let mut value = request_json();
        value.as_object_mut().unwrap().remove("created_at");

        let err = Request::parse(&value).unwrap_err();
        assert_eq!(err.resource, "request");
        assert_eq!(
            err.violations,
            vec![FieldViolation {
                path: "created_at".to_owned(),
                expected: "string".to_owned(),
                found: "absent".to_owned(),
            }]
        );
    }

    #[test]
    fn test_out_of_set_status_rejected() {
        let mut value = request_json();
        value["status"] = json!("closed");

        let err = Request::parse(&value).unwrap_err();
        assert!(err.has_violation_at("status"));
        assert!(err.to_string().contains("\"closed\""));
    }

    #[test]
    fn test_all_violations_reported() {
        let value = json!({"id": 7, "name": null});
        let err = TenantInfo::parse(&value).unwrap_err();

        assert!(err.has_violation_at("id"));
        assert!(err.has_violation_at("name"));
        assert_eq!(err.violations.len(), 2);
        assert_eq!(err.violations[0].found, "number");
    }

    #[test]
    fn test_optional_fields_absent_or_null() {
        let base = json!({"id": "t1", "name": "Town"});
        let optional = ["logo_url", "primary_color", "commune_name"];

        // Every combination of absent / null / present for the optional fields.
        for mask in 0..27u32 {
            let mut value = base.clone();
            let mut m = mask;
            for field in optional {
                match m % 3 {
                    0 => {}
                    1 => value[field] = Value::Null,
                    _ => value[field] = json!("x"),
                }
                m /= 3;
            }
            let tenant = TenantInfo::parse(&value).unwrap();
            assert_eq!(tenant.name, "Town");
        }
    }

    #[test]
    fn test_optional_field_with_wrong_type_rejected() {
        let value = json!({"id": "t1", "name": "Town", "logo_url": 42});
        let err = TenantInfo::parse(&value).unwrap_err();
        assert!(err.has_violation_at("logo_url"));
    }

    #[test]
    fn test_request_optional_fields_absent() {
        let mut value = request_json();
        let object = value.as_object_mut().unwrap();
        object.remove("category_name");
        object.remove("attachments");

        let request = Request::parse(&value).unwrap();
        assert!(request.category_name.is_none());
        assert!(request.attachments.is_empty());
    }

    #[test]
    fn test_list_reports_indexed_paths() {
        let good = json!({
            "id": "p1", "category_id": "c1", "status": "pending",
            "latitude": 1.0, "longitude": 2.0, "created_at": "2024-05-01T10:00:00Z"
        });
        let mut bad = good.clone();
        bad["status"] = json!("archived");

        let err = Vec::<PublicIssue>::parse(&json!([good.clone(), good, bad])).unwrap_err();
        assert_eq!(err.resource, "public issue");
        assert!(err.has_violation_at("[2].status"));
    }

    #[test]
    fn test_nested_list_paths() {
        let mut value = request_json();
        value["attachments"] = json!([{"id": "a1"}]);

        let err = Request::parse(&value).unwrap_err();
        assert!(err.has_violation_at("attachments[0].url"));
    }

    #[test]
    fn test_session_email_checked() {
        let value = json!({
            "authenticated": true,
            "user": {"id": "u1", "email": "not-an-email"}
        });
        let err = Session::parse(&value).unwrap_err();
        assert!(err.has_violation_at("user.email"));

        let ok = json!({
            "authenticated": true,
            "user": {"id": "u1", "email": "jane@example.org", "name": "Jane"}
        });
        let session = Session::parse(&ok).unwrap();
        assert_eq!(session.authenticated_user().unwrap().name.as_deref(), Some("Jane"));
    }

    #[test]
    fn test_session_user_null() {
        let session = Session::parse(&json!({"authenticated": false, "user": null})).unwrap();
        assert_eq!(session, Session::anonymous());
    }

    #[test]
    fn test_absent_body_rejected() {
        let err = Session::parse_body(None).unwrap_err();
        assert_eq!(err.violations[0].found, "empty body");
        assert_eq!(err.violations[0].expected, "object");

        let err = Vec::<Category>::parse_body(None).unwrap_err();
        assert_eq!(err.violations[0].expected, "array");
    }

    #[test]
    fn test_root_type_mismatch() {
        let err = Vec::<Category>::parse(&json!({"id": "c1"})).unwrap_err();
        assert_eq!(err.violations[0].path, "");
        assert_eq!(err.violations[0].found, "object");
    }

    fn payload(description: &str) -> CreateRequestPayload {
        CreateRequestPayload {
            category_id: "c1".to_owned(),
            description: description.to_owned(),
            latitude: 45.0,
            longitude: -73.0,
        }
    }

    #[test]
    fn test_payload_description_length() {
        let err = payload("123456789").check().unwrap_err();
        assert!(err.has_violation_at("description"));
        assert_eq!(
            err.violations[0].expected,
            "Description must be at least 10 characters"
        );

        assert!(payload("1234567890").check().is_ok());
    }

    #[test]
    fn test_payload_counts_characters_not_bytes() {
        // Nine characters, eighteen bytes.
        assert!(payload("ééééééééé").check().is_err());
    }

    #[test]
    fn test_payload_coordinates() {
        let mut p = payload("long enough description");
        p.latitude = 90.5;
        p.longitude = -180.5;
        let err = p.check().unwrap_err();
        assert!(err.has_violation_at("latitude"));
        assert!(err.has_violation_at("longitude"));

        p.latitude = f64::NAN;
        p.longitude = 180.0;
        let err = p.check().unwrap_err();
        assert_eq!(err.violations.len(), 1);
        assert_eq!(err.violations[0].expected, "finite number");
    }

    #[test]
    fn test_payload_requires_category() {
        let mut p = payload("long enough description");
        p.category_id = String::new();
        assert!(p.check().unwrap_err().has_violation_at("category_id"));
    }
}
