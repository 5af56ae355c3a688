//! Cache identities of fetched resources.

use issue_portal_sdk::BoundingBox;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Fractional digits kept for bounding-box coordinates in cache keys.
pub const BBOX_KEY_PRECISION: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    TenantInfo,
    Session,
    Categories,
    MyRequests,
    Request,
    RequestTimeline,
    PublicIssues,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 7] = [
        ResourceKind::TenantInfo,
        ResourceKind::Session,
        ResourceKind::Categories,
        ResourceKind::MyRequests,
        ResourceKind::Request,
        ResourceKind::RequestTimeline,
        ResourceKind::PublicIssues,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::TenantInfo => "tenant_info",
            ResourceKind::Session => "session",
            ResourceKind::Categories => "categories",
            ResourceKind::MyRequests => "my_requests",
            ResourceKind::Request => "request",
            ResourceKind::RequestTimeline => "request_timeline",
            ResourceKind::PublicIssues => "public_issues",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical bounding box: `minLng,minLat,maxLng,maxLat` at fixed precision.
///
/// `2` and `2.0` produce the same key, and `-0.0` is written as `0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BboxKey(String);

impl BboxKey {
    #[must_use]
    pub fn new(bbox: &BoundingBox) -> Self {
        let coords = [bbox.min_lng, bbox.min_lat, bbox.max_lng, bbox.max_lat];
        let parts: Vec<String> = coords.iter().map(|c| canonical_coordinate(*c)).collect();
        Self(parts.join(","))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The box this key was built from, at key precision.
    ///
    /// # Errors
    /// `KeyParseError::BoundingBox` if the key text is not four numbers.
    pub fn to_bbox(&self) -> Result<BoundingBox, KeyParseError> {
        parse_bbox(&self.0)
    }
}

impl fmt::Display for BboxKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&BoundingBox> for BboxKey {
    fn from(bbox: &BoundingBox) -> Self {
        Self::new(bbox)
    }
}

fn canonical_coordinate(value: f64) -> String {
    let text = format!("{value:.prec$}", prec = BBOX_KEY_PRECISION);
    match text.strip_prefix('-') {
        Some(rest) if rest.bytes().all(|b| b == b'0' || b == b'.') => rest.to_owned(),
        _ => text,
    }
}

fn parse_bbox(text: &str) -> Result<BoundingBox, KeyParseError> {
    let invalid = || KeyParseError::BoundingBox(text.to_owned());
    let coords = text
        .split(',')
        .map(|part| part.trim().parse::<f64>().map_err(|_| invalid()))
        .collect::<Result<Vec<_>, _>>()?;
    let [min_lng, min_lat, max_lng, max_lat] = coords[..] else {
        return Err(invalid());
    };
    Ok(BoundingBox::new(min_lat, min_lng, max_lat, max_lng))
}

/// Identity of one cache entry.
///
/// Displays as `kind` or `kind/param`, and parses back from that form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKey {
    TenantInfo,
    Session,
    Categories,
    MyRequests,
    Request(String),
    RequestTimeline(String),
    PublicIssues(BboxKey),
}

impl ResourceKey {
    #[must_use]
    pub fn request(id: impl Into<String>) -> Self {
        ResourceKey::Request(id.into())
    }

    #[must_use]
    pub fn request_timeline(id: impl Into<String>) -> Self {
        ResourceKey::RequestTimeline(id.into())
    }

    #[must_use]
    pub fn public_issues(bbox: &BoundingBox) -> Self {
        ResourceKey::PublicIssues(BboxKey::new(bbox))
    }

    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceKey::TenantInfo => ResourceKind::TenantInfo,
            ResourceKey::Session => ResourceKind::Session,
            ResourceKey::Categories => ResourceKind::Categories,
            ResourceKey::MyRequests => ResourceKind::MyRequests,
            ResourceKey::Request(_) => ResourceKind::Request,
            ResourceKey::RequestTimeline(_) => ResourceKind::RequestTimeline,
            ResourceKey::PublicIssues(_) => ResourceKind::PublicIssues,
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self.kind();
        match self {
            ResourceKey::Request(id) | ResourceKey::RequestTimeline(id) => write!(f, "{kind}/{id}"),
            ResourceKey::PublicIssues(bbox) => write!(f, "{kind}/{bbox}"),
            _ => write!(f, "{kind}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyParseError {
    #[error("unknown resource kind '{0}'")]
    UnknownKind(String),
    #[error("resource '{0}' takes no parameter")]
    UnexpectedParam(ResourceKind),
    #[error("resource '{0}' requires a parameter")]
    MissingParam(ResourceKind),
    #[error("invalid bounding box '{0}'")]
    BoundingBox(String),
}

impl FromStr for ResourceKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, param) = match s.split_once('/') {
            Some((name, param)) => (name, Some(param)),
            None => (s, None),
        };
        let kind = ResourceKind::ALL
            .into_iter()
            .find(|k| k.as_str() == name)
            .ok_or_else(|| KeyParseError::UnknownKind(name.to_owned()))?;

        let param = param.filter(|p| !p.is_empty());
        match (kind, param) {
            (ResourceKind::TenantInfo, None) => Ok(ResourceKey::TenantInfo),
            (ResourceKind::Session, None) => Ok(ResourceKey::Session),
            (ResourceKind::Categories, None) => Ok(ResourceKey::Categories),
            (ResourceKind::MyRequests, None) => Ok(ResourceKey::MyRequests),
            (ResourceKind::Request, Some(id)) => Ok(ResourceKey::request(id)),
            (ResourceKind::RequestTimeline, Some(id)) => Ok(ResourceKey::request_timeline(id)),
            (ResourceKind::PublicIssues, Some(text)) => {
                Ok(ResourceKey::public_issues(&parse_bbox(text)?))
            }
            (
                ResourceKind::Request | ResourceKind::RequestTimeline | ResourceKind::PublicIssues,
                None,
            ) => Err(KeyParseError::MissingParam(kind)),
            (_, Some(_)) => Err(KeyParseError::UnexpectedParam(kind)),
        }
    }
}
