use crate::error::{HttpError, InvalidUriKind};
use url::Url;

/// Ordered query parameters for a request.
///
/// Parameters added with an absent value are kept in the list but never
/// serialized, so callers can pass optional filters straight through:
///
/// ```ignore
/// let params = QueryParams::new()
///     .with("bbox", "2,1,4,3")
///     .with_opt("status", None::<&str>); // omitted from the URL
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, Option<String>)>,
}

impl QueryParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter with a present value.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.pairs.push((key.into(), Some(value.to_string())));
        self
    }

    /// Add a parameter that is only serialized when `value` is `Some`.
    #[must_use]
    pub fn with_opt<V: ToString>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        self.pairs
            .push((key.into(), value.map(|v| v.to_string())));
        self
    }

    /// Whether no parameter would be serialized.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.present().next().is_none()
    }

    /// Iterate over the parameters that carry a value, in insertion order.
    pub fn present(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs
            .iter()
            .filter_map(|(k, v)| v.as_deref().map(|v| (k.as_str(), v)))
    }

    pub(crate) fn append_to(&self, url: &mut Url) {
        if self.is_empty() {
            return;
        }
        let mut pairs = url.query_pairs_mut();
        for (key, value) in self.present() {
            pairs.append_pair(key, value);
        }
    }
}

/// Resolve `path` against `base` the way a browser resolves a relative URL,
/// then append the present query parameters.
pub(crate) fn resolve_url(base: &Url, path: &str, params: &QueryParams) -> Result<Url, HttpError> {
    let mut url = base.join(path).map_err(|e| HttpError::InvalidUri {
        url: path.to_owned(),
        kind: InvalidUriKind::ParseError,
        reason: e.to_string(),
    })?;
    params.append_to(&mut url);
    Ok(url)
}

/// Parse and check the configured base URL.
pub(crate) fn parse_base_url(raw: &str) -> Result<Url, HttpError> {
    if raw.trim().is_empty() {
        return Err(HttpError::InvalidUri {
            url: raw.to_owned(),
            kind: InvalidUriKind::MissingBaseUrl,
            reason: "base URL is not configured".to_owned(),
        });
    }

    let url = Url::parse(raw).map_err(|e| HttpError::InvalidUri {
        url: raw.to_owned(),
        kind: InvalidUriKind::ParseError,
        reason: e.to_string(),
    })?;

    if url.host_str().is_none() {
        return Err(HttpError::InvalidUri {
            url: raw.to_owned(),
            kind: InvalidUriKind::MissingAuthority,
            reason: "missing host/authority".to_owned(),
        });
    }

    Ok(url)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://portal.example.org/").unwrap()
    }

    #[test]
    fn test_absent_values_are_omitted() {
        let params = QueryParams::new()
            .with("page", 2)
            .with_opt("status", None::<&str>)
            .with_opt("sort", Some("created_at"));

        let url = resolve_url(&base(), "/api/v1/requests/mine", &params).unwrap();
        assert_eq!(
            url.as_str(),
            "https://portal.example.org/api/v1/requests/mine?page=2&sort=created_at"
        );
        assert!(!url.as_str().contains("undefined"));
        assert!(!url.as_str().contains("status"));
    }

    #[test]
    fn test_only_absent_values_leaves_no_query() {
        let params = QueryParams::new().with_opt("status", None::<String>);
        assert!(params.is_empty());

        let url = resolve_url(&base(), "/api/v1/auth/session", &params).unwrap();
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_absolute_path_replaces_base_path() {
        let base = Url::parse("https://portal.example.org/resident/").unwrap();
        let url = resolve_url(&base, "/api/v1/public/tenant-info", &QueryParams::new()).unwrap();
        assert_eq!(url.as_str(), "https://portal.example.org/api/v1/public/tenant-info");
    }

    #[test]
    fn test_query_values_round_trip_through_encoding() {
        let params = QueryParams::new().with("bbox", "2,1,4,3");
        let url = resolve_url(&base(), "/api/v1/public/issues", &params).unwrap();

        let (key, value) = url.query_pairs().next().unwrap();
        assert_eq!(key, "bbox");
        assert_eq!(value, "2,1,4,3");
    }

    #[test]
    fn test_parse_base_url_rejects_empty_and_relative() {
        let err = parse_base_url("").unwrap_err();
        assert!(matches!(
            err,
            HttpError::InvalidUri {
                kind: InvalidUriKind::MissingBaseUrl,
                ..
            }
        ));

        let err = parse_base_url("/api").unwrap_err();
        assert!(matches!(
            err,
            HttpError::InvalidUri {
                kind: InvalidUriKind::ParseError,
                ..
            }
        ));
    }
}
