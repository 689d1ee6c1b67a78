//! Declarative request descriptions.
//!
//! An [`Endpoint`] names its method and path template and lists its
//! parameters in declaration order. Each parameter contributes one thing to
//! the request through [`RequestParameter::apply`]:
//! - [`Path`]: substitutes the `{field}` placeholder
//! - [`Query`]: appends `field=value`
//! - [`Header`]: sets the `field` header (underscores become hyphens)
//! - [`JsonBody`]: serializes the body as JSON
//!
//! Wrapping any parameter in `Option` makes it contribute nothing when `None`.
//!
//! # Example
//!
//! ```
//! use netkit_client::{Endpoint, Path, Query, RequestParameter, RequestParts};
//! use netkit_core::Url;
//! use http::Method;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Repo {
//!     name: String,
//! }
//!
//! struct GetRepo {
//!     owner: Path<String>,
//!     page: Option<Query<u32>>,
//! }
//!
//! impl Endpoint for GetRepo {
//!     type Output = Repo;
//!
//!     fn method(&self) -> Method {
//!         Method::GET
//!     }
//!
//!     fn path(&self) -> &str {
//!         "/repos/{owner}"
//!     }
//!
//!     fn parameters(&self) -> Vec<(&'static str, &dyn RequestParameter)> {
//!         vec![("owner", &self.owner), ("page", &self.page)]
//!     }
//! }
//!
//! let base = Url::parse("https://api.example.com").unwrap();
//! let endpoint = GetRepo { owner: Path("octo cat".into()), page: Some(Query(2)) };
//! let request = RequestParts::build(&base, &endpoint, None).unwrap();
//! assert_eq!(request.url.as_str(), "https://api.example.com/repos/octo%20cat?page=2");
//! ```

use std::fmt::Display;
use std::time::Duration;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use netkit_core::{DEFAULT_TIMEOUT, Url, WireRequest};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::BuildError;

/// A declared request.
pub trait Endpoint {
    /// The decoded response type.
    type Output: DeserializeOwned + 'static;

    /// The HTTP method.
    fn method(&self) -> Method;

    /// The path template, relative to the service base URL. `{name}`
    /// segments are filled by [`Path`] parameters.
    fn path(&self) -> &str;

    /// Parameters paired with their field names, in declaration order.
    fn parameters(&self) -> Vec<(&'static str, &dyn RequestParameter)> {
        Vec::new()
    }

    /// Per-request timeout, overriding the service default.
    fn timeout(&self) -> Option<Duration> {
        None
    }
}

/// One declared field's contribution to a request.
pub trait RequestParameter {
    /// Apply this parameter under `field`.
    fn apply(&self, request: &mut RequestParts, field: &str) -> Result<(), BuildError>;
}

impl<P: RequestParameter> RequestParameter for Option<P> {
    fn apply(&self, request: &mut RequestParts, field: &str) -> Result<(), BuildError> {
        match self {
            Some(param) => param.apply(request, field),
            None => Ok(()),
        }
    }
}

/// Substitutes the `{field}` placeholder in the path.
///
/// The value is percent-encoded as a single path segment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Path<T>(pub T);

impl<T: Display> RequestParameter for Path<T> {
    fn apply(&self, request: &mut RequestParts, field: &str) -> Result<(), BuildError> {
        request.set_path_param(field, self.0.to_string())
    }
}

/// Appends `field=value` to the query string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query<T>(pub T);

impl<T: Display> RequestParameter for Query<T> {
    fn apply(&self, request: &mut RequestParts, field: &str) -> Result<(), BuildError> {
        request.append_query(field, self.0.to_string());
        Ok(())
    }
}

/// Sets a header named after the field, with `_` replaced by `-`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header<T>(pub T);

impl<T: Display> RequestParameter for Header<T> {
    fn apply(&self, request: &mut RequestParts, field: &str) -> Result<(), BuildError> {
        request.insert_header(&field.replace('_', "-"), &self.0.to_string())
    }
}

/// Serializes the value as the JSON request body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JsonBody<T>(pub T);

impl<T: Serialize> RequestParameter for JsonBody<T> {
    fn apply(&self, request: &mut RequestParts, field: &str) -> Result<(), BuildError> {
        let bytes = serde_json::to_vec(&self.0).map_err(|e| BuildError::Body {
            field: field.to_string(),
            reason: e.to_string(),
        })?;
        request.set_body(field, bytes, Some(HeaderValue::from_static("application/json")))
    }
}

/// A request under construction.
#[derive(Clone, Debug)]
pub struct RequestParts {
    method: Method,
    template: String,
    path_params: Vec<(String, String)>,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl RequestParts {
    /// Start a request from a method and path template.
    pub fn new(method: Method, template: impl Into<String>) -> Self {
        Self {
            method,
            template: template.into(),
            path_params: Vec::new(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Build a wire request from an endpoint.
    ///
    /// Parameters are applied in declaration order. The timeout is the
    /// endpoint's own, then `default_timeout`, then [`DEFAULT_TIMEOUT`].
    pub fn build<E: Endpoint + ?Sized>(
        base_url: &Url,
        endpoint: &E,
        default_timeout: Option<Duration>,
    ) -> Result<WireRequest, BuildError> {
        let mut parts = RequestParts::new(endpoint.method(), endpoint.path());
        for (field, param) in endpoint.parameters() {
            param.apply(&mut parts, field)?;
        }
        let timeout = endpoint
            .timeout()
            .or(default_timeout)
            .unwrap_or(DEFAULT_TIMEOUT);
        parts.finish(base_url, timeout)
    }

    /// The HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The headers set so far.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Record the value for the `{field}` placeholder.
    pub fn set_path_param(&mut self, field: &str, value: String) -> Result<(), BuildError> {
        if !self.template.contains(&format!("{{{}}}", field)) {
            return Err(BuildError::UnknownPlaceholder(field.to_string()));
        }
        self.path_params.push((field.to_string(), value));
        Ok(())
    }

    /// Append a query pair.
    pub fn append_query(&mut self, name: &str, value: String) {
        self.query.push((name.to_string(), value));
    }

    /// Set a header, replacing any previous value.
    pub fn insert_header(&mut self, name: &str, value: &str) -> Result<(), BuildError> {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            BuildError::InvalidHeader {
                name: name.to_string(),
                reason: e.to_string(),
            }
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| BuildError::InvalidHeader {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        self.headers.insert(header_name, header_value);
        Ok(())
    }

    /// Set the body. A request carries at most one body.
    pub fn set_body(
        &mut self,
        field: &str,
        body: impl Into<Bytes>,
        content_type: Option<HeaderValue>,
    ) -> Result<(), BuildError> {
        if self.body.is_some() {
            return Err(BuildError::Body {
                field: field.to_string(),
                reason: "request already has a body".to_string(),
            });
        }
        self.body = Some(body.into());
        if let Some(content_type) = content_type {
            self.headers.entry(CONTENT_TYPE).or_insert(content_type);
        }
        Ok(())
    }

    /// Resolve the path against `base_url` and produce the wire request.
    pub fn finish(self, base_url: &Url, timeout: Duration) -> Result<WireRequest, BuildError> {
        let segments = self.render_segments()?;

        let invalid = |reason: &str| BuildError::InvalidUrl {
            url: format!("{}{}", base_url, self.template),
            reason: reason.to_string(),
        };
        let mut url = base_url.clone();
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|_| invalid("base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(&segments);
        if url.host_str().is_none_or(str::is_empty) {
            return Err(invalid("URL has no host"));
        }
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.query);
        }

        let mut request = WireRequest::new(self.method, url).timeout(timeout);
        request.headers = self.headers;
        request.body = self.body;
        Ok(request)
    }

    /// Split the template into segments with placeholders substituted.
    fn render_segments(&self) -> Result<Vec<String>, BuildError> {
        let trimmed = self.template.trim_start_matches('/');
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        trimmed
            .split('/')
            .map(|segment| self.render_segment(segment))
            .collect()
    }

    /// Fill the `{name}` placeholders of one segment in a single pass.
    ///
    /// Substituted values are copied verbatim and never rescanned. A `{`
    /// without a closing `}` is kept as literal text.
    fn render_segment(&self, segment: &str) -> Result<String, BuildError> {
        let mut rendered = String::with_capacity(segment.len());
        let mut rest = segment;
        while let Some(start) = rest.find('{') {
            let Some(len) = rest[start..].find('}') else {
                break;
            };
            let name = &rest[start + 1..start + len];
            let value = self
                .path_params
                .iter()
                .find(|(field, _)| field == name)
                .map(|(_, value)| value)
                .ok_or_else(|| BuildError::UnresolvedPlaceholder(name.to_string()))?;
            rendered.push_str(&rest[..start]);
            rendered.push_str(value);
            rest = &rest[start + len + 1..];
        }
        rendered.push_str(rest);
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Item {
        #[allow(dead_code)]
        id: u32,
    }

    #[derive(Serialize)]
    struct NewItem {
        name: &'static str,
    }

    struct UpdateItem {
        id: Path<u32>,
        dry_run: Option<Query<bool>>,
        x_request_id: Header<&'static str>,
        body: JsonBody<NewItem>,
    }

    impl Endpoint for UpdateItem {
        type Output = Item;

        fn method(&self) -> Method {
            Method::PUT
        }

        fn path(&self) -> &str {
            "/items/{id}"
        }

        fn parameters(&self) -> Vec<(&'static str, &dyn RequestParameter)> {
            vec![
                ("id", &self.id),
                ("dry_run", &self.dry_run),
                ("x_request_id", &self.x_request_id),
                ("body", &self.body),
            ]
        }

        fn timeout(&self) -> Option<Duration> {
            Some(Duration::from_secs(5))
        }
    }

    /// A bare endpoint described by its template.
    struct Template(&'static str);

    impl Endpoint for Template {
        type Output = Item;

        fn method(&self) -> Method {
            Method::GET
        }

        fn path(&self) -> &str {
            self.0
        }
    }

    fn base() -> Url {
        Url::parse("https://api.example.com/v1/").unwrap()
    }

    fn update(dry_run: Option<bool>) -> UpdateItem {
        UpdateItem {
            id: Path(42),
            dry_run: dry_run.map(Query),
            x_request_id: Header("abc"),
            body: JsonBody(NewItem { name: "widget" }),
        }
    }

    #[test]
    fn test_build_applies_every_parameter() {
        let request = RequestParts::build(&base(), &update(Some(true)), None).unwrap();

        assert_eq!(request.method, Method::PUT);
        assert_eq!(request.url.as_str(), "https://api.example.com/v1/items/42?dry_run=true");
        assert_eq!(request.headers.get("x-request-id").unwrap(), "abc");
        assert_eq!(request.headers.get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(request.body.as_deref(), Some(&br#"{"name":"widget"}"#[..]));
        assert_eq!(request.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_none_parameter_contributes_nothing() {
        let request = RequestParts::build(&base(), &update(None), None).unwrap();
        assert_eq!(request.url.query(), None);
    }

    #[test]
    fn test_timeout_fallbacks() {
        let request = RequestParts::build(&base(), &Template("/items"), None).unwrap();
        assert_eq!(request.timeout, DEFAULT_TIMEOUT);

        let request =
            RequestParts::build(&base(), &Template("/items"), Some(Duration::from_secs(9))).unwrap();
        assert_eq!(request.timeout, Duration::from_secs(9));
    }

    #[test]
    fn test_unresolved_placeholder() {
        let err = RequestParts::build(&base(), &Template("/items/{id}"), None).unwrap_err();
        assert_eq!(err, BuildError::UnresolvedPlaceholder("id".into()));
    }

    #[test]
    fn test_unknown_placeholder() {
        let mut parts = RequestParts::new(Method::GET, "/items");
        let err = parts.set_path_param("id", "1".into()).unwrap_err();
        assert_eq!(err, BuildError::UnknownPlaceholder("id".into()));
    }

    #[test]
    fn test_path_value_is_encoded_as_one_segment() {
        let mut parts = RequestParts::new(Method::GET, "/files/{name}/raw");
        parts.set_path_param("name", "a/b c".into()).unwrap();
        let request = parts.finish(&base(), DEFAULT_TIMEOUT).unwrap();
        assert_eq!(request.url.path(), "/v1/files/a%2Fb%20c/raw");
    }

    #[test]
    fn test_partial_segment_placeholder() {
        let mut parts = RequestParts::new(Method::GET, "/items/v{version}");
        parts.set_path_param("version", "2".into()).unwrap();
        let request = parts.finish(&base(), DEFAULT_TIMEOUT).unwrap();
        assert_eq!(request.url.path(), "/v1/items/v2");
    }

    #[test]
    fn test_path_value_with_other_placeholder_is_literal() {
        let mut parts = RequestParts::new(Method::GET, "/a/{x}/{y}");
        parts.set_path_param("x", "{y}".into()).unwrap();
        parts.set_path_param("y", "1".into()).unwrap();
        let request = parts.finish(&base(), DEFAULT_TIMEOUT).unwrap();
        assert_eq!(request.url.path(), "/v1/a/%7By%7D/1");
    }

    #[test]
    fn test_path_value_with_own_placeholder_is_literal() {
        let mut parts = RequestParts::new(Method::GET, "/files/{name}");
        parts.set_path_param("name", "{name}".into()).unwrap();
        let request = parts.finish(&base(), DEFAULT_TIMEOUT).unwrap();
        assert_eq!(request.url.path(), "/v1/files/%7Bname%7D");
    }

    #[test]
    fn test_same_segment_placeholders_filled_once() {
        let mut parts = RequestParts::new(Method::GET, "/{a}-{b}");
        parts.set_path_param("a", "{b}".into()).unwrap();
        parts.set_path_param("b", "2".into()).unwrap();
        let request = parts.finish(&base(), DEFAULT_TIMEOUT).unwrap();
        assert_eq!(request.url.path(), "/v1/%7Bb%7D-2");
    }

    #[test]
    fn test_unclosed_brace_is_literal() {
        let parts = RequestParts::new(Method::GET, "/items/{open");
        let request = parts.finish(&base(), DEFAULT_TIMEOUT).unwrap();
        assert_eq!(request.url.path(), "/v1/items/%7Bopen");
    }

    #[test]
    fn test_invalid_header() {
        let mut parts = RequestParts::new(Method::GET, "/");
        let err = parts.insert_header("x-token", "line\nbreak").unwrap_err();
        assert!(matches!(err, BuildError::InvalidHeader { name, .. } if name == "x-token"));
    }

    #[test]
    fn test_second_body_rejected() {
        let mut parts = RequestParts::new(Method::POST, "/");
        parts.set_body("a", "one", None).unwrap();
        let err = parts.set_body("b", "two", None).unwrap_err();
        assert!(matches!(err, BuildError::Body { field, .. } if field == "b"));
    }

    #[test]
    fn test_base_without_path_support() {
        let base = Url::parse("mailto:someone@example.com").unwrap();
        let err = RequestParts::build(&base, &Template("/items"), None).unwrap_err();
        assert!(matches!(err, BuildError::InvalidUrl { .. }));
    }

    #[test]
    fn test_base_query_is_preserved() {
        let base = Url::parse("https://api.example.com?key=k").unwrap();
        let mut parts = RequestParts::new(Method::GET, "/search");
        parts.append_query("q", "rust lang".into());
        let request = parts.finish(&base, DEFAULT_TIMEOUT).unwrap();
        assert_eq!(request.url.as_str(), "https://api.example.com/search?key=k&q=rust+lang");
    }
}
