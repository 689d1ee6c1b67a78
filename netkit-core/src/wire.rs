//! Wire-level request and response carriers.
//!
//! These are the fully-formed HTTP messages exchanged with a transport:
//! - [`WireRequest`]: method, absolute URL, headers, optional body, timeout
//! - [`WireResponse`]: status code, headers, body bytes

use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, header};
use url::Url;

/// Timeout applied to a request when nothing more specific is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// How a transport with a local HTTP cache should treat a request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CachePolicy {
    /// Follow the usual HTTP caching rules.
    #[default]
    UseProtocolCache,
    /// Never answer from a local cache; the request must reach the origin.
    ReloadIgnoringLocalCache,
}

/// A fully-built HTTP request, ready for a transport.
///
/// A request is built once per call and cloned for every attempt, so
/// interceptors can rewrite the URL or headers of one attempt without
/// leaking into the next.
#[derive(Clone, Debug)]
pub struct WireRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute request URL.
    pub url: Url,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body, if any.
    pub body: Option<Bytes>,
    /// Per-request timeout, enforced by the transport.
    pub timeout: Duration,
    /// Local cache behaviour for transports that keep one.
    pub cache_policy: CachePolicy,
}

impl WireRequest {
    /// Create a request with no headers, no body and the default timeout.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            timeout: DEFAULT_TIMEOUT,
            cache_policy: CachePolicy::default(),
        }
    }

    /// Shorthand for a `GET` request.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Set a header, replacing any previous value.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get a mutable reference to the headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Whether the method is safe to send as a conditional request (GET/HEAD).
    pub fn is_idempotent_safe(&self) -> bool {
        self.method == Method::GET || self.method == Method::HEAD
    }
}

/// A response as returned by a transport, before any validation.
#[derive(Clone, Debug)]
pub struct WireResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HeaderMap,
    /// Raw response body.
    pub body: Bytes,
}

impl WireResponse {
    /// Create a new response.
    pub fn new(status: u16, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Look up a header as a string. Names are matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The `ETag` validator, if the server sent one.
    pub fn etag(&self) -> Option<&str> {
        self.headers
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
    }

    /// Whether the body is empty.
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}
