//! Interceptors for netkit requests.
//!
//! Interceptors observe and adjust every attempt of a call. Each has three
//! optional hooks:
//! - [`Interceptor::prepare`]: rewrite the outgoing request, or abort the call
//! - [`Interceptor::will_send`]: observe the final request
//! - [`Interceptor::did_receive`]: observe the response
//!
//! Hooks of every kind run in registration order.
//!
//! # Example
//!
//! ```ignore
//! use netkit_client::{HeaderInterceptor, LoggingInterceptor, NetworkService};
//!
//! let service = NetworkService::builder("https://api.example.com")
//!     .interceptor(HeaderInterceptor::new("authorization", "Bearer token123")?)
//!     .interceptor(LoggingInterceptor::new())
//!     .build()?;
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::{HeaderName, HeaderValue};
use netkit_core::{WireRequest, WireResponse};

use crate::error::InterceptError;

/// Observes and adjusts request attempts.
///
/// Every hook defaults to a no-op.
pub trait Interceptor: Send + Sync {
    /// Rewrite the request before it is sent.
    ///
    /// Returning an error aborts the call without reaching the transport.
    fn prepare(&self, request: &mut WireRequest) -> Result<(), InterceptError> {
        let _ = request;
        Ok(())
    }

    /// Called with the final request right before the transport call.
    fn will_send(&self, request: &WireRequest) {
        let _ = request;
    }

    /// Called when the transport produced a response, whatever its status.
    fn did_receive(&self, request: &WireRequest, response: &WireResponse) {
        let _ = (request, response);
    }
}

impl<T: Interceptor + ?Sized> Interceptor for Arc<T> {
    fn prepare(&self, request: &mut WireRequest) -> Result<(), InterceptError> {
        (**self).prepare(request)
    }

    fn will_send(&self, request: &WireRequest) {
        (**self).will_send(request)
    }

    fn did_receive(&self, request: &WireRequest, response: &WireResponse) {
        (**self).did_receive(request, response)
    }
}

/// An ordered list of interceptors.
#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("count", &self.interceptors.len())
            .finish()
    }
}

impl InterceptorChain {
    /// Create a new empty interceptor chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an interceptor to the end of the chain.
    pub fn push(&mut self, interceptor: Arc<dyn Interceptor>) {
        self.interceptors.push(interceptor);
    }

    /// Check if the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Get the number of interceptors in the chain.
    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    /// Run every `prepare` hook in order, stopping at the first error.
    pub fn prepare(&self, request: &mut WireRequest) -> Result<(), InterceptError> {
        for interceptor in &self.interceptors {
            interceptor.prepare(request)?;
        }
        Ok(())
    }

    /// Run every `will_send` hook in order.
    pub fn will_send(&self, request: &WireRequest) {
        for interceptor in &self.interceptors {
            interceptor.will_send(request);
        }
    }

    /// Run every `did_receive` hook in order.
    pub fn did_receive(&self, request: &WireRequest, response: &WireResponse) {
        for interceptor in &self.interceptors {
            interceptor.did_receive(request, response);
        }
    }
}

/// Adds a fixed header to every request.
#[derive(Clone, Debug)]
pub struct HeaderInterceptor {
    name: HeaderName,
    value: HeaderValue,
}

impl HeaderInterceptor {
    /// Create a header interceptor, returning an error if the name or value is invalid.
    pub fn new(name: &str, value: &str) -> Result<Self, InterceptError> {
        let name = name
            .parse()
            .map_err(|_| InterceptError::new("header", format!("invalid header name: {}", name)))?;
        let value = value
            .parse()
            .map_err(|_| InterceptError::new("header", format!("invalid header value: {}", value)))?;
        Ok(Self { name, value })
    }

    /// Create a new header interceptor from pre-parsed values.
    pub fn from_parts(name: HeaderName, value: HeaderValue) -> Self {
        Self { name, value }
    }
}

impl Interceptor for HeaderInterceptor {
    fn prepare(&self, request: &mut WireRequest) -> Result<(), InterceptError> {
        request.headers.insert(self.name.clone(), self.value.clone());
        Ok(())
    }
}

/// Adapts a closure to the `prepare` hook.
///
/// # Example
///
/// ```
/// use netkit_client::{FnInterceptor, InterceptError};
/// use netkit_core::WireRequest;
///
/// let versioned = FnInterceptor::new(|request: &mut WireRequest| {
///     request.url.query_pairs_mut().append_pair("v", "2");
///     Ok::<_, InterceptError>(())
/// });
/// ```
pub struct FnInterceptor<F> {
    prepare: F,
}

impl<F> FnInterceptor<F>
where
    F: Fn(&mut WireRequest) -> Result<(), InterceptError> + Send + Sync,
{
    /// Create a new interceptor from a closure.
    pub fn new(prepare: F) -> Self {
        Self { prepare }
    }
}

impl<F> fmt::Debug for FnInterceptor<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnInterceptor").finish()
    }
}

impl<F> Interceptor for FnInterceptor<F>
where
    F: Fn(&mut WireRequest) -> Result<(), InterceptError> + Send + Sync,
{
    fn prepare(&self, request: &mut WireRequest) -> Result<(), InterceptError> {
        (self.prepare)(request)
    }
}

/// Whole milliseconds for log fields, saturating at `u64::MAX`.
pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Emits `tracing` events for outgoing requests and received responses.
///
/// Requests and responses are logged at `debug`; headers are added at
/// `trace` when [`LoggingInterceptor::with_headers`] is set.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingInterceptor {
    headers: bool,
}

impl LoggingInterceptor {
    /// Create a logging interceptor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also log request and response headers at `trace`.
    pub fn with_headers(mut self) -> Self {
        self.headers = true;
        self
    }
}

impl Interceptor for LoggingInterceptor {
    fn will_send(&self, request: &WireRequest) {
        tracing::debug!(
            http.method = %request.method,
            url.full = %request.url,
            body_bytes = request.body.as_ref().map_or(0, |b| b.len()),
            timeout_ms = millis(request.timeout),
            "sending request"
        );
        if self.headers {
            tracing::trace!(headers = ?request.headers, "request headers");
        }
    }

    fn did_receive(&self, request: &WireRequest, response: &WireResponse) {
        tracing::debug!(
            http.method = %request.method,
            url.full = %request.url,
            http.status = response.status,
            body_bytes = response.body.len(),
            "received response"
        );
        if self.headers {
            tracing::trace!(headers = ?response.headers, "response headers");
        }
    }
}
