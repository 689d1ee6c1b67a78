//! HTTP request orchestration for Rust.
//!
//! This crate turns declared endpoints into HTTP exchanges and gives every
//! failure a single, structured shape.
//!
//! ## Features
//!
//! - Declarative endpoints: path, query, header and JSON body parameters
//! - Retries with exponential backoff, jitter and an ordered rule chain
//! - Interceptors that rewrite requests and observe responses
//! - ETag revalidation backed by a bounded LRU cache
//! - Per-attempt status validation and a pluggable body decoder
//! - A closed error taxonomy ([`NetworkError`]) for everything that went wrong
//!
//! ## Example
//!
//! ```ignore
//! use netkit_client::{Endpoint, NetworkService, Path, RequestParameter};
//! use http::Method;
//!
//! #[derive(serde::Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! struct GetUser {
//!     id: Path<u64>,
//! }
//!
//! impl Endpoint for GetUser {
//!     type Output = User;
//!
//!     fn method(&self) -> Method {
//!         Method::GET
//!     }
//!
//!     fn path(&self) -> &str {
//!         "/users/{id}"
//!     }
//!
//!     fn parameters(&self) -> Vec<(&'static str, &dyn RequestParameter)> {
//!         vec![("id", &self.id)]
//!     }
//! }
//!
//! let service = NetworkService::builder("https://api.example.com").build()?;
//! let user = service.send(&GetUser { id: Path(7) }).await?;
//! println!("User: {}", user.name);
//! ```
//!
//! ## Retry Logic
//!
//! A failed attempt is mapped to a [`NetworkError`] and handed to the
//! [`RetryPolicy`]. Its rules are consulted in order and the first one with an
//! opinion wins:
//!
//! 1. [`ConnectivityRule`]: retry lost connections, timeouts, DNS failures,
//!    unreachable hosts and offline attempts
//! 2. [`ServerErrorRule`]: retry 5xx responses, refuse other HTTP errors
//!
//! Decoding failures are never retried. Delays grow as
//! `base_delay * 2^(attempt - 1)`, are clamped to `max_delay`, then get a
//! random jitter of 10% to 30% on top.
//!
//! ```ignore
//! use netkit_client::{FnRule, RetryPolicy, RuleVerdict};
//!
//! // Default: 3 retries, 1s base delay, 30s max delay
//! let default = RetryPolicy::default();
//!
//! // Also retry rate limiting
//! let policy = RetryPolicy::default().prepend_rule(FnRule::new(|err| match err.status() {
//!     Some(429) => RuleVerdict::Retry,
//!     _ => RuleVerdict::Pass,
//! }));
//! ```
//!
//! ## Conditional Requests
//!
//! ```ignore
//! use std::sync::Arc;
//! use netkit_client::{ETagCache, NetworkService, StatusValidator};
//!
//! let service = NetworkService::builder("https://api.example.com")
//!     .etag_cache(Arc::new(ETagCache::default()))
//!     // accept 304 Not Modified
//!     .validator(StatusValidator::lenient())
//!     .build()?;
//! ```
//!
//! ## Observability
//!
//! Every call runs inside a `netkit.request` span carrying `http.method` and
//! `url.full`. Scheduled retries are logged at `debug`, terminal failures at
//! `warn`. Add [`LoggingInterceptor`] for per-attempt request and response
//! events.
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `tls` (default) | `tls-ring` + `tls-native-roots` |
//! | `tls-ring` / `tls-aws-lc` | rustls crypto provider |
//! | `tls-native-roots` / `tls-webpki-roots` | root certificate source |

mod builder;
pub mod cache;
pub mod config;
mod connectivity;
mod error;
pub mod request;
pub mod response;
mod service;
pub mod transport;

pub use builder::{NetworkServiceBuilder, ServiceBuildError};
pub use error::{BuildError, CallError, InterceptError};
pub use service::NetworkService;

// Re-export from cache module
pub use cache::{CacheConfigError, CacheStats, ETagCache, ETagCacheConfig, ETagInterceptor};

// Re-export from config module
pub use config::{
    ConnectivityRule, FnInterceptor, FnRule, HeaderInterceptor, Interceptor, InterceptorChain,
    JitterRange, LoggingInterceptor, RetryConfigError, RetryConfiguration, RetryDecision,
    RetryPolicy, RetryRule, RuleVerdict, ServerErrorRule, default_rules,
};

pub use connectivity::{AlwaysOnline, Connectivity, ConnectivityProbe, SharedConnectivity};

// Re-export from request module
pub use request::{Endpoint, Header, JsonBody, Path, Query, RequestParameter, RequestParts};

// Re-export from response module
pub use response::{ProcessingStep, ResponsePipeline};

// Re-export transport types at the top level for convenience
pub use transport::{HyperTransport, HyperTransportBuilder, Transport, TransportBuildError};

// Re-export core types that users need
pub use netkit_core::{
    BodyDecoder, CachePolicy, DecodeError, ErrorMapper, JsonDecoder, NetworkError, NoContent,
    StatusError, StatusErrorKind, StatusValidator, TransportError, TransportErrorKind, WireRequest,
    WireResponse,
};

pub use bytes::Bytes;
