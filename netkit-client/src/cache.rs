//! ETag-based conditional requests.
//!
//! [`ETagCache`] remembers the last validator seen per URL and
//! [`ETagInterceptor`] wires it into the request path: cached validators go
//! out as `If-None-Match`, fresh ones are recorded from responses.

mod interceptor;
mod store;

pub use interceptor::ETagInterceptor;
pub use store::{CacheConfigError, CacheStats, ETagCache, ETagCacheConfig, defaults};
