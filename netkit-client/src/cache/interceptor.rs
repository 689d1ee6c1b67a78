use std::sync::Arc;

use http::header::IF_NONE_MATCH;
use http::{HeaderValue, Method};
use netkit_core::{CachePolicy, WireRequest, WireResponse};

use super::store::ETagCache;
use crate::config::Interceptor;
use crate::error::InterceptError;

/// Adds conditional-request headers from an [`ETagCache`] and records the
/// validators servers hand back.
///
/// Only `GET` and `HEAD` requests get conditional headers, and they also
/// switch to [`CachePolicy::ReloadIgnoringLocalCache`] so a transport-level
/// cache does not answer instead of the origin. Any 2xx or 3xx response that
/// carries an `ETag` is recorded, whatever the method.
#[derive(Clone, Debug)]
pub struct ETagInterceptor {
    cache: Arc<ETagCache>,
}

impl ETagInterceptor {
    /// Create an interceptor backed by `cache`.
    pub fn new(cache: Arc<ETagCache>) -> Self {
        Self { cache }
    }

    /// The backing cache.
    pub fn cache(&self) -> &Arc<ETagCache> {
        &self.cache
    }

    fn applies_to(method: &Method) -> bool {
        *method == Method::GET || *method == Method::HEAD
    }
}

impl Interceptor for ETagInterceptor {
    fn prepare(&self, request: &mut WireRequest) -> Result<(), InterceptError> {
        if !Self::applies_to(&request.method) {
            return Ok(());
        }
        request.cache_policy = CachePolicy::ReloadIgnoringLocalCache;

        let Some(etag) = self.cache.get(request.url.as_str()) else {
            return Ok(());
        };
        match HeaderValue::from_str(&etag) {
            Ok(value) => {
                request.headers.insert(IF_NONE_MATCH, value);
            }
            Err(_) => {
                // Unusable validator; drop it so the next response can replace it.
                tracing::debug!(url.full = %request.url, "discarding invalid cached etag");
                self.cache.remove(request.url.as_str());
            }
        }
        Ok(())
    }

    fn did_receive(&self, request: &WireRequest, response: &WireResponse) {
        if !(200..400).contains(&response.status) {
            return;
        }
        if let Some(etag) = response.etag() {
            self.cache.set(request.url.as_str(), etag);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ETagCacheConfig;
    use http::HeaderMap;
    use http::header::ETAG;
    use netkit_core::Url;

    fn url() -> Url {
        Url::parse("https://api.example.com/items").unwrap()
    }

    fn response(status: u16, etag: Option<&str>) -> WireResponse {
        let mut headers = HeaderMap::new();
        if let Some(etag) = etag {
            headers.insert(ETAG, HeaderValue::from_str(etag).unwrap());
        }
        WireResponse::new(status, headers, "")
    }

    fn interceptor() -> ETagInterceptor {
        ETagInterceptor::new(Arc::new(ETagCache::default()))
    }

    #[test]
    fn test_attaches_if_none_match() {
        let interceptor = interceptor();
        interceptor.cache().set(url().as_str(), "\"v1\"");

        let mut request = WireRequest::get(url());
        interceptor.prepare(&mut request).unwrap();

        assert_eq!(request.headers.get(IF_NONE_MATCH).unwrap(), "\"v1\"");
        assert_eq!(request.cache_policy, CachePolicy::ReloadIgnoringLocalCache);
    }

    #[test]
    fn test_miss_leaves_headers_alone() {
        let interceptor = interceptor();
        let mut request = WireRequest::get(url());
        interceptor.prepare(&mut request).unwrap();
        assert!(request.headers.get(IF_NONE_MATCH).is_none());
        assert_eq!(request.cache_policy, CachePolicy::ReloadIgnoringLocalCache);
    }

    #[test]
    fn test_unsafe_methods_send_unconditionally() {
        let interceptor = interceptor();
        interceptor.cache().set(url().as_str(), "\"v1\"");

        let mut request = WireRequest::new(Method::POST, url());
        interceptor.prepare(&mut request).unwrap();
        assert!(request.headers.get(IF_NONE_MATCH).is_none());
        assert_eq!(request.cache_policy, CachePolicy::UseProtocolCache);

        // The validator a POST hands back still refreshes the entry.
        interceptor.did_receive(&request, &response(200, Some("\"v2\"")));
        assert_eq!(interceptor.cache().peek(url().as_str()).as_deref(), Some("\"v2\""));
    }

    #[test]
    fn test_records_etag_for_any_method() {
        let interceptor = interceptor();
        let request = WireRequest::new(Method::PUT, url());

        interceptor.did_receive(&request, &response(201, Some("\"p1\"")));
        assert_eq!(interceptor.cache().peek(url().as_str()).as_deref(), Some("\"p1\""));

        let mut next = WireRequest::get(url());
        interceptor.prepare(&mut next).unwrap();
        assert_eq!(next.headers.get(IF_NONE_MATCH).unwrap(), "\"p1\"");
    }

    #[test]
    fn test_records_etag_from_response() {
        let interceptor = interceptor();
        let request = WireRequest::get(url());

        interceptor.did_receive(&request, &response(200, Some("\"v7\"")));
        assert_eq!(interceptor.cache().peek(url().as_str()).as_deref(), Some("\"v7\""));

        // 304 keeps the validator current.
        interceptor.did_receive(&request, &response(304, Some("\"v8\"")));
        assert_eq!(interceptor.cache().peek(url().as_str()).as_deref(), Some("\"v8\""));
    }

    #[test]
    fn test_ignores_error_and_tagless_responses() {
        let interceptor = interceptor();
        let request = WireRequest::get(url());

        interceptor.did_receive(&request, &response(500, Some("\"bad\"")));
        interceptor.did_receive(&request, &response(200, None));
        interceptor.did_receive(&request, &response(200, Some("")));
        assert!(interceptor.cache().is_empty());
    }

    #[test]
    fn test_shared_cache_across_interceptors() {
        let cache = Arc::new(ETagCache::new(ETagCacheConfig::with_max_size(8)).unwrap());
        let writer = ETagInterceptor::new(cache.clone());
        let reader = ETagInterceptor::new(cache);

        writer.did_receive(&WireRequest::get(url()), &response(200, Some("W/\"1\"")));

        let mut request = WireRequest::get(url());
        reader.prepare(&mut request).unwrap();
        assert_eq!(request.headers.get(IF_NONE_MATCH).unwrap(), "W/\"1\"");
    }
}
