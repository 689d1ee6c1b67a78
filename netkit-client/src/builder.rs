//! Service builder.
//!
//! Provides a fluent API for configuring and building a [`NetworkService`].

use std::sync::Arc;
use std::time::Duration;

use netkit_core::{BodyDecoder, JsonDecoder, StatusValidator, Url};

use crate::cache::{ETagCache, ETagInterceptor};
use crate::config::{Interceptor, InterceptorChain, RetryPolicy};
use crate::connectivity::{AlwaysOnline, ConnectivityProbe};
use crate::response::{ProcessingStep, ResponsePipeline};
use crate::service::NetworkService;
use crate::transport::{HyperTransport, Transport, TransportBuildError};

/// Builder for creating a [`NetworkService`].
///
/// Every setting has a default: a [`HyperTransport`], no interceptors, the
/// default [`RetryPolicy`], a `200..=299` [`StatusValidator`], JSON decoding,
/// and a probe that always reports online.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use std::time::Duration;
/// use netkit_client::{ETagCache, LoggingInterceptor, NetworkServiceBuilder, RetryPolicy};
///
/// let service = NetworkServiceBuilder::new("https://api.example.com")
///     .interceptor(LoggingInterceptor::new())
///     .etag_cache(Arc::new(ETagCache::default()))
///     .retry_policy(RetryPolicy::aggressive())
///     .timeout(Duration::from_secs(10))
///     .build()?;
/// ```
pub struct NetworkServiceBuilder<D = JsonDecoder> {
    /// Base URL every endpoint path is resolved against.
    base_url: String,
    /// Transport; a `HyperTransport` is built when unset.
    transport: Option<Arc<dyn Transport>>,
    interceptors: InterceptorChain,
    retry_policy: RetryPolicy,
    validator: StatusValidator,
    /// Extra steps, run after status validation.
    steps: Vec<Arc<dyn ProcessingStep>>,
    decoder: D,
    connectivity: Arc<dyn ConnectivityProbe>,
    /// Default per-request timeout.
    default_timeout: Option<Duration>,
}

impl<D> std::fmt::Debug for NetworkServiceBuilder<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkServiceBuilder")
            .field("base_url", &self.base_url)
            .field("transport", &self.transport.is_some())
            .field("interceptors", &self.interceptors.len())
            .field("retry_policy", &self.retry_policy)
            .field("validator", &self.validator)
            .field("steps", &self.steps.len())
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}

impl NetworkServiceBuilder<JsonDecoder> {
    /// Create a new builder with the given base URL.
    ///
    /// The base URL should include the scheme and host, e.g. `"https://api.example.com/v1"`.
    pub fn new<S: Into<String>>(base_url: S) -> Self {
        Self {
            base_url: base_url.into(),
            transport: None,
            interceptors: InterceptorChain::new(),
            retry_policy: RetryPolicy::default(),
            validator: StatusValidator::default(),
            steps: Vec::new(),
            decoder: JsonDecoder,
            connectivity: Arc::new(AlwaysOnline),
            default_timeout: None,
        }
    }
}

impl<D: BodyDecoder> NetworkServiceBuilder<D> {
    /// Use a custom transport.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Append an interceptor. Interceptors run in the order they are added.
    pub fn interceptor(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Enable conditional requests backed by `cache`.
    ///
    /// Registers an [`ETagInterceptor`] at the current position in the
    /// interceptor chain.
    pub fn etag_cache(self, cache: Arc<ETagCache>) -> Self {
        self.interceptor(ETagInterceptor::new(cache))
    }

    /// Set the retry policy.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Set the status validator. It always runs before other steps.
    pub fn validator(mut self, validator: StatusValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Append a response processing step.
    pub fn step(mut self, step: impl ProcessingStep + 'static) -> Self {
        self.steps.push(Arc::new(step));
        self
    }

    /// Use a different body decoder.
    pub fn decoder<D2: BodyDecoder>(self, decoder: D2) -> NetworkServiceBuilder<D2> {
        NetworkServiceBuilder {
            base_url: self.base_url,
            transport: self.transport,
            interceptors: self.interceptors,
            retry_policy: self.retry_policy,
            validator: self.validator,
            steps: self.steps,
            decoder,
            connectivity: self.connectivity,
            default_timeout: self.default_timeout,
        }
    }

    /// Set the connectivity probe consulted before each attempt.
    pub fn connectivity(mut self, probe: Arc<dyn ConnectivityProbe>) -> Self {
        self.connectivity = probe;
        self
    }

    /// Set the default per-request timeout.
    ///
    /// Endpoints that declare their own timeout keep it.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Build the service.
    pub fn build(self) -> Result<NetworkService<D>, ServiceBuildError> {
        let base_url = Url::parse(&self.base_url).map_err(|e| ServiceBuildError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() || base_url.host_str().is_none() {
            return Err(ServiceBuildError::InvalidBaseUrl {
                url: self.base_url,
                reason: "expected an absolute URL with a host".to_string(),
            });
        }

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HyperTransport::new()?),
        };

        let mut steps: Vec<Arc<dyn ProcessingStep>> = Vec::with_capacity(self.steps.len() + 1);
        steps.push(Arc::new(self.validator));
        steps.extend(self.steps);

        Ok(NetworkService::new(
            base_url,
            self.default_timeout,
            transport,
            self.interceptors,
            Arc::new(self.retry_policy),
            ResponsePipeline::with_steps(self.decoder, steps),
            self.connectivity,
        ))
    }
}

/// Error building a [`NetworkService`].
#[derive(Debug, thiserror::Error)]
pub enum ServiceBuildError {
    /// The base URL is not an absolute URL with a host.
    #[error("invalid base URL `{url}`: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// The default transport could not be built.
    #[error("failed to create transport: {0}")]
    Transport(#[from] TransportBuildError),
}
