//! The request orchestrator.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use netkit_core::{
    BodyDecoder, ErrorMapper, JsonDecoder, NetworkError, TransportError, Url, WireRequest,
    WireResponse,
};
use serde::de::DeserializeOwned;
use tracing::Instrument;

use crate::builder::NetworkServiceBuilder;
use crate::config::{InterceptorChain, RetryDecision, RetryPolicy, millis};
use crate::connectivity::ConnectivityProbe;
use crate::error::{BuildError, CallError};
use crate::request::{Endpoint, RequestParts};
use crate::response::ResponsePipeline;
use crate::transport::Transport;

/// Sends requests with retries, interceptors and response processing.
///
/// Each call runs this attempt loop:
///
/// 1. Clone the built request and run every interceptor's `prepare` hook.
///    A failure here ends the call with [`CallError::Intercept`].
/// 2. Run `will_send` hooks, then consult the connectivity probe. When
///    offline the attempt fails without calling the transport.
/// 3. On a response, run `did_receive` hooks and the pipeline's validation
///    steps. A rejected response is a failed attempt like any other.
/// 4. Map the failure to a [`NetworkError`]. Once the retry budget is spent
///    it is surfaced; otherwise the [`RetryPolicy`] decides whether to sleep
///    and retry, retry at once, or surface it.
///
/// The body is decoded exactly once, from the response that ended the loop.
/// Dropping the returned future cancels the in-flight attempt or backoff
/// sleep; nothing runs afterwards.
///
/// # Example
///
/// ```ignore
/// use netkit_client::NetworkService;
///
/// let service = NetworkService::builder("https://api.example.com").build()?;
/// let user = service.send(&GetUser { id: Path(7) }).await?;
/// ```
pub struct NetworkService<D = JsonDecoder> {
    base_url: Url,
    default_timeout: Option<Duration>,
    transport: Arc<dyn Transport>,
    interceptors: InterceptorChain,
    retry_policy: Arc<RetryPolicy>,
    pipeline: ResponsePipeline<D>,
    connectivity: Arc<dyn ConnectivityProbe>,
}

impl<D: Clone> Clone for NetworkService<D> {
    fn clone(&self) -> Self {
        Self {
            base_url: self.base_url.clone(),
            default_timeout: self.default_timeout,
            transport: self.transport.clone(),
            interceptors: self.interceptors.clone(),
            retry_policy: self.retry_policy.clone(),
            pipeline: self.pipeline.clone(),
            connectivity: self.connectivity.clone(),
        }
    }
}

impl<D> fmt::Debug for NetworkService<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkService")
            .field("base_url", &self.base_url.as_str())
            .field("default_timeout", &self.default_timeout)
            .field("interceptors", &self.interceptors)
            .field("retry_policy", &self.retry_policy)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

impl NetworkService<JsonDecoder> {
    /// Create a new builder with the given base URL.
    ///
    /// Equivalent to `NetworkServiceBuilder::new(base_url)`.
    pub fn builder<S: Into<String>>(base_url: S) -> NetworkServiceBuilder<JsonDecoder> {
        NetworkServiceBuilder::new(base_url)
    }
}

impl<D: BodyDecoder> NetworkService<D> {
    /// Called by [`NetworkServiceBuilder::build`].
    pub(crate) fn new(
        base_url: Url,
        default_timeout: Option<Duration>,
        transport: Arc<dyn Transport>,
        interceptors: InterceptorChain,
        retry_policy: Arc<RetryPolicy>,
        pipeline: ResponsePipeline<D>,
        connectivity: Arc<dyn ConnectivityProbe>,
    ) -> Self {
        Self {
            base_url,
            default_timeout,
            transport,
            interceptors,
            retry_policy,
            pipeline,
            connectivity,
        }
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Get the retry policy.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Get the response pipeline.
    pub fn pipeline(&self) -> &ResponsePipeline<D> {
        &self.pipeline
    }

    /// Build the wire request for `endpoint` without sending it.
    pub fn request<E: Endpoint + ?Sized>(&self, endpoint: &E) -> Result<WireRequest, BuildError> {
        RequestParts::build(&self.base_url, endpoint, self.default_timeout)
    }

    /// Send `endpoint` and decode its response.
    pub async fn send<E: Endpoint + ?Sized>(&self, endpoint: &E) -> Result<E::Output, CallError> {
        let request = self.request(endpoint)?;
        self.execute(request).await
    }

    /// Send `endpoint` and return the validated response undecoded.
    pub async fn send_raw<E: Endpoint + ?Sized>(&self, endpoint: &E) -> Result<WireResponse, CallError> {
        let request = self.request(endpoint)?;
        self.execute_raw(request).await
    }

    /// Send a prebuilt request and decode its response.
    pub async fn execute<T>(&self, request: WireRequest) -> Result<T, CallError>
    where
        T: DeserializeOwned + 'static,
    {
        let response = self.execute_raw(request).await?;
        match self.pipeline.decode(&response) {
            Ok(value) => Ok(value),
            Err(err) => {
                tracing::warn!(http.status = response.status, error = %err, "response decoding failed");
                Err(err.into())
            }
        }
    }

    /// Send a prebuilt request and return the validated response undecoded.
    pub async fn execute_raw(&self, request: WireRequest) -> Result<WireResponse, CallError> {
        let span = tracing::info_span!(
            "netkit.request",
            http.method = %request.method,
            url.full = %request.url,
            otel.kind = "client",
        );
        self.run(request).instrument(span).await
    }

    async fn run(&self, request: WireRequest) -> Result<WireResponse, CallError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;

            let mut prepared = request.clone();
            if let Err(err) = self.interceptors.prepare(&mut prepared) {
                tracing::warn!(attempt, error = %err, "request rejected by interceptor");
                return Err(err.into());
            }
            self.interceptors.will_send(&prepared);

            let error = match self.attempt(&prepared).await {
                Ok(response) => {
                    self.interceptors.did_receive(&prepared, &response);
                    match self.pipeline.validate(response) {
                        Ok(response) => return Ok(response),
                        Err(err) => err,
                    }
                }
                Err(err) => ErrorMapper::map(err),
            };

            if attempt > self.retry_policy.max_retries() {
                return Err(self.fail(error, attempt));
            }

            match self.retry_policy.decide(&error, attempt) {
                RetryDecision::RetryAfter(delay) => {
                    tracing::debug!(
                        attempt,
                        delay_ms = millis(delay),
                        error = %error,
                        "retrying request"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::RetryImmediately => {
                    tracing::debug!(attempt, error = %error, "retrying request immediately");
                }
                RetryDecision::Stop => return Err(self.fail(error, attempt)),
            }
        }
    }

    /// One transport exchange, gated on connectivity.
    async fn attempt(&self, request: &WireRequest) -> Result<WireResponse, TransportError> {
        if self.connectivity.status().is_offline() {
            return Err(TransportError::offline());
        }
        self.transport.execute(request.clone()).await
    }

    fn fail(&self, error: NetworkError, attempts: u32) -> CallError {
        tracing::warn!(
            attempts,
            retryable = error.is_retryable(),
            error = %error,
            "request failed"
        );
        error.into()
    }
}
