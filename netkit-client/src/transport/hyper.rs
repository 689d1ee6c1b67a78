//! Hyper-based HTTP transport.
//!
//! This module provides [`HyperTransport`], the default [`Transport`]
//! implementation using hyper_util's legacy client.

use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use http_body_util::{BodyExt, Full};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use hyper_util::rt::{TokioExecutor, TokioTimer};
use netkit_core::{TransportError, TransportErrorKind, WireRequest, WireResponse};
use rustls::ClientConfig;

use super::Transport;
use super::connector::{build_https_connector, default_tls_config};

/// Type alias for the hyper client with HTTPS connector.
type HyperClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// The transport could not be constructed.
#[derive(Debug, thiserror::Error)]
pub enum TransportBuildError {
    /// No TLS configuration was given and none could be built from the
    /// enabled features.
    #[error(
        "HTTPS requires a crypto provider and root certificates: enable the `tls` feature, \
         install a global provider with `CryptoProvider::install_default()`, \
         or pass a config to `HyperTransportBuilder::tls_config`"
    )]
    NoTlsConfig,
}

/// HTTP transport using hyper_util's legacy client.
///
/// Supports HTTP/1.1 and HTTP/2 with TLS, connection pooling and protocol
/// negotiation via ALPN. Plain `http://` URLs are also accepted.
///
/// The transport has no response cache of its own, so
/// [`CachePolicy`](netkit_core::CachePolicy) has no effect here.
///
/// # Example
///
/// ```ignore
/// use netkit_client::{NetworkService, transport::HyperTransport};
///
/// let transport = HyperTransport::builder()
///     .pool_max_idle_per_host(8)
///     .build()?;
///
/// let service = NetworkService::builder("https://api.example.com")
///     .transport(transport)
///     .build()?;
/// ```
#[derive(Clone)]
pub struct HyperTransport {
    client: HyperClient,
    /// Whether HTTP/2 only mode is enabled.
    http2_only: bool,
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport")
            .field("http2_only", &self.http2_only)
            .finish_non_exhaustive()
    }
}

impl HyperTransport {
    /// Create a new transport builder.
    pub fn builder() -> HyperTransportBuilder {
        HyperTransportBuilder::new()
    }

    /// Create a new transport with default settings.
    pub fn new() -> Result<Self, TransportBuildError> {
        Self::builder().build()
    }

    /// Check if this transport is configured for HTTP/2 only.
    pub fn is_http2_only(&self) -> bool {
        self.http2_only
    }

    async fn exchange(&self, request: http::Request<Full<Bytes>>) -> Result<WireResponse, TransportError> {
        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| transport_error("request failed", &e))?;
        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| transport_error("reading body failed", &e))?
            .to_bytes();
        Ok(WireResponse::new(parts.status.as_u16(), parts.headers, body))
    }
}

impl Transport for HyperTransport {
    fn execute(&self, request: WireRequest) -> BoxFuture<'_, Result<WireResponse, TransportError>> {
        Box::pin(async move {
            let timeout = request.timeout;
            let http_request = into_http_request(request)?;
            match tokio::time::timeout(timeout, self.exchange(http_request)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::timed_out(format!(
                    "no response within {}ms",
                    timeout.as_millis()
                ))),
            }
        })
    }
}

fn into_http_request(request: WireRequest) -> Result<http::Request<Full<Bytes>>, TransportError> {
    let mut http_request = http::Request::builder()
        .method(request.method)
        .uri(request.url.as_str())
        .body(Full::new(request.body.unwrap_or_default()))
        .map_err(|e| TransportError::new(TransportErrorKind::InvalidRequest, e.to_string()))?;
    *http_request.headers_mut() = request.headers;
    Ok(http_request)
}

fn transport_error(context: &str, err: &(dyn StdError + 'static)) -> TransportError {
    let mut message = format!("{}: {}", context, err);
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    TransportError::new(classify(err), message)
}

/// Classify a hyper failure by walking its source chain.
fn classify(err: &(dyn StdError + 'static)) -> TransportErrorKind {
    let mut connect = false;
    let mut current = Some(err);
    while let Some(err) = current {
        if let Some(client_err) = err.downcast_ref::<hyper_util::client::legacy::Error>() {
            connect |= client_err.is_connect();
        }
        if err.downcast_ref::<rustls::Error>().is_some() {
            return TransportErrorKind::Tls;
        }
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            if let Some(kind) = classify_io(io_err) {
                return kind;
            }
        }
        if let Some(hyper_err) = err.downcast_ref::<hyper::Error>() {
            if hyper_err.is_timeout() {
                return TransportErrorKind::TimedOut;
            }
            if hyper_err.is_incomplete_message() || hyper_err.is_closed() || hyper_err.is_canceled() {
                return TransportErrorKind::ConnectionLost;
            }
        }
        let text = err.to_string().to_ascii_lowercase();
        if text.contains("dns error") || text.contains("failed to lookup address") {
            return TransportErrorKind::DnsFailure;
        }
        current = err.source();
    }
    if connect {
        TransportErrorKind::HostUnreachable
    } else {
        TransportErrorKind::Other
    }
}

fn classify_io(err: &io::Error) -> Option<TransportErrorKind> {
    if let Some(inner) = err.get_ref() {
        if inner.downcast_ref::<rustls::Error>().is_some() {
            return Some(TransportErrorKind::Tls);
        }
    }
    match err.kind() {
        io::ErrorKind::TimedOut => Some(TransportErrorKind::TimedOut),
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::HostUnreachable
        | io::ErrorKind::NetworkUnreachable
        | io::ErrorKind::AddrNotAvailable => Some(TransportErrorKind::HostUnreachable),
        io::ErrorKind::NetworkDown => Some(TransportErrorKind::Offline),
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof
        | io::ErrorKind::NotConnected => Some(TransportErrorKind::ConnectionLost),
        _ => None,
    }
}

/// Builder for [`HyperTransport`].
///
/// # Example
///
/// ```ignore
/// use netkit_client::transport::HyperTransportBuilder;
/// use std::time::Duration;
///
/// let transport = HyperTransportBuilder::new()
///     .http2_only(true)
///     .pool_idle_timeout(Duration::from_secs(90))
///     .build()?;
/// ```
pub struct HyperTransportBuilder {
    /// Custom TLS configuration.
    tls_config: Option<ClientConfig>,
    /// Force HTTP/2 only.
    http2_only: bool,
    /// Connection pool idle timeout.
    pool_idle_timeout: Option<Duration>,
    /// Maximum idle connections per host.
    pool_max_idle_per_host: usize,
}

impl Default for HyperTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HyperTransportBuilder {
    /// Create a new transport builder with default settings.
    pub fn new() -> Self {
        Self {
            tls_config: None,
            http2_only: false,
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 32,
        }
    }

    /// Set a custom TLS configuration.
    pub fn tls_config(mut self, config: ClientConfig) -> Self {
        self.tls_config = Some(config);
        self
    }

    /// Enable HTTP/2 only mode.
    ///
    /// Over plain `http://` this means h2c with prior knowledge.
    pub fn http2_only(mut self, enabled: bool) -> Self {
        self.http2_only = enabled;
        self
    }

    /// Set the connection pool idle timeout.
    ///
    /// Default: 90 seconds.
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = Some(timeout);
        self
    }

    /// Keep idle connections open indefinitely.
    pub fn pool_idle_timeout_none(mut self) -> Self {
        self.pool_idle_timeout = None;
        self
    }

    /// Set the maximum number of idle connections per host.
    ///
    /// Default: 32.
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    /// Build the transport.
    pub fn build(self) -> Result<HyperTransport, TransportBuildError> {
        let tls_config = match self.tls_config {
            Some(config) => config,
            None => default_tls_config().ok_or(TransportBuildError::NoTlsConfig)?,
        };
        let https_connector = build_https_connector(tls_config);

        let mut builder = Client::builder(TokioExecutor::new());

        // Required for pool_idle_timeout to take effect.
        builder.pool_timer(TokioTimer::new());

        if let Some(timeout) = self.pool_idle_timeout {
            builder.pool_idle_timeout(timeout);
        }
        builder.pool_max_idle_per_host(self.pool_max_idle_per_host);

        if self.http2_only {
            builder.http2_only(true);
        }

        Ok(HyperTransport {
            client: builder.build(https_connector),
            http2_only: self.http2_only,
        })
    }
}

impl std::fmt::Debug for HyperTransportBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransportBuilder")
            .field("tls_config", &self.tls_config.is_some())
            .field("http2_only", &self.http2_only)
            .field("pool_idle_timeout", &self.pool_idle_timeout)
            .field("pool_max_idle_per_host", &self.pool_max_idle_per_host)
            .finish()
    }
}
