//! HTTP transport layer.
//!
//! A [`Transport`] executes one [`WireRequest`] and either returns the
//! response, whatever its status, or a [`TransportError`] saying why no
//! response arrived. Retries, validation and decoding happen above it.
//!
//! [`HyperTransport`] is the default implementation, built on hyper_util's
//! legacy client with rustls:
//!
//! - HTTP/1.1 and HTTP/2 with automatic protocol negotiation
//! - TLS with rustls (feature-gated)
//! - Connection pooling
//!
//! # Feature Flags
//!
//! - `tls` (default) - Enables `tls-ring` + `tls-native-roots` for convenience
//! - `tls-ring` / `tls-aws-lc` - Crypto providers
//! - `tls-native-roots` / `tls-webpki-roots` - Root certificates
//!
//! # Example
//!
//! ```ignore
//! use netkit_client::transport::HyperTransport;
//! use std::time::Duration;
//!
//! let transport = HyperTransport::builder()
//!     .pool_idle_timeout(Duration::from_secs(60))
//!     .build()?;
//! ```

mod connector;
mod hyper;

use std::sync::Arc;

use futures::future::BoxFuture;
use netkit_core::{TransportError, WireRequest, WireResponse};

pub use self::connector::{build_https_connector, default_tls_config, has_tls_support};
pub use self::hyper::{HyperTransport, HyperTransportBuilder, TransportBuildError};

/// Executes wire requests.
///
/// Implementations must enforce [`WireRequest::timeout`] and report its
/// expiry as [`TransportErrorKind::TimedOut`](netkit_core::TransportErrorKind::TimedOut).
/// Dropping the returned future must abandon the exchange.
pub trait Transport: Send + Sync {
    /// Send `request` and collect the full response.
    fn execute(&self, request: WireRequest) -> BoxFuture<'_, Result<WireResponse, TransportError>>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn execute(&self, request: WireRequest) -> BoxFuture<'_, Result<WireResponse, TransportError>> {
        (**self).execute(request)
    }
}
