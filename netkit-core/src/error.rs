//! Error types and the error mapper.
//!
//! This module provides:
//! - [`TransportError`]: what a transport reports when no response arrived
//! - [`DecodeError`]: what a body decoder reports
//! - [`NetworkError`]: the closed taxonomy every failure is normalized into
//! - [`ErrorMapper`]: the total, pure mapping from [`RawError`] to [`NetworkError`]

use std::fmt;

use bytes::Bytes;

use crate::status::StatusError;

/// Boxed error for sources the mapper knows nothing about.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Classes of transport failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// The connection dropped mid-exchange (reset, broken pipe, early EOF).
    ConnectionLost,
    /// The request did not complete within its timeout.
    TimedOut,
    /// The host name could not be resolved.
    DnsFailure,
    /// The host refused or could not be reached.
    HostUnreachable,
    /// The device has no network connectivity.
    Offline,
    /// TLS handshake or certificate failure.
    Tls,
    /// The request could not be expressed on the wire.
    InvalidRequest,
    /// Anything else.
    Other,
}

impl TransportErrorKind {
    /// Get the string representation of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportErrorKind::ConnectionLost => "connection_lost",
            TransportErrorKind::TimedOut => "timed_out",
            TransportErrorKind::DnsFailure => "dns_failure",
            TransportErrorKind::HostUnreachable => "host_unreachable",
            TransportErrorKind::Offline => "offline",
            TransportErrorKind::Tls => "tls",
            TransportErrorKind::InvalidRequest => "invalid_request",
            TransportErrorKind::Other => "other",
        }
    }

    /// Whether this is a connectivity condition that may clear up on its own.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportErrorKind::ConnectionLost
                | TransportErrorKind::TimedOut
                | TransportErrorKind::DnsFailure
                | TransportErrorKind::HostUnreachable
                | TransportErrorKind::Offline
        )
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transport-level failure: no response was received.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
}

impl TransportError {
    /// Create a new transport error.
    pub fn new<S: Into<String>>(kind: TransportErrorKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timed_out<S: Into<String>>(message: S) -> Self {
        Self::new(TransportErrorKind::TimedOut, message)
    }

    /// Create a connection-lost error.
    pub fn connection_lost<S: Into<String>>(message: S) -> Self {
        Self::new(TransportErrorKind::ConnectionLost, message)
    }

    /// Create an offline error.
    pub fn offline() -> Self {
        Self::new(TransportErrorKind::Offline, "network is offline")
    }

    /// Get the failure class.
    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    /// Get the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A body could not be decoded into the requested type.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct DecodeError(String);

impl DecodeError {
    /// Create a new decode error.
    pub fn new<S: Into<String>>(detail: S) -> Self {
        Self(detail.into())
    }

    /// Get the failure detail.
    pub fn detail(&self) -> &str {
        &self.0
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError(format!("JSON decoding failed: {}", err))
    }
}

/// The closed error taxonomy surfaced to callers.
///
/// Every failure maps to exactly one variant, and each variant carries
/// enough structure to branch on without string matching.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    /// The server answered with an unacceptable status.
    #[error("HTTP error {status}")]
    Http { status: u16, body: Bytes },

    /// The body did not decode into the requested type.
    #[error("decoding error: {detail}")]
    Decoding { detail: String },

    /// No response was received.
    #[error("connection error ({kind}): {detail}")]
    Connection {
        kind: TransportErrorKind,
        detail: String,
    },

    /// Anything unrecognized.
    #[error("unknown error: {detail}")]
    Unknown { detail: String },
}

impl NetworkError {
    /// Create an HTTP error.
    pub fn http(status: u16, body: impl Into<Bytes>) -> Self {
        NetworkError::Http {
            status,
            body: body.into(),
        }
    }

    /// Create a decoding error.
    pub fn decoding<S: Into<String>>(detail: S) -> Self {
        NetworkError::Decoding {
            detail: detail.into(),
        }
    }

    /// Create a connection error.
    pub fn connection<S: Into<String>>(kind: TransportErrorKind, detail: S) -> Self {
        NetworkError::Connection {
            kind,
            detail: detail.into(),
        }
    }

    /// Create an unknown error.
    pub fn unknown<S: Into<String>>(detail: S) -> Self {
        NetworkError::Unknown {
            detail: detail.into(),
        }
    }

    /// The HTTP status, for `Http` errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            NetworkError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The raw response body, for `Http` errors.
    pub fn body(&self) -> Option<&Bytes> {
        match self {
            NetworkError::Http { body, .. } => Some(body),
            _ => None,
        }
    }

    /// The transport failure class, for `Connection` errors.
    pub fn transport_kind(&self) -> Option<TransportErrorKind> {
        match self {
            NetworkError::Connection { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Returns whether this error kind is generally worth retrying.
    ///
    /// This is informational. Retry decisions during a call are made by the
    /// client's retry rules, which agree with this predicate for the built-in
    /// rule set.
    ///
    /// # Example
    ///
    /// ```
    /// use netkit_core::{NetworkError, TransportErrorKind};
    ///
    /// assert!(NetworkError::http(503, "").is_retryable());
    /// assert!(!NetworkError::http(404, "").is_retryable());
    /// assert!(NetworkError::connection(TransportErrorKind::TimedOut, "slow").is_retryable());
    /// assert!(!NetworkError::decoding("bad json").is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            NetworkError::Http { status, .. } => *status >= 500,
            NetworkError::Connection { .. } => true,
            NetworkError::Decoding { .. } | NetworkError::Unknown { .. } => false,
        }
    }

    /// A message suitable for showing to an end user.
    pub fn user_message(&self) -> String {
        match self {
            NetworkError::Http { status, body } => {
                let reason = http::StatusCode::from_u16(*status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("Unexpected status");
                match std::str::from_utf8(body) {
                    Ok(text) if !text.trim().is_empty() => {
                        format!("Server responded {} {}: {}", status, reason, text.trim())
                    }
                    _ => format!("Server responded {} {}", status, reason),
                }
            }
            NetworkError::Decoding { detail } => {
                format!("The server response could not be read ({})", detail)
            }
            NetworkError::Connection { kind, detail } => match kind {
                TransportErrorKind::Offline => "You appear to be offline".to_string(),
                TransportErrorKind::TimedOut => "The request timed out".to_string(),
                _ => format!("Could not reach the server ({})", detail),
            },
            NetworkError::Unknown { detail } => format!("Something went wrong ({})", detail),
        }
    }
}

/// Every error shape the [`ErrorMapper`] accepts.
#[derive(Debug)]
pub enum RawError {
    /// Status validation failed.
    Status(StatusError),
    /// Decoding failed.
    Decode(DecodeError),
    /// The transport failed.
    Transport(TransportError),
    /// Already mapped.
    Network(NetworkError),
    /// Anything else.
    Other(BoxError),
}

impl From<StatusError> for RawError {
    fn from(err: StatusError) -> Self {
        RawError::Status(err)
    }
}

impl From<DecodeError> for RawError {
    fn from(err: DecodeError) -> Self {
        RawError::Decode(err)
    }
}

impl From<TransportError> for RawError {
    fn from(err: TransportError) -> Self {
        RawError::Transport(err)
    }
}

impl From<NetworkError> for RawError {
    fn from(err: NetworkError) -> Self {
        RawError::Network(err)
    }
}

impl From<BoxError> for RawError {
    fn from(err: BoxError) -> Self {
        RawError::Other(err)
    }
}

/// Normalizes any error into a [`NetworkError`].
///
/// Mapping is total and performs no I/O. Feeding an already-mapped
/// [`NetworkError`] back in returns it unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct ErrorMapper;

impl ErrorMapper {
    /// Map a raw error into the closed taxonomy.
    pub fn map(raw: impl Into<RawError>) -> NetworkError {
        match raw.into() {
            RawError::Status(err) => {
                let (status, body) = err.into_parts();
                NetworkError::Http { status, body }
            }
            RawError::Decode(err) => NetworkError::Decoding { detail: err.0 },
            RawError::Transport(err) => NetworkError::Connection {
                kind: err.kind,
                detail: err.message,
            },
            RawError::Network(err) => err,
            RawError::Other(err) => NetworkError::Unknown {
                detail: err.to_string(),
            },
        }
    }

    /// Convenience wrapper for [`NetworkError::is_retryable`].
    pub fn is_retryable(error: &NetworkError) -> bool {
        error.is_retryable()
    }
}

impl From<StatusError> for NetworkError {
    fn from(err: StatusError) -> Self {
        ErrorMapper::map(err)
    }
}

impl From<DecodeError> for NetworkError {
    fn from(err: DecodeError) -> Self {
        ErrorMapper::map(err)
    }
}

impl From<TransportError> for NetworkError {
    fn from(err: TransportError) -> Self {
        ErrorMapper::map(err)
    }
}
