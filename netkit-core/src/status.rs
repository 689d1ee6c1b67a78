//! HTTP status validation.
//!
//! [`StatusValidator`] accepts a response whose status is in its acceptable
//! set and otherwise produces a [`StatusError`] tagged by status range.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::RangeInclusive;

use bytes::Bytes;

use crate::wire::WireResponse;

/// Range classification of a rejected status code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatusErrorKind {
    /// `[100, 200)`
    Informational,
    /// `[400, 500)`
    ClientError,
    /// `[500, 600)`
    ServerError,
    /// Anything else, including unaccepted 2xx/3xx codes.
    Unknown,
}

impl StatusErrorKind {
    /// Classify a status code by range.
    pub fn classify(status: u16) -> Self {
        match status {
            100..=199 => StatusErrorKind::Informational,
            400..=499 => StatusErrorKind::ClientError,
            500..=599 => StatusErrorKind::ServerError,
            _ => StatusErrorKind::Unknown,
        }
    }

    /// Get the string representation of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusErrorKind::Informational => "informational",
            StatusErrorKind::ClientError => "client_error",
            StatusErrorKind::ServerError => "server_error",
            StatusErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for StatusErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A response status outside the acceptable set.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unacceptable status {status} ({kind})")]
pub struct StatusError {
    kind: StatusErrorKind,
    status: u16,
    body: Bytes,
}

impl StatusError {
    /// Create a status error, classifying the code by range.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            kind: StatusErrorKind::classify(status),
            status,
            body: body.into(),
        }
    }

    /// Get the range classification.
    pub fn kind(&self) -> StatusErrorKind {
        self.kind
    }

    /// Get the status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Get the response body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Decompose into status code and body.
    pub fn into_parts(self) -> (u16, Bytes) {
        (self.status, self.body)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Acceptable {
    Range(RangeInclusive<u16>),
    Set(BTreeSet<u16>),
}

/// Accepts or rejects responses by status code.
///
/// # Example
///
/// ```
/// use netkit_core::{StatusValidator, StatusErrorKind, WireResponse};
///
/// let validator = StatusValidator::strict();
/// let response = WireResponse::new(202, Default::default(), "");
/// let err = validator.validate(response).unwrap_err();
/// assert_eq!(err.kind(), StatusErrorKind::Unknown);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusValidator {
    acceptable: Acceptable,
}

impl Default for StatusValidator {
    /// Accepts `200..=299`.
    fn default() -> Self {
        Self::range(200..=299)
    }
}

impl StatusValidator {
    /// Accepts `200..=399`.
    pub fn lenient() -> Self {
        Self::range(200..=399)
    }

    /// Accepts only 200, 201 and 204.
    pub fn strict() -> Self {
        Self::custom([200, 201, 204])
    }

    /// Accepts exactly the given codes.
    pub fn custom(codes: impl IntoIterator<Item = u16>) -> Self {
        Self {
            acceptable: Acceptable::Set(codes.into_iter().collect()),
        }
    }

    /// Accepts an inclusive range of codes.
    pub fn range(range: RangeInclusive<u16>) -> Self {
        Self {
            acceptable: Acceptable::Range(range),
        }
    }

    /// Whether `status` is acceptable.
    pub fn accepts(&self, status: u16) -> bool {
        match &self.acceptable {
            Acceptable::Range(range) => range.contains(&status),
            Acceptable::Set(set) => set.contains(&status),
        }
    }

    /// Return the response unchanged if acceptable, otherwise a [`StatusError`].
    pub fn validate(&self, response: WireResponse) -> Result<WireResponse, StatusError> {
        if self.accepts(response.status) {
            Ok(response)
        } else {
            Err(StatusError::new(response.status, response.body))
        }
    }
}
