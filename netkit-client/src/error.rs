//! Client-side error types.
//!
//! This module provides [`CallError`], the error returned by
//! [`NetworkService`](crate::NetworkService) calls, and the two failure kinds
//! that happen before any network activity: [`BuildError`] and
//! [`InterceptError`].

use netkit_core::NetworkError;

/// The request could not be built from its declaration.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// A `{name}` placeholder in the path was never substituted.
    #[error("unresolved path placeholder `{0}`")]
    UnresolvedPlaceholder(String),

    /// A path parameter names a placeholder the path does not contain.
    #[error("path has no placeholder for parameter `{0}`")]
    UnknownPlaceholder(String),

    /// A header name or value is not valid HTTP.
    #[error("invalid header `{name}`: {reason}")]
    InvalidHeader { name: String, reason: String },

    /// The body could not be serialized.
    #[error("body encoding failed for `{field}`: {reason}")]
    Body { field: String, reason: String },

    /// The assembled URL is not a valid absolute URL.
    #[error("invalid URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// An interceptor refused to prepare the request.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("interceptor `{interceptor}` failed: {message}")]
pub struct InterceptError {
    interceptor: String,
    message: String,
}

impl InterceptError {
    /// Create a new interceptor error.
    pub fn new<I: Into<String>, M: Into<String>>(interceptor: I, message: M) -> Self {
        Self {
            interceptor: interceptor.into(),
            message: message.into(),
        }
    }

    /// Name of the interceptor that failed.
    pub fn interceptor(&self) -> &str {
        &self.interceptor
    }

    /// Failure detail.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Error returned by a [`NetworkService`](crate::NetworkService) call.
///
/// Build and intercept failures never reach the transport and are never
/// retried. Everything that happened on the network arrives as
/// [`CallError::Network`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    /// The request could not be built.
    #[error("request build failed: {0}")]
    Build(#[from] BuildError),

    /// An interceptor's pre-send hook failed.
    #[error(transparent)]
    Intercept(#[from] InterceptError),

    /// The network exchange failed.
    #[error(transparent)]
    Network(#[from] NetworkError),
}

impl CallError {
    /// The network error, if this failure came from the network.
    pub fn as_network(&self) -> Option<&NetworkError> {
        match self {
            CallError::Network(err) => Some(err),
            _ => None,
        }
    }

    /// Consume into the network error, if any.
    pub fn into_network(self) -> Option<NetworkError> {
        match self {
            CallError::Network(err) => Some(err),
            _ => None,
        }
    }

    /// HTTP status of the failure, if the server answered.
    pub fn status(&self) -> Option<u16> {
        self.as_network().and_then(NetworkError::status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_error_from_network() {
        let err: CallError = NetworkError::http(404, "missing").into();
        assert_eq!(err.status(), Some(404));
        assert!(err.as_network().is_some());
        assert_eq!(err.into_network(), Some(NetworkError::http(404, "missing")));
    }

    #[test]
    fn test_call_error_from_build() {
        let err: CallError = BuildError::UnresolvedPlaceholder("id".into()).into();
        assert!(err.as_network().is_none());
        assert_eq!(err.status(), None);
        assert_eq!(
            err.to_string(),
            "request build failed: unresolved path placeholder `id`"
        );
    }

    #[test]
    fn test_intercept_error_display() {
        let err = InterceptError::new("auth", "token expired");
        assert_eq!(err.interceptor(), "auth");
        assert_eq!(err.message(), "token expired");
        assert_eq!(err.to_string(), "interceptor `auth` failed: token expired");
    }
}
