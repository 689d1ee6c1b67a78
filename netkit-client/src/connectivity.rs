//! Network reachability as seen by the application.
//!
//! The service asks its [`ConnectivityProbe`] before every attempt. When the
//! probe reports [`Connectivity::Offline`] the attempt fails with
//! [`TransportErrorKind::Offline`](netkit_core::TransportErrorKind::Offline)
//! without touching the transport, and the retry policy decides what happens
//! next. `Unknown` is treated as online.

use std::sync::atomic::{AtomicU8, Ordering};

/// A reachability snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Connectivity {
    /// The network is reachable.
    Online,
    /// The network is known to be unreachable.
    Offline,
    /// No information.
    #[default]
    Unknown,
}

impl Connectivity {
    /// Whether an attempt should be skipped.
    pub fn is_offline(self) -> bool {
        self == Connectivity::Offline
    }

    fn to_u8(self) -> u8 {
        match self {
            Connectivity::Online => 0,
            Connectivity::Offline => 1,
            Connectivity::Unknown => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Connectivity::Online,
            1 => Connectivity::Offline,
            _ => Connectivity::Unknown,
        }
    }
}

/// Reports current reachability.
pub trait ConnectivityProbe: Send + Sync {
    /// Current reachability.
    fn status(&self) -> Connectivity;
}

/// A probe that always reports [`Connectivity::Online`].
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysOnline;

impl ConnectivityProbe for AlwaysOnline {
    fn status(&self) -> Connectivity {
        Connectivity::Online
    }
}

/// A probe the application updates from its own network monitor.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use netkit_client::{Connectivity, ConnectivityProbe, SharedConnectivity};
///
/// let probe = Arc::new(SharedConnectivity::new(Connectivity::Online));
/// probe.set(Connectivity::Offline);
/// assert!(probe.status().is_offline());
/// ```
#[derive(Debug)]
pub struct SharedConnectivity {
    state: AtomicU8,
}

impl Default for SharedConnectivity {
    /// Starts online.
    fn default() -> Self {
        Self::new(Connectivity::Online)
    }
}

impl SharedConnectivity {
    /// Create a probe with an initial state.
    pub fn new(initial: Connectivity) -> Self {
        Self {
            state: AtomicU8::new(initial.to_u8()),
        }
    }

    /// Update the reported state.
    pub fn set(&self, status: Connectivity) {
        let previous = Connectivity::from_u8(self.state.swap(status.to_u8(), Ordering::AcqRel));
        if previous != status {
            tracing::debug!(?previous, current = ?status, "connectivity changed");
        }
    }
}

impl ConnectivityProbe for SharedConnectivity {
    fn status(&self) -> Connectivity {
        Connectivity::from_u8(self.state.load(Ordering::Acquire))
    }
}
