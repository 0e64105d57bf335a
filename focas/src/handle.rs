//! Session identity and connection parameters.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default FOCAS2 Ethernet port.
pub const DEFAULT_PORT: u16 = 8193;

/// Default timeout handed to the library at connect.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Opaque session handle issued by the vendor library.
///
/// Valid only while registered live in a [`HandleManager`](crate::HandleManager).
/// The library recycles numbers, so a released handle may later be issued
/// again for a new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(u16);

impl Handle {
    /// Wraps a raw library handle.
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    /// The raw library handle.
    pub const fn raw(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where and how to reach a controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ConnectionTarget {
    /// Host name or IPv4 address.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Applies to the connect call and to every later call on the session.
    pub timeout: Duration,
}

impl ConnectionTarget {
    /// Creates a target. The timeout is validated at connect.
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    /// Target on the default port with the default timeout.
    pub fn with_defaults(host: impl Into<String>) -> Self {
        Self::new(host, DEFAULT_PORT, DEFAULT_TIMEOUT)
    }

    /// `host:port`, used as a diagnostic label.
    pub fn peer(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_roundtrip() {
        let h = Handle::from_raw(7);
        assert_eq!(h.raw(), 7);
        assert_eq!(h.to_string(), "7");
    }

    #[test]
    fn target_defaults() {
        let t = ConnectionTarget::with_defaults("10.0.0.5");
        assert_eq!(t.port, 8193);
        assert_eq!(t.timeout, Duration::from_secs(5));
        assert_eq!(t.peer(), "10.0.0.5:8193");
    }
}
