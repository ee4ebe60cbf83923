//! Connection abstraction
//!
//! The registry never owns a transport. It sees connections through the
//! `Connection` trait and keys its outer map by `ConnectionId`.

use std::fmt;

use crate::payload::UpdatePayload;

/// Capability surface the registry requires from a transport connection.
///
/// Implementations live in the transport layer (WebSocket, in-process test
/// doubles). The registry only calls `id()`; `send_data` exists so a
/// dispatcher or transport adapter can push payloads without knowing the
/// concrete connection type.
pub trait Connection: Send + Sync {
    /// Stable identifier for this connection, unique among live connections.
    fn id(&self) -> String;

    /// Push an update payload toward the peer.
    fn send_data(&self, payload: &UpdatePayload);
}

/// Unique identifier for a connection
///
/// Outer key of the registry's two-level map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Create a new connection ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build the ID from a connection's `id()`
    pub fn of(conn: &dyn Connection) -> Self {
        Self(conn.id())
    }

    /// The raw string form
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
