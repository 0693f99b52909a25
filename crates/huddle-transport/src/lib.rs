//! Transport abstraction layer for Huddle.
//!
//! The socket accept loop and packet framing live outside this workspace.
//! What the session layer needs from them is captured by the [`Outbound`]
//! trait: a per-player handle that accepts already-encoded frames on a
//! reliable or unreliable channel and can report whether the peer is still
//! there.
//!
//! [`ChannelOutbound`] is the in-process implementation: it pushes frames
//! into a Tokio unbounded channel that a connection's writer task drains.

mod channel;
mod error;

pub use channel::{ChannelOutbound, OutboundFrame};
pub use error::TransportError;

use std::fmt;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// The outbound half of a player's connection.
///
/// Implementations must not block: registries call these methods from
/// inside fan-out loops and a slow peer must never stall delivery to the
/// other members of a room. Queue the frame and return.
pub trait Outbound: Send + Sync + 'static {
    /// Queues data on the reliable channel.
    fn send(&self, data: Vec<u8>) -> Result<(), TransportError>;

    /// Queues data on the unreliable channel.
    ///
    /// Defaults to reliable send. Transports with a datagram path
    /// should override this.
    fn send_unreliable(&self, data: Vec<u8>) -> Result<(), TransportError> {
        self.send(data)
    }

    /// Returns `false` once the peer is gone.
    fn is_alive(&self) -> bool;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_hash_works_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(ConnectionId::new(1), "alice");
        map.insert(ConnectionId::new(2), "bob");
        assert_eq!(map[&ConnectionId::new(1)], "alice");
    }
}
