//! In-process [`Outbound`] backed by a Tokio unbounded channel.
//!
//! The connection's writer task owns the receiving half and turns each
//! [`OutboundFrame`] into a socket write (or a datagram, for unreliable
//! frames). Sending never waits, so a slow socket only grows its own queue.

use tokio::sync::mpsc;

use crate::{ConnectionId, Outbound, TransportError};

/// A frame queued for a connection's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// Must arrive, in order.
    Reliable(Vec<u8>),
    /// May be dropped by the writer under pressure.
    Unreliable(Vec<u8>),
}

impl OutboundFrame {
    /// The encoded bytes, regardless of channel.
    pub fn data(&self) -> &[u8] {
        match self {
            Self::Reliable(data) | Self::Unreliable(data) => data,
        }
    }

    /// Returns `true` for frames queued with [`Outbound::send`].
    pub fn is_reliable(&self) -> bool {
        matches!(self, Self::Reliable(_))
    }
}

/// Outbound handle that queues frames on an unbounded mpsc channel.
#[derive(Debug, Clone)]
pub struct ChannelOutbound {
    id: ConnectionId,
    sender: mpsc::UnboundedSender<OutboundFrame>,
}

impl ChannelOutbound {
    /// Creates a handle and the receiver its writer task should drain.
    pub fn pair(
        id: ConnectionId,
    ) -> (Self, mpsc::UnboundedReceiver<OutboundFrame>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { id, sender }, receiver)
    }

    fn push(&self, frame: OutboundFrame) -> Result<(), TransportError> {
        self.sender.send(frame).map_err(|_| {
            tracing::debug!(conn_id = %self.id, "writer gone, frame dropped");
            TransportError::ConnectionClosed(self.id)
        })
    }
}

impl Outbound for ChannelOutbound {
    fn send(&self, data: Vec<u8>) -> Result<(), TransportError> {
        self.push(OutboundFrame::Reliable(data))
    }

    fn send_unreliable(&self, data: Vec<u8>) -> Result<(), TransportError> {
        self.push(OutboundFrame::Unreliable(data))
    }

    fn is_alive(&self) -> bool {
        !self.sender.is_closed()
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_queues_reliable_frame() {
        let (out, mut rx) = ChannelOutbound::pair(ConnectionId::new(1));

        out.send(vec![1, 2, 3]).unwrap();

        let frame = rx.try_recv().unwrap();
        assert!(frame.is_reliable());
        assert_eq!(frame.data(), &[1, 2, 3]);
    }

    #[test]
    fn test_send_unreliable_queues_unreliable_frame() {
        let (out, mut rx) = ChannelOutbound::pair(ConnectionId::new(1));

        out.send_unreliable(vec![9]).unwrap();

        assert_eq!(rx.try_recv().unwrap(), OutboundFrame::Unreliable(vec![9]));
    }

    #[test]
    fn test_dropped_receiver_marks_connection_dead() {
        let (out, rx) = ChannelOutbound::pair(ConnectionId::new(5));
        assert!(out.is_alive());

        drop(rx);

        assert!(!out.is_alive());
        let err = out.send(vec![0]).unwrap_err();
        assert!(matches!(err, TransportError::ConnectionClosed(id) if id == ConnectionId::new(5)));
    }
}
