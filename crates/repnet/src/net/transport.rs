use std::io;

use super::connection::ConnectionId;
use super::protocol::{DisconnectReason, Packet, PacketError};
use crate::queue::Inbox;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("target {0} not connected")]
    NotConnected(ConnectionId),
    #[error("connection denied: {reason}")]
    Denied { reason: String },
    #[error("packet of {size} bytes exceeds MTU of {max}")]
    PacketTooLarge { size: usize, max: usize },
    #[error("transport io error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Packet(#[from] PacketError),
}

/// Incoming packets are pushed into the [`Inbox`] handed over in
/// [`Transport::connect`].
pub trait Transport {
    /// The outcome is also delivered as a ConnectionResponse packet.
    fn connect(&mut self, id: ConnectionId, inbox: Inbox) -> Result<(), TransportError>;

    fn disconnect(&mut self, id: ConnectionId, reason: DisconnectReason)
    -> Result<(), TransportError>;

    fn send(&mut self, target: ConnectionId, packet: &Packet) -> Result<(), TransportError>;

    /// Skips the packet's sender.
    fn broadcast(&mut self, packet: &Packet) -> Result<usize, TransportError>;

    fn poll(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn connect(&mut self, id: ConnectionId, inbox: Inbox) -> Result<(), TransportError> {
        (**self).connect(id, inbox)
    }

    fn disconnect(
        &mut self,
        id: ConnectionId,
        reason: DisconnectReason,
    ) -> Result<(), TransportError> {
        (**self).disconnect(id, reason)
    }

    fn send(&mut self, target: ConnectionId, packet: &Packet) -> Result<(), TransportError> {
        (**self).send(target, packet)
    }

    fn broadcast(&mut self, packet: &Packet) -> Result<usize, TransportError> {
        (**self).broadcast(packet)
    }

    fn poll(&mut self) -> Result<(), TransportError> {
        (**self).poll()
    }
}
