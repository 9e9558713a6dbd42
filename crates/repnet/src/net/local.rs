use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::connection::ConnectionId;
use super::protocol::{unix_time_ms, DisconnectReason, Packet};
use super::transport::{Transport, TransportError};
use crate::queue::Inbox;

#[derive(Debug)]
struct LocalConnection {
    id: ConnectionId,
    inbox: Inbox,
}

/// In-process transport: delivery is a direct push into the target's inbox.
///
/// Every node holds a clone; clones share one connection table.
#[derive(Debug, Clone, Default)]
pub struct LocalNetwork {
    connections: Arc<Mutex<Vec<LocalConnection>>>,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self, id: ConnectionId) -> bool {
        self.lock().iter().any(|c| c.id == id)
    }

    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.lock().iter().map(|c| c.id).collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LocalConnection>> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for LocalNetwork {
    fn connect(&mut self, id: ConnectionId, inbox: Inbox) -> Result<(), TransportError> {
        let mut connections = self.lock();

        if connections.iter().any(|c| c.id == id) {
            let reason = "Already connected";
            inbox.enqueue(Packet::connection_denial(id, reason, unix_time_ms()));
            return Err(TransportError::Denied {
                reason: reason.to_string(),
            });
        }

        inbox.enqueue(Packet::connection_approval(id, unix_time_ms()));
        connections.push(LocalConnection { id, inbox });
        log::debug!("Connection {} joined the local network", id);
        Ok(())
    }

    fn disconnect(
        &mut self,
        id: ConnectionId,
        reason: DisconnectReason,
    ) -> Result<(), TransportError> {
        let mut connections = self.lock();

        let Some(index) = connections.iter().position(|c| c.id == id) else {
            return Err(TransportError::NotConnected(id));
        };

        let departed = connections.remove(index);
        let notice = Packet::disconnection_notice(id, reason, unix_time_ms());
        departed.inbox.enqueue(notice.clone());
        for remaining in connections.iter() {
            remaining.inbox.enqueue(notice.clone());
        }

        log::debug!("Connection {} left the local network ({:?})", id, reason);
        Ok(())
    }

    fn send(&mut self, target: ConnectionId, packet: &Packet) -> Result<(), TransportError> {
        let connections = self.lock();
        let connection = connections
            .iter()
            .find(|c| c.id == target)
            .ok_or(TransportError::NotConnected(target))?;
        connection.inbox.enqueue(packet.clone());
        Ok(())
    }

    fn broadcast(&mut self, packet: &Packet) -> Result<usize, TransportError> {
        let connections = self.lock();
        let mut reached = 0;
        for connection in connections.iter().filter(|c| c.id != packet.sender()) {
            connection.inbox.enqueue(packet.clone());
            reached += 1;
        }
        Ok(reached)
    }
}
