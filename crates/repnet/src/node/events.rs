use crate::error::NetError;
use crate::net::{CommonResponse, ConnectionId, DisconnectReason};
use crate::replication::{EntityKind, NetRole, ReplicatedEntityId};

#[derive(Debug)]
pub enum NodeEvent {
    Connected {
        server: ConnectionId,
    },
    ClientConnected {
        peer: ConnectionId,
    },
    JoinDenied {
        server: ConnectionId,
        response: CommonResponse,
    },
    /// Client side: no server answered within the retry budget.
    JoinFailed {
        attempts: u32,
    },
    PeerDisconnected {
        peer: ConnectionId,
        reason: Option<DisconnectReason>,
    },
    EntityCreated {
        id: ReplicatedEntityId,
        kind: EntityKind,
        role: NetRole,
    },
    Diagnostic(NetError),
}

impl NodeEvent {
    pub fn as_diagnostic(&self) -> Option<&NetError> {
        match self {
            Self::Diagnostic(error) => Some(error),
            _ => None,
        }
    }
}
