use crate::net::{ConnectionId, ErrorCode, TransportError};
use crate::replication::{EntityKind, ReplicatedEntityId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplicationError {
    #[error("expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
    #[error("invalid replicated entity id")]
    InvalidId,
    #[error("replicated entity {0} already registered")]
    DuplicateId(ReplicatedEntityId),
    #[error("unknown entity kind {0}")]
    UnknownKind(EntityKind),
    #[error("no free replicated entity id left")]
    IdsExhausted,
    #[error("only the server allocates replicated entities")]
    NotServer,
}

/// Everything a node can report while processing a tick. None of these are
/// fatal; the offending packet is dropped.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("protocol violation from {sender}: {detail}")]
    ProtocolViolation { sender: ConnectionId, detail: String },
    #[error("desync: update from {sender} for unknown entity {id}")]
    Desync {
        sender: ConnectionId,
        id: ReplicatedEntityId,
    },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("malformed payload from {sender}: {source}")]
    MalformedPayload {
        sender: ConnectionId,
        #[source]
        source: ReplicationError,
    },
}

impl NetError {
    pub fn protocol_violation(sender: ConnectionId, detail: impl Into<String>) -> Self {
        Self::ProtocolViolation {
            sender,
            detail: detail.into(),
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::ProtocolViolation { .. } => ErrorCode::ProtocolViolation,
            Self::Desync { .. } => ErrorCode::Desync,
            Self::Transport(_) => ErrorCode::Generic,
            Self::MalformedPayload { .. } => ErrorCode::MalformedPayload,
        }
    }

    /// Remote peer that caused the failure, when there is one to tell.
    pub fn originator(&self) -> Option<ConnectionId> {
        match self {
            Self::ProtocolViolation { sender, .. } | Self::MalformedPayload { sender, .. } => {
                Some(*sender)
            }
            Self::Desync { .. } | Self::Transport(_) => None,
        }
    }
}
