pub mod error;
pub mod net;
pub mod node;
pub mod queue;
pub mod replication;
pub mod session;
pub mod simulation;

pub use error::{NetError, ReplicationError};
pub use net::{
    CommonResponse, ConnectionId, ConnectionState, DeliveryMethod, DisconnectReason, ErrorCode,
    EventCode, LocalNetwork, LossSimulation, NetMode, NetworkStats, Packet, PacketError,
    PacketKind, PeerSet, Transport, TransportError, UdpTransport, DEFAULT_TICK_RATE,
    MAX_PACKET_SIZE,
};
pub use node::{NetworkNode, NodeConfig, NodeEvent};
pub use queue::{DoubleBuffer, Inbox, Outbound, Route};
pub use replication::{
    EntityKind, KindTable, NetRole, Replicate, ReplicatedEntity, ReplicatedEntityId,
    TransformEncoding, TransformReplica,
};
pub use session::JoinRetry;
pub use simulation::FixedTimestep;
