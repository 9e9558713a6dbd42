mod connection;
mod local;
mod protocol;
mod stats;
mod transport;
mod udp;

pub use connection::{ConnectionId, ConnectionState, Peer, PeerSet};
pub use local::LocalNetwork;
pub use protocol::{
    ascii_bytes, text_from, unix_time_ms, CommonResponse, DeliveryMethod, DisconnectReason,
    ErrorCode, EventCode, NetMode, Packet, PacketError, PacketKind, UnknownCode,
    DEFAULT_TICK_RATE, EVENT_CODE_INDEX, JOIN_RESPONSE_INDEX, MAX_PACKET_SIZE, NET_MODE_INDEX,
};
pub use stats::{LossSimulation, LossSimulator, NetworkStats};
pub use transport::{Transport, TransportError};
pub use udp::UdpTransport;
