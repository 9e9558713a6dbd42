use crate::net::{ConnectionId, Packet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Unicast(ConnectionId),
    /// Every peer the node knows about, minus the packet's sender.
    Peers,
    /// Transport-level broadcast, no peer filtering.
    Everyone,
}

#[derive(Debug, Clone)]
pub struct Outbound {
    pub route: Route,
    pub packet: Packet,
}

impl Outbound {
    pub fn unicast(target: ConnectionId, packet: Packet) -> Self {
        Self {
            route: Route::Unicast(target),
            packet,
        }
    }

    pub fn peers(packet: Packet) -> Self {
        Self {
            route: Route::Peers,
            packet,
        }
    }

    pub fn everyone(packet: Packet) -> Self {
        Self {
            route: Route::Everyone,
            packet,
        }
    }
}
