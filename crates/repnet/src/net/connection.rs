use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub struct ConnectionId(u32);

impl ConnectionId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub fn to_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(u32::from_le_bytes(bytes))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ConnectionId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

#[derive(Debug, Clone)]
pub struct Peer {
    pub id: ConnectionId,
    pub joined_at_ms: u64,
}

#[derive(Debug, Default)]
pub struct PeerSet {
    peers: BTreeMap<ConnectionId, Peer>,
}

impl PeerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the id is already a peer.
    pub fn insert(&mut self, id: ConnectionId, joined_at_ms: u64) -> bool {
        if self.peers.contains_key(&id) {
            return false;
        }
        self.peers.insert(id, Peer { id, joined_at_ms });
        true
    }

    pub fn remove(&mut self, id: ConnectionId) -> Option<Peer> {
        self.peers.remove(&id)
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.peers.contains_key(&id)
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Peer> {
        self.peers.get(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.peers.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Peer> {
        self.peers.values()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_byte_encoding_is_stable() {
        let id = ConnectionId::new(0x0102_0304);
        assert_eq!(id.to_bytes(), [4, 3, 2, 1]);
        assert_eq!(ConnectionId::from_bytes(id.to_bytes()), id);
        assert_eq!(id.to_string(), "16909060");
    }

    #[test]
    fn peer_set_rejects_duplicates() {
        let mut peers = PeerSet::new();
        assert!(peers.insert(ConnectionId::new(7), 0));
        assert!(!peers.insert(ConnectionId::new(7), 10));

        assert_eq!(peers.len(), 1);
        assert_eq!(peers.get(ConnectionId::new(7)).unwrap().joined_at_ms, 0);
    }

    #[test]
    fn peer_set_remove() {
        let mut peers = PeerSet::new();
        peers.insert(ConnectionId::new(1), 0);
        peers.insert(ConnectionId::new(2), 0);

        assert!(peers.remove(ConnectionId::new(1)).is_some());
        assert!(peers.remove(ConnectionId::new(1)).is_none());
        assert_eq!(peers.ids().collect::<Vec<_>>(), vec![ConnectionId::new(2)]);
    }
}
