#![allow(dead_code)]

use std::mem;

use repnet::{
    ConnectionId, DisconnectReason, EventCode, Inbox, LocalNetwork, NetworkNode, NodeConfig,
    NodeEvent, Packet, Transport, TransportError,
};

pub const SERVER: ConnectionId = ConnectionId::new(1);

pub fn id(raw: u32) -> ConnectionId {
    ConnectionId::new(raw)
}

#[derive(Debug, Clone)]
pub enum Sent {
    Unicast(ConnectionId, Packet),
    Broadcast(Packet),
}

impl Sent {
    pub fn packet(&self) -> &Packet {
        match self {
            Sent::Unicast(_, packet) | Sent::Broadcast(packet) => packet,
        }
    }
}

/// Transport double that records every routed packet instead of delivering it.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    pub sent: Vec<Sent>,
    inbox: Option<Inbox>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&mut self) -> Vec<Sent> {
        mem::take(&mut self.sent)
    }

    pub fn unicasts_to(&self, target: ConnectionId) -> Vec<&Packet> {
        self.sent
            .iter()
            .filter_map(|sent| match sent {
                Sent::Unicast(to, packet) if *to == target => Some(packet),
                _ => None,
            })
            .collect()
    }
}

impl Transport for RecordingTransport {
    fn connect(&mut self, id: ConnectionId, inbox: Inbox) -> Result<(), TransportError> {
        inbox.enqueue(Packet::connection_approval(id, 0));
        self.inbox = Some(inbox);
        Ok(())
    }

    fn disconnect(
        &mut self,
        _id: ConnectionId,
        _reason: DisconnectReason,
    ) -> Result<(), TransportError> {
        self.inbox = None;
        Ok(())
    }

    fn send(&mut self, target: ConnectionId, packet: &Packet) -> Result<(), TransportError> {
        self.sent.push(Sent::Unicast(target, packet.clone()));
        Ok(())
    }

    fn broadcast(&mut self, packet: &Packet) -> Result<usize, TransportError> {
        self.sent.push(Sent::Broadcast(packet.clone()));
        Ok(1)
    }
}

pub fn event_code(packet: &Packet) -> Option<EventCode> {
    packet.event_code().and_then(Result::ok)
}

pub fn events<T: Transport>(node: &mut NetworkNode<T>) -> Vec<NodeEvent> {
    node.drain_events().collect()
}

pub fn recording_server() -> NetworkNode<RecordingTransport> {
    recording_node(NodeConfig::server(SERVER))
}

pub fn recording_node(config: NodeConfig) -> NetworkNode<RecordingTransport> {
    let mut node = NetworkNode::new(config, RecordingTransport::new());
    node.start().unwrap();
    node.tick(0);
    node.transport_mut().take();
    events(&mut node);
    node
}

pub fn deliver(node: &mut NetworkNode<RecordingTransport>, packet: Packet, now_ms: u64) {
    node.inbox().enqueue(packet);
    node.tick(now_ms);
}

/// Server plus clients sharing one in-process network, ticked in lockstep.
pub struct LocalSession {
    pub network: LocalNetwork,
    pub server: NetworkNode<LocalNetwork>,
    pub clients: Vec<NetworkNode<LocalNetwork>>,
    pub now_ms: u64,
}

impl LocalSession {
    pub fn new(client_count: u32) -> Self {
        let network = LocalNetwork::new();
        let clients = (0..client_count)
            .map(|n| NodeConfig::client(id(n + 2)))
            .collect();
        Self::with_configs(network, NodeConfig::server(SERVER), clients)
    }

    pub fn with_configs(
        network: LocalNetwork,
        server: NodeConfig,
        clients: Vec<NodeConfig>,
    ) -> Self {
        let mut server = NetworkNode::new(server, network.clone());
        server.start().unwrap();

        let clients = clients
            .into_iter()
            .map(|config| {
                let mut client = NetworkNode::new(config, network.clone());
                client.start().unwrap();
                client
            })
            .collect();

        Self {
            network,
            server,
            clients,
            now_ms: 0,
        }
    }

    pub fn step(&mut self) {
        self.now_ms += 100;
        self.server.tick(self.now_ms);
        for client in &mut self.clients {
            client.tick(self.now_ms);
        }
    }

    pub fn steps(&mut self, count: usize) {
        for _ in 0..count {
            self.step();
        }
    }

    pub fn all_connected(&self) -> bool {
        self.clients.iter().all(NetworkNode::is_connected)
    }

    /// Ticks until every client has joined, then discards the handshake events.
    pub fn connect_all(&mut self) {
        for _ in 0..10 {
            if self.all_connected() {
                break;
            }
            self.step();
        }
        assert!(self.all_connected(), "clients failed to join");

        events(&mut self.server);
        for client in &mut self.clients {
            events(client);
        }
    }
}
