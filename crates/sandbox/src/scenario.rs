use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use repnet::{
    ConnectionId, DisconnectReason, FixedTimestep, LocalNetwork, NetMode,
    NetworkNode, NetworkStats, NodeEvent, TransformReplica, Transport, UdpTransport,
};

use crate::config::ScenarioConfig;
use crate::simulation::animate;

#[derive(Debug, Default, Clone)]
pub struct EventTally {
    pub joined: u32,
    pub denied: u32,
    pub failed: u32,
    pub disconnected: u32,
    pub created: u32,
    pub diagnostics: u32,
}

impl EventTally {
    fn record(&mut self, node: ConnectionId, event: &NodeEvent) {
        match event {
            NodeEvent::Connected { server } => {
                self.joined += 1;
                log::info!("Client {} joined server {}", node, server);
            }
            NodeEvent::ClientConnected { peer } => {
                log::info!("Server accepted client {}", peer);
            }
            NodeEvent::JoinDenied { server, response } => {
                self.denied += 1;
                log::warn!("Client {} denied by {}: {:?}", node, server, response);
            }
            NodeEvent::JoinFailed { attempts } => {
                self.failed += 1;
                log::warn!("Client {} gave up after {} attempts", node, attempts);
            }
            NodeEvent::PeerDisconnected { peer, reason } => {
                self.disconnected += 1;
                log::info!("Node {} saw {} leave ({:?})", node, peer, reason);
            }
            NodeEvent::EntityCreated { .. } => self.created += 1,
            NodeEvent::Diagnostic(_) => self.diagnostics += 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NodeSummary {
    pub id: ConnectionId,
    pub mode: NetMode,
    pub connected: bool,
    pub entities: usize,
    pub stats: NetworkStats,
}

#[derive(Debug, Clone)]
pub struct Summary {
    pub ticks: u64,
    pub nodes: Vec<NodeSummary>,
    pub events: EventTally,
    /// Largest distance between a server entity and a client proxy of it.
    pub max_drift: f32,
    /// Server entities some client never learned about.
    pub missing: usize,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Ran {} ticks", self.ticks)?;
        for node in &self.nodes {
            writeln!(
                f,
                "  {:?} {:>3}  connected: {:<5}  entities: {:>3}  sent: {:>6}  recv: {:>6}  dropped: {:>5}/{:<5}  relayed: {:>5}  loss: {:.1}%",
                node.mode,
                node.id,
                node.connected,
                node.entities,
                node.stats.packets_sent,
                node.stats.packets_received,
                node.stats.inbound_dropped,
                node.stats.outbound_dropped,
                node.stats.relayed_updates,
                node.stats.loss_percent(),
            )?;
        }
        writeln!(
            f,
            "  joins: {}  denied: {}  failed: {}  created: {}  diagnostics: {}",
            self.events.joined,
            self.events.denied,
            self.events.failed,
            self.events.created,
            self.events.diagnostics,
        )?;
        write!(
            f,
            "  max drift: {:.4}  missing proxies: {}",
            self.max_drift, self.missing
        )
    }
}

pub struct Scenario<T: Transport> {
    config: ScenarioConfig,
    server: NetworkNode<T>,
    clients: Vec<NetworkNode<T>>,
    requested: Vec<bool>,
    events: EventTally,
}

impl Scenario<LocalNetwork> {
    pub fn local(config: ScenarioConfig) -> Result<Self> {
        let network = LocalNetwork::new();
        let clients = (0..config.clients).map(|_| network.clone()).collect();
        Self::new(config, network, clients)
    }
}

impl Scenario<UdpTransport> {
    pub fn udp(config: ScenarioConfig) -> Result<Self> {
        let bind = |port: u16| {
            let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
            UdpTransport::bind(addr).with_context(|| format!("binding {}", addr))
        };

        let server = bind(config.base_port)?;
        let server_addr = server.local_addr();
        log::info!("Server bound to {}", server_addr);

        let mut clients = Vec::with_capacity(config.clients as usize);
        for index in 0..config.clients {
            let port = config
                .base_port
                .checked_add(1 + index as u16)
                .context("client port out of range")?;
            let mut transport = bind(port)?;
            transport.add_peer(crate::config::SERVER_ID, server_addr);
            clients.push(transport);
        }

        Self::new(config, server, clients)
    }
}

impl<T: Transport> Scenario<T> {
    fn new(config: ScenarioConfig, server: T, clients: Vec<T>) -> Result<Self> {
        let mut server = NetworkNode::new(config.server_config(), server);
        server.start().context("starting server")?;

        let clients = clients
            .into_iter()
            .zip(0..)
            .map(|(transport, index)| {
                let mut client = NetworkNode::new(config.client_config(index), transport);
                client
                    .start()
                    .with_context(|| format!("starting client {}", client.id()))?;
                Ok(client)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            requested: vec![false; clients.len()],
            config,
            server,
            clients,
            events: EventTally::default(),
        })
    }

    pub fn run(mut self) -> Result<Summary> {
        let kind = self.config.encoding.kind();
        for _ in 0..self.config.entities {
            self.server.create_entity(kind)?;
        }

        let mut timestep = FixedTimestep::new(self.config.tick_rate);
        let mut last_tick_time = Instant::now();

        while timestep.ticks() < self.config.ticks {
            let delta = if self.config.realtime {
                thread::sleep(Duration::from_millis(1));
                let now = Instant::now();
                let delta = now - last_tick_time;
                last_tick_time = now;
                delta.as_secs_f32()
            } else {
                timestep.dt()
            };

            timestep.accumulate(delta);
            while timestep.ticks() < self.config.ticks && timestep.consume_tick() {
                self.step(timestep.now_ms());
            }
        }

        self.shutdown(timestep.now_ms() + 1)?;
        Ok(self.summarize(timestep.ticks()))
    }

    fn step(&mut self, now_ms: u64) {
        animate(&mut self.server, now_ms);
        self.server.tick(now_ms);
        for client in &mut self.clients {
            client.tick(now_ms);
        }

        let server_id = self.server.id();
        for event in self.server.drain_events() {
            self.events.record(server_id, &event);
        }

        let kind = self.config.encoding.kind();
        for (client, requested) in self.clients.iter_mut().zip(&mut self.requested) {
            let client_id = client.id();
            for event in client.drain_events() {
                self.events.record(client_id, &event);
            }

            if client.is_connected() && !*requested {
                *requested = true;
                for _ in 0..self.config.client_entities {
                    client.request_entity(kind);
                }
            }
        }
    }

    fn shutdown(&mut self, now_ms: u64) -> Result<()> {
        for client in &mut self.clients {
            client
                .shutdown(DisconnectReason::Request)
                .with_context(|| format!("shutting down client {}", client.id()))?;
        }

        self.server.tick(now_ms);
        let server_id = self.server.id();
        for event in self.server.drain_events() {
            self.events.record(server_id, &event);
        }

        self.server
            .shutdown(DisconnectReason::Request)
            .context("shutting down server")
    }

    fn summarize(&self, ticks: u64) -> Summary {
        let mut max_drift = 0.0f32;
        let mut missing = 0;

        for entity in self.server.entities() {
            let Some(source) = entity.state::<TransformReplica>() else {
                continue;
            };
            for client in self.clients.iter().filter(|c| c.is_connected()) {
                match client.entity_state::<TransformReplica>(entity.id) {
                    Some(proxy) => {
                        let drift = proxy.translation().distance(source.translation());
                        max_drift = max_drift.max(drift);
                    }
                    None => missing += 1,
                }
            }
        }

        let nodes = std::iter::once(&self.server)
            .chain(&self.clients)
            .map(|node| NodeSummary {
                id: node.id(),
                mode: node.mode(),
                connected: node.is_connected(),
                entities: node.entity_count(),
                stats: node.stats().clone(),
            })
            .collect();

        Summary {
            ticks,
            nodes,
            events: self.events.clone(),
            max_drift,
            missing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repnet::{LossSimulation, TransformEncoding};

    #[test]
    fn lossless_local_run_converges() {
        let config = ScenarioConfig {
            clients: 3,
            ticks: 30,
            entities: 2,
            client_entities: 1,
            ..Default::default()
        };

        let summary = Scenario::local(config).unwrap().run().unwrap();

        assert_eq!(summary.events.joined, 3);
        assert_eq!(summary.events.diagnostics, 0);
        assert_eq!(summary.missing, 0);
        assert!(summary.nodes.iter().all(|node| node.connected));
        assert_eq!(summary.nodes[0].entities, 5);
        assert!(summary.max_drift < 1.0);
    }

    #[test]
    fn lossy_matrix_run_still_joins() {
        let config = ScenarioConfig {
            clients: 2,
            ticks: 50,
            encoding: TransformEncoding::Matrix,
            packet_loss: LossSimulation::with_loss(50).seeded(7),
            ..Default::default()
        };

        let summary = Scenario::local(config).unwrap().run().unwrap();

        assert_eq!(summary.events.joined, 2);
        assert_eq!(summary.missing, 0);
        let dropped: u64 = summary
            .nodes
            .iter()
            .map(|node| node.stats.inbound_dropped + node.stats.outbound_dropped)
            .sum();
        assert!(dropped > 0);
    }
}
