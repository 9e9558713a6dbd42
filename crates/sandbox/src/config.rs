use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use repnet::{
    ConnectionId, JoinRetry, LossSimulation, NodeConfig, TransformEncoding, DEFAULT_TICK_RATE,
};

pub const SERVER_ID: ConnectionId = ConnectionId::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    Local,
    Udp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub clients: u32,
    pub ticks: u64,
    pub tick_rate: u32,
    pub transport: TransportKind,
    pub base_port: u16,
    /// Entities the server creates up front.
    pub entities: u32,
    /// Entities each client asks the server for once it has joined.
    pub client_entities: u32,
    pub encoding: TransformEncoding,
    pub packet_loss: LossSimulation,
    pub join_retry: Option<JoinRetry>,
    pub log_packets: bool,
    /// Sleep between ticks instead of running as fast as possible.
    pub realtime: bool,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            clients: 3,
            ticks: 100,
            tick_rate: DEFAULT_TICK_RATE,
            transport: TransportKind::Local,
            base_port: 27100,
            entities: 2,
            client_entities: 0,
            encoding: TransformEncoding::Matrix,
            packet_loss: LossSimulation::disabled(),
            join_retry: Some(JoinRetry::default()),
            log_packets: false,
            realtime: false,
        }
    }
}

impl ScenarioConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        ron::from_str(&text).with_context(|| format!("parsing scenario {}", path.display()))
    }

    pub fn client_id(&self, index: u32) -> ConnectionId {
        ConnectionId::new(SERVER_ID.raw() + 1 + index)
    }

    pub fn server_config(&self) -> NodeConfig {
        self.node_config(NodeConfig::server(SERVER_ID))
    }

    pub fn client_config(&self, index: u32) -> NodeConfig {
        self.node_config(NodeConfig::client(self.client_id(index)))
            .with_join_retry(self.join_retry.clone())
    }

    fn node_config(&self, base: NodeConfig) -> NodeConfig {
        // Each node draws its own loss sequence; a shared seed is offset per id.
        let mut packet_loss = self.packet_loss.clone();
        if let Some(seed) = packet_loss.seed.as_mut() {
            *seed = seed.wrapping_add(u64::from(base.id.raw()));
        }

        NodeConfig {
            tick_rate: self.tick_rate,
            ..base
        }
        .with_packet_loss(packet_loss)
        .with_log_packets(self.log_packets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_ron_falls_back_to_defaults() {
        let config: ScenarioConfig =
            ron::from_str("(clients: 5, transport: udp, packet_loss: (loss_percent: 20))").unwrap();

        assert_eq!(config.clients, 5);
        assert_eq!(config.transport, TransportKind::Udp);
        assert_eq!(config.packet_loss.loss_percent, 20);
        assert_eq!(config.ticks, ScenarioConfig::default().ticks);
    }

    #[test]
    fn node_configs_get_distinct_ids_and_seeds() {
        let config = ScenarioConfig {
            packet_loss: LossSimulation::with_loss(10).seeded(100),
            ..Default::default()
        };

        let server = config.server_config();
        let first = config.client_config(0);
        let second = config.client_config(1);

        assert_eq!(server.id, SERVER_ID);
        assert_eq!(first.id, ConnectionId::new(2));
        assert_eq!(second.id, ConnectionId::new(3));
        assert_eq!(server.packet_loss.seed, Some(101));
        assert_eq!(second.packet_loss.seed, Some(103));
        assert_eq!(first.join_retry, Some(JoinRetry::default()));
    }
}
