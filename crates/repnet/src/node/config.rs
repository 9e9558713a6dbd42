use serde::{Deserialize, Serialize};

use crate::net::{ConnectionId, LossSimulation, NetMode, DEFAULT_TICK_RATE};
use crate::session::JoinRetry;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub id: ConnectionId,
    pub mode: NetMode,
    pub tick_rate: u32,
    pub packet_loss: LossSimulation,
    /// `None` leaves an unanswered join pending forever.
    pub join_retry: Option<JoinRetry>,
    /// Debug-log every packet taken from the inbound queue.
    pub log_packets: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            id: ConnectionId::new(0),
            mode: NetMode::Client,
            tick_rate: DEFAULT_TICK_RATE,
            packet_loss: LossSimulation::disabled(),
            join_retry: Some(JoinRetry::default()),
            log_packets: false,
        }
    }
}

impl NodeConfig {
    pub fn server(id: ConnectionId) -> Self {
        Self {
            id,
            mode: NetMode::Server,
            join_retry: None,
            ..Default::default()
        }
    }

    pub fn client(id: ConnectionId) -> Self {
        Self {
            id,
            mode: NetMode::Client,
            ..Default::default()
        }
    }

    pub fn with_packet_loss(mut self, packet_loss: LossSimulation) -> Self {
        self.packet_loss = packet_loss;
        self
    }

    pub fn with_join_retry(mut self, join_retry: Option<JoinRetry>) -> Self {
        self.join_retry = join_retry;
        self
    }

    pub fn with_log_packets(mut self, log_packets: bool) -> Self {
        self.log_packets = log_packets;
        self
    }

    pub fn tick_interval_ms(&self) -> u64 {
        1000 / u64::from(self.tick_rate.max(1))
    }
}
