use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::protocol::DeliveryMethod;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LossSimulation {
    /// Chance in percent (0..=100) that an unreliable packet is dropped.
    pub loss_percent: u8,
    pub seed: Option<u64>,
}

impl LossSimulation {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn with_loss(loss_percent: u8) -> Self {
        Self {
            loss_percent: loss_percent.min(100),
            seed: None,
        }
    }

    pub fn seeded(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.loss_percent > 0
    }
}

/// Drops unreliable packets at the configured rate. Reliable packets always
/// pass; the layer below is assumed to guarantee their delivery.
#[derive(Debug)]
pub struct LossSimulator {
    config: LossSimulation,
    rng: SmallRng,
}

impl LossSimulator {
    pub fn new(config: LossSimulation) -> Self {
        let rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        Self { config, rng }
    }

    pub fn config(&self) -> &LossSimulation {
        &self.config
    }

    pub fn set_loss_percent(&mut self, loss_percent: u8) {
        self.config.loss_percent = loss_percent.min(100);
    }

    pub fn should_drop(&mut self, delivery: DeliveryMethod) -> bool {
        if delivery.is_reliable() || !self.config.is_enabled() {
            return false;
        }
        self.rng.gen_range(0..100u8) < self.config.loss_percent
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkStats {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub inbound_dropped: u64,
    pub outbound_dropped: u64,
    pub send_failures: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub protocol_violations: u64,
    pub desyncs: u64,
    pub malformed_payloads: u64,
    pub relayed_updates: u64,
}

impl NetworkStats {
    pub fn loss_percent(&self) -> f32 {
        let dropped = (self.inbound_dropped + self.outbound_dropped) as f32;
        let total = (self.packets_sent + self.packets_received) as f32 + dropped;
        if total == 0.0 {
            0.0
        } else {
            dropped / total * 100.0
        }
    }
}
