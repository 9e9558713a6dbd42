mod config;
mod scenario;
mod simulation;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use config::{ScenarioConfig, TransportKind};
use scenario::Scenario;

#[derive(Parser)]
#[command(name = "repnet-sandbox")]
#[command(about = "Runs a server and its clients through a replication scenario")]
struct Args {
    /// RON scenario file; flags below override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short = 'n', long)]
    clients: Option<u32>,

    #[arg(long)]
    ticks: Option<u64>,

    #[arg(short, long)]
    tick_rate: Option<u32>,

    #[arg(long, help = "Packet loss percentage (0-100) for unreliable packets")]
    loss_percent: Option<u8>,

    #[arg(long, help = "Seed for reproducible packet loss")]
    seed: Option<u64>,

    #[arg(long, value_enum)]
    transport: Option<TransportKind>,

    #[arg(short, long, help = "First UDP port; clients bind the ports after it")]
    port: Option<u16>,

    #[arg(short, long, help = "Entities the server creates up front")]
    entities: Option<u32>,

    #[arg(long)]
    realtime: bool,

    #[arg(long, help = "Log every packet received at debug level")]
    log_packets: bool,
}

impl Args {
    fn apply(self, config: &mut ScenarioConfig) {
        if let Some(clients) = self.clients {
            config.clients = clients;
        }
        if let Some(ticks) = self.ticks {
            config.ticks = ticks;
        }
        if let Some(tick_rate) = self.tick_rate {
            config.tick_rate = tick_rate;
        }
        if let Some(loss_percent) = self.loss_percent {
            config.packet_loss.loss_percent = loss_percent.min(100);
        }
        if let Some(seed) = self.seed {
            config.packet_loss.seed = Some(seed);
        }
        if let Some(transport) = self.transport {
            config.transport = transport;
        }
        if let Some(port) = self.port {
            config.base_port = port;
        }
        if let Some(entities) = self.entities {
            config.entities = entities;
        }
        config.realtime |= self.realtime;
        config.log_packets |= self.log_packets;
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut config = match &args.config {
        Some(path) => ScenarioConfig::load(path)?,
        None => ScenarioConfig::default(),
    };
    args.apply(&mut config);

    log::info!(
        "Starting {:?} scenario: {} clients, {} ticks at {} Hz",
        config.transport,
        config.clients,
        config.ticks,
        config.tick_rate
    );

    let summary = match config.transport {
        TransportKind::Local => Scenario::local(config)?.run()?,
        TransportKind::Udp => Scenario::udp(config)?.run()?,
    };

    println!("{}", summary);
    Ok(())
}
