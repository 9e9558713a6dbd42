mod config;
mod events;
mod handlers;

pub use config::NodeConfig;
pub use events::NodeEvent;

use std::collections::VecDeque;

use crate::error::{NetError, ReplicationError};
use crate::net::{
    ConnectionId, ConnectionState, DeliveryMethod, DisconnectReason, EventCode, LossSimulator,
    NetMode, NetworkStats, Packet, PeerSet, Transport, TransportError,
};
use crate::queue::{DoubleBuffer, Inbox, Outbound, Route};
use crate::replication::{
    create_entity_packet, EntityKind, KindTable, NetRole, Replicate, ReplicatedEntity,
    ReplicatedEntityId, ReplicationRegistry,
};
use crate::session::{RetryAction, Session};

/// One server or client endpoint. The host calls [`NetworkNode::start`]
/// once, then [`NetworkNode::tick`] at a fixed rate.
pub struct NetworkNode<T: Transport> {
    config: NodeConfig,
    transport: T,
    inbox: Inbox,
    outbound: DoubleBuffer<Outbound>,
    session: Session,
    registry: ReplicationRegistry,
    loss: LossSimulator,
    stats: NetworkStats,
    events: VecDeque<NodeEvent>,
    now_ms: u64,
    started: bool,
}

impl<T: Transport> NetworkNode<T> {
    pub fn new(config: NodeConfig, transport: T) -> Self {
        Self::with_kinds(config, transport, KindTable::with_builtin())
    }

    pub fn with_kinds(config: NodeConfig, transport: T, kinds: KindTable) -> Self {
        Self {
            session: Session::new(config.mode, config.join_retry.clone()),
            loss: LossSimulator::new(config.packet_loss.clone()),
            registry: ReplicationRegistry::new(kinds),
            transport,
            inbox: Inbox::new(),
            outbound: DoubleBuffer::new(),
            stats: NetworkStats::default(),
            events: VecDeque::new(),
            now_ms: 0,
            started: false,
            config,
        }
    }

    pub fn start(&mut self) -> Result<(), TransportError> {
        if let Err(e) = self.transport.connect(self.id(), self.inbox.clone()) {
            log::error!("{:?} {} failed to connect: {}", self.mode(), self.id(), e);
            return Err(e);
        }

        self.started = true;
        log::info!("{:?} {} started", self.mode(), self.id());
        Ok(())
    }

    pub fn tick(&mut self, now_ms: u64) {
        self.now_ms = now_ms;

        if let Err(e) = self.transport.poll() {
            self.record_diagnostic(e.into());
        }

        self.process_inbound();
        self.check_join_retry();
        self.replicate();
        self.flush_outbound();
    }

    pub fn shutdown(&mut self, reason: DisconnectReason) -> Result<(), TransportError> {
        if !self.started {
            return Ok(());
        }

        self.flush_outbound();
        self.started = false;
        self.transport.disconnect(self.id(), reason)?;

        log::info!("{:?} {} shut down ({:?})", self.mode(), self.id(), reason);
        Ok(())
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = NodeEvent> + '_ {
        self.events.drain(..)
    }

    pub fn id(&self) -> ConnectionId {
        self.config.id
    }

    pub fn mode(&self) -> NetMode {
        self.config.mode
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn is_server(&self) -> bool {
        self.session.is_server()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    pub fn server_id(&self) -> Option<ConnectionId> {
        self.session.server()
    }

    pub fn peers(&self) -> Option<&PeerSet> {
        self.session.peers()
    }

    pub fn peer_count(&self) -> usize {
        self.session.peer_count()
    }

    pub fn join_attempts(&self) -> u32 {
        self.session.join_attempts()
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    pub fn set_loss_percent(&mut self, loss_percent: u8) {
        self.loss.set_loss_percent(loss_percent);
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn inbox(&self) -> &Inbox {
        &self.inbox
    }

    pub fn pending_outbound(&self) -> usize {
        self.outbound.pending_len()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn enqueue(&mut self, envelope: Outbound) {
        self.outbound.enqueue(envelope);
    }

    /// Returns false on a server or a client that has not joined yet.
    pub fn send_to_server(&mut self, code: EventCode, body: &[u8], delivery: DeliveryMethod) -> bool {
        let Some(server) = self.session.server() else {
            log::debug!(
                "{:?} {} has no server to send {:?} to",
                self.mode(),
                self.id(),
                code
            );
            return false;
        };

        let packet = Packet::data(self.id(), code, body, delivery, self.now_ms);
        self.enqueue(Outbound::unicast(server, packet));
        true
    }

    pub fn kinds_mut(&mut self) -> &mut KindTable {
        self.registry.kinds_mut()
    }

    pub fn register_entity(&mut self, entity: ReplicatedEntity) -> Result<(), ReplicationError> {
        self.registry.register(entity)
    }

    pub fn spawn_entity(
        &mut self,
        id: ReplicatedEntityId,
        kind: EntityKind,
        role: NetRole,
        replicate_each_tick: bool,
    ) -> Result<(), ReplicationError> {
        self.registry.spawn(id, kind, role, replicate_each_tick)
    }

    pub fn remove_entity(&mut self, id: ReplicatedEntityId) -> Option<ReplicatedEntity> {
        self.registry.remove(id)
    }

    pub fn entity(&self, id: ReplicatedEntityId) -> Option<&ReplicatedEntity> {
        self.registry.get(id)
    }

    pub fn entity_mut(&mut self, id: ReplicatedEntityId) -> Option<&mut ReplicatedEntity> {
        self.registry.get_mut(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &ReplicatedEntity> {
        self.registry.iter()
    }

    pub fn entity_count(&self) -> usize {
        self.registry.len()
    }

    pub fn entity_state<S: Replicate>(&self, id: ReplicatedEntityId) -> Option<&S> {
        self.registry.get(id).and_then(ReplicatedEntity::state::<S>)
    }

    pub fn entity_state_mut<S: Replicate>(&mut self, id: ReplicatedEntityId) -> Option<&mut S> {
        self.registry.get_mut(id).and_then(ReplicatedEntity::state_mut::<S>)
    }

    pub fn create_entity(&mut self, kind: EntityKind) -> Result<ReplicatedEntityId, ReplicationError> {
        if !self.session.is_server() {
            return Err(ReplicationError::NotServer);
        }
        if !self.registry.kinds().contains(kind) {
            return Err(ReplicationError::UnknownKind(kind));
        }

        let id = self.registry.allocate_id()?;
        self.spawn_authoritative(id, kind)?;
        Ok(id)
    }

    pub fn request_entity(&mut self, kind: EntityKind) -> bool {
        self.send_to_server(
            EventCode::CreateEntity,
            &[ReplicatedEntityId::INVALID.raw(), kind.raw()],
            DeliveryMethod::Reliable,
        )
    }

    fn spawn_authoritative(
        &mut self,
        id: ReplicatedEntityId,
        kind: EntityKind,
    ) -> Result<(), ReplicationError> {
        self.registry.spawn(id, kind, NetRole::Authoritative, true)?;
        log::info!("{:?} {} created entity {} of kind {}", self.mode(), self.id(), id, kind);

        let packet = create_entity_packet(self.id(), id, kind, self.now_ms);
        self.outbound.enqueue(Outbound::peers(packet));
        self.events.push_back(NodeEvent::EntityCreated {
            id,
            kind,
            role: NetRole::Authoritative,
        });
        Ok(())
    }

    fn check_join_retry(&mut self) {
        match self.session.poll_retry(self.now_ms) {
            RetryAction::Wait => {}
            RetryAction::Rediscover { attempt } => {
                log::info!(
                    "{:?} {} still not joined, re-sending discovery (attempt {})",
                    self.mode(),
                    self.id(),
                    attempt
                );
                let packet = Packet::discovery(self.id(), self.mode(), self.now_ms);
                self.outbound.enqueue(Outbound::everyone(packet));
            }
            RetryAction::GiveUp { attempts } => {
                log::warn!(
                    "{:?} {} gave up joining after {} attempts",
                    self.mode(),
                    self.id(),
                    attempts
                );
                self.events.push_back(NodeEvent::JoinFailed { attempts });
            }
        }
    }

    fn replicate(&mut self) {
        let route = match self.session.server() {
            Some(server) => Route::Unicast(server),
            None if self.session.is_server() && self.session.peer_count() > 0 => Route::Peers,
            None => return,
        };

        for packet in self.registry.collect_updates(self.id(), self.now_ms) {
            self.outbound.enqueue(Outbound { route, packet });
        }
    }

    fn flush_outbound(&mut self) {
        let id = self.config.id;
        let mut failures = Vec::new();

        for Outbound { route, packet } in self.outbound.swap_and_drain() {
            if self.loss.should_drop(packet.delivery()) {
                self.stats.outbound_dropped += 1;
                log::trace!("Simulated loss dropped outbound {}", packet);
                continue;
            }

            let delivered = match route {
                Route::Unicast(target) => match self.transport.send(target, &packet) {
                    Ok(()) => 1,
                    Err(e) => {
                        failures.push(e);
                        0
                    }
                },
                Route::Everyone => self.transport.broadcast(&packet).unwrap_or_else(|e| {
                    failures.push(e);
                    0
                }),
                Route::Peers => {
                    let mut reached = 0;
                    for target in self.session.fan_out_targets() {
                        if target == packet.sender() || target == id {
                            continue;
                        }
                        match self.transport.send(target, &packet) {
                            Ok(()) => reached += 1,
                            Err(e) => failures.push(e),
                        }
                    }
                    reached
                }
            };

            self.stats.packets_sent += delivered as u64;
            self.stats.bytes_sent += (packet.payload().len() * delivered) as u64;
        }

        for error in failures {
            self.record_diagnostic(NetError::Transport(error));
        }
    }
}
