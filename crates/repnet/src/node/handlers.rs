use super::{NetworkNode, NodeEvent};
use crate::error::NetError;
use crate::net::{
    CommonResponse, ConnectionId, DisconnectReason, EventCode, NetMode, Packet, PacketKind,
    Transport, JOIN_RESPONSE_INDEX, NET_MODE_INDEX,
};
use crate::queue::Outbound;
use crate::replication::{create_entity_packet, parse_create, ApplyOutcome, NetRole};
use crate::session::{DiscoveryAction, JoinDecision, JoinOutcome};

impl<T: Transport> NetworkNode<T> {
    pub(super) fn process_inbound(&mut self) {
        for packet in self.inbox.swap_and_take() {
            if self.loss.should_drop(packet.delivery()) {
                self.stats.inbound_dropped += 1;
                log::trace!("Simulated loss dropped inbound {}", packet);
                continue;
            }

            self.stats.packets_received += 1;
            self.stats.bytes_received += packet.payload().len() as u64;

            if self.config.log_packets {
                log::debug!("{:?} {} received {}", self.mode(), self.id(), packet);
            }

            self.handle_packet(packet);
        }
    }

    fn handle_packet(&mut self, packet: Packet) {
        match packet.kind() {
            // Must run before the error filter: a timeout notice is still a departure.
            PacketKind::DisconnectionResponse => self.handle_disconnection(&packet),
            _ if packet.is_error() => {
                log::error!("{:?} {} got {}", self.mode(), self.id(), packet);
            }
            PacketKind::ConnectionResponse => self.handle_connection_response(&packet),
            PacketKind::Data => self.handle_data(packet),
            kind => log::trace!("Ignoring {:?} packet from {}", kind, packet.sender()),
        }
    }

    fn handle_disconnection(&mut self, packet: &Packet) {
        let sender = packet.sender();
        let reason = packet
            .byte(0)
            .and_then(|code| DisconnectReason::try_from(code).ok());

        if sender == self.id() {
            log::debug!("{:?} {} left the transport ({:?})", self.mode(), self.id(), reason);
            return;
        }

        if self.session.on_peer_disconnected(sender) {
            log::info!(
                "Peer {} disconnected ({:?}), {} peers left",
                sender,
                reason,
                self.session.peer_count()
            );
            self.events.push_back(NodeEvent::PeerDisconnected {
                peer: sender,
                reason,
            });
        } else if self.session.server() == Some(sender) {
            log::warn!("Server {} went away ({:?})", sender, reason);
            self.events.push_back(NodeEvent::PeerDisconnected {
                peer: sender,
                reason,
            });
        } else {
            log::trace!("Ignoring disconnect of unrelated connection {}", sender);
        }
    }

    fn handle_connection_response(&mut self, packet: &Packet) {
        if packet.sender() != self.id() {
            log::trace!("Ignoring connection response for {}", packet.sender());
            return;
        }

        log::info!(
            "{:?} {} accepted by transport, announcing",
            self.mode(),
            self.id()
        );
        let discovery = Packet::discovery(self.id(), self.mode(), self.now_ms);
        self.outbound.enqueue(Outbound::everyone(discovery));
        self.session.begin_join(self.now_ms);
    }

    fn handle_data(&mut self, packet: Packet) {
        let code = match packet.event_code() {
            Some(Ok(code)) => code,
            Some(Err(unknown)) => {
                log::debug!("Ignoring data from {}: {}", packet.sender(), unknown);
                return;
            }
            None => {
                log::debug!("Ignoring empty data packet from {}", packet.sender());
                return;
            }
        };

        match code {
            EventCode::Discovery => self.handle_discovery(&packet),
            EventCode::JoinRequest => self.handle_join_request(&packet),
            EventCode::JoinResponse => self.handle_join_response(&packet),
            EventCode::ReplicationUpdate => self.handle_replication_update(packet),
            EventCode::CreateEntity => self.handle_create_entity(&packet),
        }
    }

    fn handle_discovery(&mut self, packet: &Packet) {
        let sender = packet.sender();
        let Some(Ok(mode)) = packet.byte(NET_MODE_INDEX).map(NetMode::try_from) else {
            self.report(NetError::protocol_violation(
                sender,
                "discovery without a valid mode byte",
            ));
            return;
        };

        match self.session.on_discovery(sender, mode, self.now_ms) {
            DiscoveryAction::Announce => {
                log::debug!("Answering discovery from client {}", sender);
                let reply = Packet::discovery(self.id(), self.mode(), self.now_ms);
                self.outbound.enqueue(Outbound::unicast(sender, reply));
            }
            DiscoveryAction::RequestJoin => {
                log::info!("Client {} discovered server {}, requesting join", self.id(), sender);
                let request = Packet::join_request(self.id(), self.now_ms);
                self.outbound.enqueue(Outbound::unicast(sender, request));
            }
            DiscoveryAction::Ignore => {
                log::trace!("Ignoring discovery from {:?} {}", mode, sender);
            }
        }
    }

    fn handle_join_request(&mut self, packet: &Packet) {
        let sender = packet.sender();

        match self.session.on_join_request(sender, self.now_ms) {
            Ok(decision) => {
                let response = Packet::join_response(self.id(), decision.response(), self.now_ms);
                self.outbound.enqueue(Outbound::unicast(sender, response));

                if decision == JoinDecision::Accepted {
                    log::info!(
                        "Client {} joined, {} peers",
                        sender,
                        self.session.peer_count()
                    );
                    self.send_existing_entities(sender);
                    self.events.push_back(NodeEvent::ClientConnected { peer: sender });
                } else {
                    self.record_diagnostic(NetError::protocol_violation(
                        sender,
                        "duplicate JoinRequest",
                    ));
                }
            }
            Err(e) => log::debug!("{:?} {} ignoring: {}", self.mode(), self.id(), e),
        }
    }

    fn handle_join_response(&mut self, packet: &Packet) {
        let sender = packet.sender();
        let Some(Ok(response)) = packet
            .byte(JOIN_RESPONSE_INDEX)
            .map(CommonResponse::try_from)
        else {
            self.report(NetError::protocol_violation(
                sender,
                "join response without a valid response code",
            ));
            return;
        };

        match self.session.on_join_response(sender, response) {
            Ok(JoinOutcome::Connected) => {
                log::info!("Client {} connected to server {}", self.id(), sender);
                self.events.push_back(NodeEvent::Connected { server: sender });
            }
            Ok(JoinOutcome::AlreadyConnected) => {
                log::warn!(
                    "Client {} already connected, ignoring {:?} from {}",
                    self.id(),
                    response,
                    sender
                );
            }
            Ok(JoinOutcome::Refused(response)) => {
                log::warn!("Server {} refused client {}: {:?}", sender, self.id(), response);
                self.events.push_back(NodeEvent::JoinDenied {
                    server: sender,
                    response,
                });
            }
            Err(e) => self.report(e),
        }
    }

    fn handle_replication_update(&mut self, packet: Packet) {
        let sender = packet.sender();

        match self.registry.apply_update(packet.payload()) {
            Ok(ApplyOutcome::Applied(id)) => {
                log::trace!("Applied update for entity {} from {}", id, sender);
                if self.session.is_server() {
                    self.relay(packet);
                }
            }
            Ok(ApplyOutcome::Authoritative(id)) => {
                log::trace!("Entity {} is authoritative here, ignoring update", id);
            }
            Ok(ApplyOutcome::Unknown(id)) => {
                self.record_diagnostic(NetError::Desync { sender, id });
            }
            Err(source) => self.report(NetError::MalformedPayload { sender, source }),
        }
    }

    /// Forwards an applied update to every peer but its origin. The packet
    /// keeps the original sender.
    fn relay(&mut self, packet: Packet) {
        let origin = packet.sender();
        let id = self.id();

        for target in self.session.fan_out_targets() {
            if target == origin || target == id {
                continue;
            }
            self.stats.relayed_updates += 1;
            self.outbound
                .enqueue(Outbound::unicast(target, packet.clone()));
        }
    }

    fn handle_create_entity(&mut self, packet: &Packet) {
        let sender = packet.sender();
        let (requested, kind) = match parse_create(packet.payload()) {
            Ok(parsed) => parsed,
            Err(source) => {
                self.report(NetError::MalformedPayload { sender, source });
                return;
            }
        };

        if self.session.is_server() {
            if !self.registry.kinds().contains(kind) {
                self.report(NetError::protocol_violation(
                    sender,
                    format!("cannot create entity of unknown kind {kind}"),
                ));
                return;
            }

            let id = if requested.is_valid() {
                requested
            } else {
                match self.registry.allocate_id() {
                    Ok(id) => id,
                    Err(e) => {
                        self.report(NetError::protocol_violation(sender, e.to_string()));
                        return;
                    }
                }
            };

            if let Err(e) = self.spawn_authoritative(id, kind) {
                self.report(NetError::protocol_violation(sender, e.to_string()));
            }
            return;
        }

        if !requested.is_valid() {
            self.report(NetError::protocol_violation(
                sender,
                "CreateEntity without an entity id",
            ));
            return;
        }

        match self.registry.spawn(requested, kind, NetRole::Proxy, false) {
            Ok(()) => {
                log::info!("Client {} tracks entity {} of kind {}", self.id(), requested, kind);
                self.events.push_back(NodeEvent::EntityCreated {
                    id: requested,
                    kind,
                    role: NetRole::Proxy,
                });
            }
            Err(e) => self.report(NetError::protocol_violation(sender, e.to_string())),
        }
    }

    fn send_existing_entities(&mut self, peer: ConnectionId) {
        let id = self.id();
        for entity in self.registry.iter() {
            let packet = create_entity_packet(id, entity.id, entity.kind(), self.now_ms);
            self.outbound.enqueue(Outbound::unicast(peer, packet));
        }
    }

    pub(super) fn record_diagnostic(&mut self, error: NetError) {
        match &error {
            NetError::ProtocolViolation { .. } => {
                self.stats.protocol_violations += 1;
                log::warn!("{:?} {}: {}", self.mode(), self.id(), error);
            }
            NetError::Desync { .. } => {
                self.stats.desyncs += 1;
                log::warn!("{:?} {}: {}", self.mode(), self.id(), error);
            }
            NetError::MalformedPayload { .. } => {
                self.stats.malformed_payloads += 1;
                log::warn!("{:?} {}: {}", self.mode(), self.id(), error);
            }
            NetError::Transport(_) => {
                self.stats.send_failures += 1;
                log::error!("{:?} {}: {}", self.mode(), self.id(), error);
            }
        }
        self.events.push_back(NodeEvent::Diagnostic(error));
    }

    /// Like [`Self::record_diagnostic`], plus an Error packet to the
    /// originator on a server, or to the joined server on a client.
    pub(super) fn report(&mut self, error: NetError) {
        let target = match error.originator() {
            Some(origin) if self.session.is_server() => Some(origin),
            Some(_) => self.session.server(),
            None => None,
        };
        if let Some(target) = target.filter(|target| *target != self.id()) {
            let packet = Packet::error(self.id(), error.error_code(), &error.to_string(), self.now_ms);
            self.outbound.enqueue(Outbound::unicast(target, packet));
        }
        self.record_diagnostic(error);
    }
}
