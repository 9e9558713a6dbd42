mod common;

use common::{
    deliver, event_code, events, id, recording_node, recording_server, LocalSession, Sent, SERVER,
};
use repnet::{
    CommonResponse, ConnectionState, DeliveryMethod, DisconnectReason, ErrorCode, EventCode,
    JoinRetry, LocalNetwork, LossSimulation, NetError, NetMode, NodeConfig, NodeEvent, Packet,
    PacketKind, ReplicatedEntityId,
};

#[test]
fn test_client_joins_empty_server() {
    let mut session = LocalSession::new(1);
    assert_eq!(session.server.peer_count(), 0);
    assert_eq!(session.clients[0].state(), ConnectionState::Disconnected);

    session.steps(3);

    let client_id = session.clients[0].id();
    assert_eq!(session.server.peer_count(), 1);
    assert!(session.server.peers().unwrap().contains(client_id));
    assert_eq!(session.clients[0].state(), ConnectionState::Connected);
    assert_eq!(session.clients[0].server_id(), Some(SERVER));

    let server_events = events(&mut session.server);
    assert!(matches!(
        server_events.as_slice(),
        [NodeEvent::ClientConnected { peer }] if *peer == client_id
    ));
    let client_events = events(&mut session.clients[0]);
    assert!(matches!(
        client_events.as_slice(),
        [NodeEvent::Connected { server }] if *server == SERVER
    ));
}

#[test]
fn test_many_clients_join_without_diagnostics() {
    let mut session = LocalSession::new(4);

    session.steps(3);

    assert!(session.all_connected());
    assert_eq!(session.server.peer_count(), 4);
    assert_eq!(session.server.stats().protocol_violations, 0);
    for client in &mut session.clients {
        assert!(events(client).iter().all(|e| e.as_diagnostic().is_none()));
    }
}

#[test]
fn test_server_started_after_clients_is_still_found() {
    let network = LocalNetwork::new();
    let mut client = repnet::NetworkNode::new(NodeConfig::client(id(2)), network.clone());
    client.start().unwrap();
    client.tick(0);

    let mut server = repnet::NetworkNode::new(NodeConfig::server(SERVER), network.clone());
    server.start().unwrap();

    for now in 1..=3 {
        server.tick(now * 100);
        client.tick(now * 100);
    }

    assert!(client.is_connected());
    assert_eq!(server.peer_count(), 1);
}

#[test]
fn test_duplicate_join_request_is_denied() {
    let client = id(7);
    let mut server = recording_server();

    deliver(&mut server, Packet::join_request(client, 0), 100);
    assert_eq!(server.peer_count(), 1);
    let accepted = server.transport_mut().take();
    assert_eq!(accepted.len(), 1);
    assert_eq!(accepted[0].packet().payload(), &[2, 2]);
    events(&mut server);

    deliver(&mut server, Packet::join_request(client, 0), 200);

    assert_eq!(server.peer_count(), 1);
    let replies = server.transport().unicasts_to(client);
    assert_eq!(replies.len(), 1);
    assert_eq!(event_code(replies[0]), Some(EventCode::JoinResponse));
    assert_eq!(replies[0].byte(1), Some(CommonResponse::Denied.as_u8()));

    let diagnostics = events(&mut server);
    assert!(matches!(
        diagnostics.as_slice(),
        [NodeEvent::Diagnostic(NetError::ProtocolViolation { sender, .. })] if *sender == client
    ));
    assert_eq!(server.stats().protocol_violations, 1);
}

#[test]
fn test_repeated_discovery_is_idempotent() {
    let client = id(4);
    let mut server = recording_server();

    deliver(&mut server, Packet::discovery(client, NetMode::Client, 0), 100);
    let replies = server.transport_mut().take();
    assert_eq!(replies.len(), 1);
    assert!(matches!(&replies[0], Sent::Unicast(to, _) if *to == client));
    assert_eq!(replies[0].packet().payload(), &[0, 0]);

    deliver(&mut server, Packet::join_request(client, 0), 200);
    server.transport_mut().take();

    for now in [300, 400] {
        server
            .inbox()
            .enqueue(Packet::discovery(client, NetMode::Client, now));
        server.tick(now);
    }

    assert_eq!(server.peer_count(), 1);
    assert!(server.transport().sent.is_empty());
}

#[test]
fn test_symmetric_discovery_is_ignored() {
    let mut server = recording_server();
    deliver(&mut server, Packet::discovery(id(9), NetMode::Server, 0), 100);
    assert!(server.transport().sent.is_empty());

    let mut client = recording_node(NodeConfig::client(id(3)));
    deliver(&mut client, Packet::discovery(id(4), NetMode::Client, 0), 100);
    assert!(client.transport().sent.is_empty());
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[test]
fn test_client_ignores_join_request() {
    let mut client = recording_node(NodeConfig::client(id(3)));

    deliver(&mut client, Packet::join_request(id(4), 0), 100);

    assert!(client.transport().sent.is_empty());
    assert!(events(&mut client).is_empty());
}

#[test]
fn test_server_reports_join_response() {
    let sender = id(5);
    let mut server = recording_server();

    deliver(
        &mut server,
        Packet::join_response(sender, CommonResponse::Accepted, 0),
        100,
    );

    let errors = server.transport().unicasts_to(sender);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind(), PacketKind::Error);
    assert_eq!(errors[0].byte(0), Some(ErrorCode::ProtocolViolation.as_u8()));
    assert!(errors[0].is_error());
    assert_eq!(server.peer_count(), 0);
}

#[test]
fn test_client_denied_stays_disconnected() {
    let mut client = recording_node(NodeConfig::client(id(3)));

    deliver(
        &mut client,
        Packet::join_response(SERVER, CommonResponse::Denied, 0),
        100,
    );

    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(matches!(
        events(&mut client).as_slice(),
        [NodeEvent::JoinDenied { server, response: CommonResponse::Denied }] if *server == SERVER
    ));
}

#[test]
fn test_connected_client_ignores_late_join_response() {
    let mut client = recording_node(NodeConfig::client(id(3)));
    deliver(
        &mut client,
        Packet::join_response(SERVER, CommonResponse::Accepted, 0),
        100,
    );
    events(&mut client);

    deliver(
        &mut client,
        Packet::join_response(id(8), CommonResponse::Accepted, 0),
        200,
    );

    assert_eq!(client.server_id(), Some(SERVER));
    assert!(events(&mut client).is_empty());
}

#[test]
fn test_full_loss_never_reaches_handlers() {
    let config =
        NodeConfig::client(id(3)).with_packet_loss(LossSimulation::with_loss(100).seeded(1));
    let mut client = recording_node(config);

    let update = Packet::data(
        SERVER,
        EventCode::ReplicationUpdate,
        &[7, 0, 0, 0, 0],
        DeliveryMethod::Unreliable,
        0,
    );
    deliver(&mut client, update, 100);

    assert_eq!(client.stats().inbound_dropped, 1);
    assert_eq!(client.stats().desyncs, 0);
    assert!(events(&mut client).is_empty());
}

#[test]
fn test_full_loss_never_reaches_transport() {
    let config =
        NodeConfig::server(SERVER).with_packet_loss(LossSimulation::with_loss(100).seeded(1));
    let mut server = recording_node(config);
    deliver(&mut server, Packet::join_request(id(2), 0), 100);
    server.transport_mut().take();

    let entity = server.create_entity(repnet::EntityKind::TRANSFORM).unwrap();
    assert_eq!(entity, ReplicatedEntityId::new(1));
    server.tick(200);
    server.tick(300);

    let sent = server.transport_mut().take();
    assert_eq!(sent.len(), 1);
    assert_eq!(event_code(sent[0].packet()), Some(EventCode::CreateEntity));
    assert_eq!(server.stats().outbound_dropped, 2);
}

#[test]
fn test_join_retry_gives_up() {
    let retry = JoinRetry {
        timeout_ms: 100,
        max_attempts: 3,
    };
    let mut client = recording_node(NodeConfig::client(id(3)).with_join_retry(Some(retry)));
    assert_eq!(client.join_attempts(), 1);

    for now in [100, 200] {
        client.tick(now);
    }
    let rediscoveries = client.transport_mut().take();
    assert_eq!(rediscoveries.len(), 2);
    assert!(rediscoveries
        .iter()
        .all(|sent| matches!(sent, Sent::Broadcast(p) if event_code(p) == Some(EventCode::Discovery))));

    client.tick(300);
    client.tick(1000);

    assert!(matches!(
        events(&mut client).as_slice(),
        [NodeEvent::JoinFailed { attempts: 3 }]
    ));
    assert!(client.transport().sent.is_empty());
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[test]
fn test_no_retry_waits_forever() {
    let mut client = recording_node(NodeConfig::client(id(3)).with_join_retry(None));

    client.tick(1_000_000);

    assert!(client.transport().sent.is_empty());
    assert!(events(&mut client).is_empty());
}

#[test]
fn test_server_drops_disconnected_peer() {
    let mut session = LocalSession::new(2);
    session.connect_all();

    let leaving = session.clients[0].id();
    session.clients[0].shutdown(DisconnectReason::Request).unwrap();
    session.step();

    assert_eq!(session.server.peer_count(), 1);
    assert!(!session.server.peers().unwrap().contains(leaving));
    assert!(matches!(
        events(&mut session.server).as_slice(),
        [NodeEvent::PeerDisconnected { peer, reason: Some(DisconnectReason::Request) }] if *peer == leaving
    ));
    assert!(!session.network.is_connected(leaving));
}
