use serde::{Deserialize, Serialize};

use crate::error::NetError;
use crate::net::{CommonResponse, ConnectionId, ConnectionState, NetMode, PeerSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinRetry {
    pub timeout_ms: u64,
    pub max_attempts: u32,
}

impl Default for JoinRetry {
    fn default() -> Self {
        Self {
            timeout_ms: 1000,
            max_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryAction {
    Ignore,
    Announce,
    RequestJoin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinDecision {
    Accepted,
    Denied,
}

impl JoinDecision {
    pub fn response(self) -> CommonResponse {
        match self {
            Self::Accepted => CommonResponse::Accepted,
            Self::Denied => CommonResponse::Denied,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Connected,
    Refused(CommonResponse),
    AlreadyConnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    Wait,
    Rediscover { attempt: u32 },
    GiveUp { attempts: u32 },
}

#[derive(Debug, Default)]
pub struct ServerSession {
    peers: PeerSet,
}

#[derive(Debug)]
pub struct ClientSession {
    state: ConnectionState,
    server: Option<ConnectionId>,
    retry: Option<JoinRetry>,
    /// Server already sent a JoinRequest in the current attempt.
    requested_from: Option<ConnectionId>,
    attempts: u32,
    last_attempt_ms: Option<u64>,
    abandoned: bool,
}

impl ClientSession {
    fn new(retry: Option<JoinRetry>) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            server: None,
            retry,
            requested_from: None,
            attempts: 0,
            last_attempt_ms: None,
            abandoned: false,
        }
    }

    fn is_joining(&self) -> bool {
        self.state == ConnectionState::Disconnected && !self.abandoned
    }
}

#[derive(Debug)]
pub enum Session {
    Server(ServerSession),
    Client(ClientSession),
}

impl Session {
    pub fn new(mode: NetMode, retry: Option<JoinRetry>) -> Self {
        match mode {
            NetMode::Server => Self::Server(ServerSession::default()),
            NetMode::Client => Self::Client(ClientSession::new(retry)),
        }
    }

    pub fn mode(&self) -> NetMode {
        match self {
            Self::Server(_) => NetMode::Server,
            Self::Client(_) => NetMode::Client,
        }
    }

    pub fn is_server(&self) -> bool {
        matches!(self, Self::Server(_))
    }

    pub fn state(&self) -> ConnectionState {
        match self {
            Self::Server(_) => ConnectionState::Connected,
            Self::Client(client) => client.state,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn server(&self) -> Option<ConnectionId> {
        match self {
            Self::Server(_) => None,
            Self::Client(client) => client.server,
        }
    }

    pub fn peers(&self) -> Option<&PeerSet> {
        match self {
            Self::Server(server) => Some(&server.peers),
            Self::Client(_) => None,
        }
    }

    pub fn peer_count(&self) -> usize {
        self.peers().map_or(0, PeerSet::len)
    }

    pub fn fan_out_targets(&self) -> Vec<ConnectionId> {
        match self {
            Self::Server(server) => server.peers.ids().collect(),
            Self::Client(client) => client.server.into_iter().collect(),
        }
    }

    pub fn join_attempts(&self) -> u32 {
        match self {
            Self::Server(_) => 0,
            Self::Client(client) => client.attempts,
        }
    }

    pub fn begin_join(&mut self, now_ms: u64) {
        if let Self::Client(client) = self {
            if client.is_joining() && client.attempts == 0 {
                client.attempts = 1;
                client.last_attempt_ms = Some(now_ms);
            }
        }
    }

    pub fn on_discovery(
        &mut self,
        sender: ConnectionId,
        sender_mode: NetMode,
        now_ms: u64,
    ) -> DiscoveryAction {
        match (self, sender_mode) {
            (Self::Server(server), NetMode::Client) if !server.peers.contains(sender) => {
                DiscoveryAction::Announce
            }
            (Self::Client(client), NetMode::Server)
                if client.is_joining() && client.requested_from != Some(sender) =>
            {
                client.requested_from = Some(sender);
                client.last_attempt_ms = Some(now_ms);
                DiscoveryAction::RequestJoin
            }
            _ => DiscoveryAction::Ignore,
        }
    }

    pub fn on_join_request(
        &mut self,
        sender: ConnectionId,
        now_ms: u64,
    ) -> Result<JoinDecision, NetError> {
        match self {
            Self::Server(server) => {
                if server.peers.insert(sender, now_ms) {
                    Ok(JoinDecision::Accepted)
                } else {
                    Ok(JoinDecision::Denied)
                }
            }
            Self::Client(_) => Err(NetError::protocol_violation(
                sender,
                "client received a JoinRequest",
            )),
        }
    }

    pub fn on_join_response(
        &mut self,
        sender: ConnectionId,
        response: CommonResponse,
    ) -> Result<JoinOutcome, NetError> {
        let client = match self {
            Self::Server(_) => {
                return Err(NetError::protocol_violation(
                    sender,
                    "server received a JoinResponse",
                ));
            }
            Self::Client(client) => client,
        };

        if client.state == ConnectionState::Connected {
            return Ok(JoinOutcome::AlreadyConnected);
        }

        if response == CommonResponse::Accepted {
            client.state = ConnectionState::Connected;
            client.server = Some(sender);
            Ok(JoinOutcome::Connected)
        } else {
            client.requested_from = None;
            Ok(JoinOutcome::Refused(response))
        }
    }

    pub fn on_peer_disconnected(&mut self, id: ConnectionId) -> bool {
        match self {
            Self::Server(server) => server.peers.remove(id).is_some(),
            Self::Client(_) => false,
        }
    }

    pub fn poll_retry(&mut self, now_ms: u64) -> RetryAction {
        let Self::Client(client) = self else {
            return RetryAction::Wait;
        };
        let (Some(retry), Some(last)) = (&client.retry, client.last_attempt_ms) else {
            return RetryAction::Wait;
        };
        if !client.is_joining() || now_ms.saturating_sub(last) < retry.timeout_ms {
            return RetryAction::Wait;
        }

        if client.attempts >= retry.max_attempts {
            client.abandoned = true;
            return RetryAction::GiveUp {
                attempts: client.attempts,
            };
        }

        client.attempts += 1;
        client.last_attempt_ms = Some(now_ms);
        client.requested_from = None;
        RetryAction::Rediscover {
            attempt: client.attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVER: ConnectionId = ConnectionId::new(1);
    const CLIENT: ConnectionId = ConnectionId::new(2);

    #[test]
    fn server_announces_only_to_unknown_clients() {
        let mut session = Session::new(NetMode::Server, None);

        assert_eq!(
            session.on_discovery(CLIENT, NetMode::Client, 0),
            DiscoveryAction::Announce
        );
        session.on_join_request(CLIENT, 0).unwrap();
        assert_eq!(
            session.on_discovery(CLIENT, NetMode::Client, 0),
            DiscoveryAction::Ignore
        );
        assert_eq!(session.peer_count(), 1);
    }

    #[test]
    fn symmetric_discovery_is_ignored() {
        let mut server = Session::new(NetMode::Server, None);
        let mut client = Session::new(NetMode::Client, None);

        assert_eq!(
            server.on_discovery(SERVER, NetMode::Server, 0),
            DiscoveryAction::Ignore
        );
        assert_eq!(
            client.on_discovery(CLIENT, NetMode::Client, 0),
            DiscoveryAction::Ignore
        );
    }

    #[test]
    fn duplicate_join_request_is_denied() {
        let mut session = Session::new(NetMode::Server, None);

        assert_eq!(session.on_join_request(CLIENT, 0).unwrap(), JoinDecision::Accepted);
        assert_eq!(session.on_join_request(CLIENT, 5).unwrap(), JoinDecision::Denied);
        assert_eq!(session.peer_count(), 1);
    }

    #[test]
    fn client_connects_once() {
        let mut session = Session::new(NetMode::Client, None);

        assert_eq!(
            session.on_discovery(SERVER, NetMode::Server, 0),
            DiscoveryAction::RequestJoin
        );
        assert_eq!(
            session.on_join_response(SERVER, CommonResponse::Accepted).unwrap(),
            JoinOutcome::Connected
        );
        assert_eq!(session.server(), Some(SERVER));
        assert_eq!(
            session.on_join_response(SERVER, CommonResponse::Accepted).unwrap(),
            JoinOutcome::AlreadyConnected
        );
        assert_eq!(
            session.on_discovery(SERVER, NetMode::Server, 0),
            DiscoveryAction::Ignore
        );
        assert_eq!(session.fan_out_targets(), vec![SERVER]);
    }

    #[test]
    fn pending_join_is_not_repeated() {
        let mut session = Session::new(
            NetMode::Client,
            Some(JoinRetry {
                timeout_ms: 100,
                max_attempts: 3,
            }),
        );
        session.begin_join(0);

        assert_eq!(
            session.on_discovery(SERVER, NetMode::Server, 10),
            DiscoveryAction::RequestJoin
        );
        assert_eq!(
            session.on_discovery(SERVER, NetMode::Server, 20),
            DiscoveryAction::Ignore
        );
        assert_eq!(session.poll_retry(110), RetryAction::Rediscover { attempt: 2 });
        assert_eq!(
            session.on_discovery(SERVER, NetMode::Server, 120),
            DiscoveryAction::RequestJoin
        );
    }

    #[test]
    fn denied_client_stays_disconnected() {
        let mut session = Session::new(NetMode::Client, None);

        let outcome = session.on_join_response(SERVER, CommonResponse::Denied).unwrap();

        assert_eq!(outcome, JoinOutcome::Refused(CommonResponse::Denied));
        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert!(session.fan_out_targets().is_empty());
    }

    #[test]
    fn role_violations_are_errors() {
        let mut server = Session::new(NetMode::Server, None);
        let mut client = Session::new(NetMode::Client, None);

        assert!(matches!(
            server.on_join_response(CLIENT, CommonResponse::Accepted),
            Err(NetError::ProtocolViolation { .. })
        ));
        assert!(matches!(
            client.on_join_request(SERVER, 0),
            Err(NetError::ProtocolViolation { .. })
        ));
    }

    #[test]
    fn retry_is_bounded() {
        let retry = JoinRetry {
            timeout_ms: 100,
            max_attempts: 3,
        };
        let mut session = Session::new(NetMode::Client, Some(retry));

        assert_eq!(session.poll_retry(10_000), RetryAction::Wait);
        session.begin_join(0);
        assert_eq!(session.poll_retry(50), RetryAction::Wait);
        assert_eq!(session.poll_retry(100), RetryAction::Rediscover { attempt: 2 });
        assert_eq!(session.poll_retry(150), RetryAction::Wait);
        assert_eq!(session.poll_retry(200), RetryAction::Rediscover { attempt: 3 });
        assert_eq!(session.poll_retry(300), RetryAction::GiveUp { attempts: 3 });
        assert_eq!(session.poll_retry(10_000), RetryAction::Wait);
        assert_eq!(
            session.on_discovery(SERVER, NetMode::Server, 10_000),
            DiscoveryAction::Ignore
        );
    }

    #[test]
    fn connected_client_never_retries() {
        let mut session = Session::new(NetMode::Client, Some(JoinRetry::default()));
        session.begin_join(0);
        session
            .on_join_response(SERVER, CommonResponse::Accepted)
            .unwrap();

        assert_eq!(session.poll_retry(1_000_000), RetryAction::Wait);
    }

    #[test]
    fn server_drops_departed_peer() {
        let mut session = Session::new(NetMode::Server, None);
        session.on_join_request(CLIENT, 0).unwrap();

        assert!(session.on_peer_disconnected(CLIENT));
        assert!(!session.on_peer_disconnected(CLIENT));
        assert_eq!(session.peer_count(), 0);
    }
}
