use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use rkyv::util::AlignedVec;
use rkyv::{rancor, Archive, Deserialize, Serialize};

use super::connection::ConnectionId;

pub const MAX_PACKET_SIZE: usize = 1200;
pub const DEFAULT_TICK_RATE: u32 = 10;

pub const EVENT_CODE_INDEX: usize = 0;
pub const NET_MODE_INDEX: usize = 1;
pub const JOIN_RESPONSE_INDEX: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {what} code {value}")]
pub struct UnknownCode {
    pub what: &'static str,
    pub value: u8,
}

macro_rules! wire_enum {
    ($name:ident, $what:literal { $($variant:ident = $value:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_u8(self) -> u8 {
                self as u8
            }
        }

        impl TryFrom<u8> for $name {
            type Error = UnknownCode;

            fn try_from(value: u8) -> Result<Self, UnknownCode> {
                match value {
                    $($value => Ok(Self::$variant),)+
                    _ => Err(UnknownCode { what: $what, value }),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub enum PacketKind {
    Generic,
    ConnectionRequest,
    ConnectionResponse,
    DisconnectionRequest,
    DisconnectionResponse,
    Data,
    Ack,
    Error,
}

wire_enum!(PacketKind, "packet kind" {
    Generic = 0,
    ConnectionRequest = 1,
    ConnectionResponse = 2,
    DisconnectionRequest = 3,
    DisconnectionResponse = 4,
    Data = 5,
    Ack = 6,
    Error = 7,
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub enum DeliveryMethod {
    Unreliable,
    Reliable,
}

impl DeliveryMethod {
    pub fn is_reliable(self) -> bool {
        matches!(self, Self::Reliable)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum NetMode {
    Server = 0,
    Client = 1,
}

wire_enum!(NetMode, "net mode" { Server = 0, Client = 1 });

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EventCode {
    Discovery = 0,
    JoinRequest = 1,
    JoinResponse = 2,
    ReplicationUpdate = 3,
    CreateEntity = 4,
}

wire_enum!(EventCode, "event" {
    Discovery = 0,
    JoinRequest = 1,
    JoinResponse = 2,
    ReplicationUpdate = 3,
    CreateEntity = 4,
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommonResponse {
    Success = 0,
    Failure = 1,
    Accepted = 2,
    Denied = 3,
}

wire_enum!(CommonResponse, "response" {
    Success = 0,
    Failure = 1,
    Accepted = 2,
    Denied = 3,
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DisconnectReason {
    Request = 0,
    Timeout = 1,
    Kicked = 2,
}

wire_enum!(DisconnectReason, "disconnect reason" {
    Request = 0,
    Timeout = 1,
    Kicked = 2,
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    Generic = 0,
    ProtocolViolation = 1,
    Desync = 2,
    MalformedPayload = 3,
}

wire_enum!(ErrorCode, "error" {
    Generic = 0,
    ProtocolViolation = 1,
    Desync = 2,
    MalformedPayload = 3,
});

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("serialization failed: {0}")]
    Serialize(rancor::Error),
    #[error("deserialization failed: {0}")]
    Deserialize(rancor::Error),
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct Packet {
    kind: PacketKind,
    sender: ConnectionId,
    delivery: DeliveryMethod,
    payload: Vec<u8>,
    timestamp_ms: u64,
}

impl Packet {
    pub fn new(
        kind: PacketKind,
        sender: ConnectionId,
        payload: Vec<u8>,
        delivery: DeliveryMethod,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            kind,
            sender,
            delivery,
            payload,
            timestamp_ms,
        }
    }

    pub fn data(
        sender: ConnectionId,
        code: EventCode,
        body: &[u8],
        delivery: DeliveryMethod,
        timestamp_ms: u64,
    ) -> Self {
        let mut payload = Vec::with_capacity(1 + body.len());
        payload.push(code.as_u8());
        payload.extend_from_slice(body);
        Self::new(PacketKind::Data, sender, payload, delivery, timestamp_ms)
    }

    pub fn discovery(sender: ConnectionId, mode: NetMode, timestamp_ms: u64) -> Self {
        Self::data(
            sender,
            EventCode::Discovery,
            &[mode.as_u8()],
            DeliveryMethod::Reliable,
            timestamp_ms,
        )
    }

    pub fn join_request(sender: ConnectionId, timestamp_ms: u64) -> Self {
        Self::data(
            sender,
            EventCode::JoinRequest,
            &[],
            DeliveryMethod::Reliable,
            timestamp_ms,
        )
    }

    pub fn join_response(
        sender: ConnectionId,
        response: CommonResponse,
        timestamp_ms: u64,
    ) -> Self {
        Self::data(
            sender,
            EventCode::JoinResponse,
            &[response.as_u8()],
            DeliveryMethod::Reliable,
            timestamp_ms,
        )
    }

    pub fn connection_approval(sender: ConnectionId, timestamp_ms: u64) -> Self {
        Self::new(
            PacketKind::ConnectionResponse,
            sender,
            vec![1],
            DeliveryMethod::Reliable,
            timestamp_ms,
        )
    }

    pub fn connection_denial(sender: ConnectionId, reason: &str, timestamp_ms: u64) -> Self {
        let mut payload = vec![0];
        payload.extend(ascii_bytes(reason));
        Self::new(
            PacketKind::ConnectionResponse,
            sender,
            payload,
            DeliveryMethod::Reliable,
            timestamp_ms,
        )
    }

    pub fn disconnection_notice(
        sender: ConnectionId,
        reason: DisconnectReason,
        timestamp_ms: u64,
    ) -> Self {
        Self::new(
            PacketKind::DisconnectionResponse,
            sender,
            vec![reason.as_u8()],
            DeliveryMethod::Reliable,
            timestamp_ms,
        )
    }

    pub fn error(sender: ConnectionId, code: ErrorCode, message: &str, timestamp_ms: u64) -> Self {
        let mut payload = vec![code.as_u8()];
        payload.extend(ascii_bytes(message));
        Self::new(
            PacketKind::Error,
            sender,
            payload,
            DeliveryMethod::Reliable,
            timestamp_ms,
        )
    }

    pub fn kind(&self) -> PacketKind {
        self.kind
    }

    pub fn sender(&self) -> ConnectionId {
        self.sender
    }

    pub fn delivery(&self) -> DeliveryMethod {
        self.delivery
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    pub fn byte(&self, index: usize) -> Option<u8> {
        self.payload.get(index).copied()
    }

    /// Event code of a Data packet. `None` for other kinds or an empty payload.
    pub fn event_code(&self) -> Option<Result<EventCode, UnknownCode>> {
        if self.kind != PacketKind::Data {
            return None;
        }
        self.byte(EVENT_CODE_INDEX).map(EventCode::try_from)
    }

    pub fn is_error(&self) -> bool {
        match self.kind {
            PacketKind::ConnectionResponse => self.byte(0) == Some(0),
            PacketKind::DisconnectionResponse => self
                .byte(0)
                .is_some_and(|code| code != DisconnectReason::Request.as_u8()),
            PacketKind::Error => true,
            _ => false,
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>, PacketError> {
        rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(PacketError::Serialize)
    }

    /// Copies into an aligned buffer first; datagram buffers carry no
    /// alignment guarantee.
    pub fn deserialize(data: &[u8]) -> Result<Self, PacketError> {
        let mut aligned = AlignedVec::<16>::with_capacity(data.len());
        aligned.extend_from_slice(data);
        rkyv::from_bytes::<Self, rancor::Error>(&aligned).map_err(PacketError::Deserialize)
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|Sender: {}|Packet Type: {:?}|",
            self.timestamp_ms, self.sender, self.kind
        )?;

        match self.kind {
            PacketKind::ConnectionResponse => {
                if self.byte(0) == Some(1) {
                    write!(f, "Connection Approved")
                } else {
                    write!(f, "Connection Denied: {}", text_from(&self.payload, 1))
                }
            }
            PacketKind::DisconnectionResponse => match self.byte(0).map(DisconnectReason::try_from)
            {
                Some(Ok(reason)) => write!(f, "{reason:?}"),
                _ => write!(f, "Unknown"),
            },
            PacketKind::Data => write!(f, "Data{}", text_from(&self.payload, 0)),
            PacketKind::Error => {
                let code = self
                    .byte(0)
                    .and_then(|b| ErrorCode::try_from(b).ok())
                    .unwrap_or(ErrorCode::Generic);
                write!(f, "{code:?}{}", text_from(&self.payload, 1))
            }
            _ => Ok(()),
        }
    }
}

pub fn unix_time_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

/// One byte per character. Anything outside ASCII becomes `?`.
pub fn ascii_bytes(text: &str) -> impl Iterator<Item = u8> + '_ {
    text.chars()
        .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
}

pub fn text_from(bytes: &[u8], offset: usize) -> String {
    bytes
        .get(offset..)
        .unwrap_or_default()
        .iter()
        .map(|&b| b as char)
        .collect()
}
