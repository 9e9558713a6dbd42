use std::collections::BTreeMap;

use super::entity::{EntityKind, NetRole, ReplicatedEntity, ReplicatedEntityId};
use super::kind::KindTable;
use crate::error::ReplicationError;
use crate::net::{ConnectionId, DeliveryMethod, EventCode, Packet};

pub const ENTITY_ID_INDEX: usize = 1;
pub const ENTITY_KIND_INDEX: usize = 2;
pub const REPLICATION_HEADER_SIZE: usize = 2;
pub const CREATE_ENTITY_SIZE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied(ReplicatedEntityId),
    /// The local copy is the source of truth; the update was ignored.
    Authoritative(ReplicatedEntityId),
    Unknown(ReplicatedEntityId),
}

pub fn update_packet(
    sender: ConnectionId,
    id: ReplicatedEntityId,
    body: &[u8],
    timestamp_ms: u64,
) -> Packet {
    let mut bytes = Vec::with_capacity(1 + body.len());
    bytes.push(id.raw());
    bytes.extend_from_slice(body);
    Packet::data(
        sender,
        EventCode::ReplicationUpdate,
        &bytes,
        DeliveryMethod::Unreliable,
        timestamp_ms,
    )
}

pub fn create_entity_packet(
    sender: ConnectionId,
    id: ReplicatedEntityId,
    kind: EntityKind,
    timestamp_ms: u64,
) -> Packet {
    Packet::data(
        sender,
        EventCode::CreateEntity,
        &[id.raw(), kind.raw()],
        DeliveryMethod::Reliable,
        timestamp_ms,
    )
}

pub fn parse_update(payload: &[u8]) -> Result<(ReplicatedEntityId, &[u8]), ReplicationError> {
    if payload.len() < REPLICATION_HEADER_SIZE {
        return Err(ReplicationError::Length {
            expected: REPLICATION_HEADER_SIZE,
            actual: payload.len(),
        });
    }

    let id = ReplicatedEntityId::new(payload[ENTITY_ID_INDEX]);
    if !id.is_valid() {
        return Err(ReplicationError::InvalidId);
    }
    Ok((id, &payload[REPLICATION_HEADER_SIZE..]))
}

/// The id may be invalid: that is how a client asks the server to pick one.
pub fn parse_create(payload: &[u8]) -> Result<(ReplicatedEntityId, EntityKind), ReplicationError> {
    if payload.len() != CREATE_ENTITY_SIZE {
        return Err(ReplicationError::Length {
            expected: CREATE_ENTITY_SIZE,
            actual: payload.len(),
        });
    }
    Ok((
        ReplicatedEntityId::new(payload[ENTITY_ID_INDEX]),
        EntityKind::new(payload[ENTITY_KIND_INDEX]),
    ))
}

#[derive(Debug, Default)]
pub struct ReplicationRegistry {
    entities: BTreeMap<ReplicatedEntityId, ReplicatedEntity>,
    kinds: KindTable,
    next_id: u8,
}

impl ReplicationRegistry {
    pub fn new(kinds: KindTable) -> Self {
        Self {
            entities: BTreeMap::new(),
            kinds,
            next_id: 1,
        }
    }

    pub fn kinds(&self) -> &KindTable {
        &self.kinds
    }

    pub fn kinds_mut(&mut self) -> &mut KindTable {
        &mut self.kinds
    }

    pub fn register(&mut self, entity: ReplicatedEntity) -> Result<(), ReplicationError> {
        if !entity.id.is_valid() {
            return Err(ReplicationError::InvalidId);
        }
        if self.entities.contains_key(&entity.id) {
            return Err(ReplicationError::DuplicateId(entity.id));
        }
        self.entities.insert(entity.id, entity);
        Ok(())
    }

    pub fn spawn(
        &mut self,
        id: ReplicatedEntityId,
        kind: EntityKind,
        role: NetRole,
        replicate_each_tick: bool,
    ) -> Result<(), ReplicationError> {
        if self.entities.contains_key(&id) {
            return Err(ReplicationError::DuplicateId(id));
        }
        let state = self.kinds.create(kind)?;
        self.register(ReplicatedEntity::new(id, role, replicate_each_tick, state))
    }

    pub fn remove(&mut self, id: ReplicatedEntityId) -> Option<ReplicatedEntity> {
        self.entities.remove(&id)
    }

    pub fn get(&self, id: ReplicatedEntityId) -> Option<&ReplicatedEntity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: ReplicatedEntityId) -> Option<&mut ReplicatedEntity> {
        self.entities.get_mut(&id)
    }

    pub fn contains(&self, id: ReplicatedEntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReplicatedEntity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Next unused id, scanning forward from the last one handed out.
    pub fn allocate_id(&mut self) -> Result<ReplicatedEntityId, ReplicationError> {
        let start = self.next_id.max(1);
        let mut candidate = start;
        loop {
            let id = ReplicatedEntityId::new(candidate);
            candidate = if candidate == u8::MAX { 1 } else { candidate + 1 };
            if !self.entities.contains_key(&id) {
                self.next_id = candidate;
                return Ok(id);
            }
            if candidate == start {
                return Err(ReplicationError::IdsExhausted);
            }
        }
    }

    pub fn collect_updates(&mut self, sender: ConnectionId, timestamp_ms: u64) -> Vec<Packet> {
        self.entities
            .values_mut()
            .filter(|e| e.is_authoritative() && e.replicate_each_tick)
            .map(|e| update_packet(sender, e.id, &e.state.serialize(), timestamp_ms))
            .collect()
    }

    pub fn apply_update(&mut self, payload: &[u8]) -> Result<ApplyOutcome, ReplicationError> {
        let (id, body) = parse_update(payload)?;

        let Some(entity) = self.entities.get_mut(&id) else {
            return Ok(ApplyOutcome::Unknown(id));
        };

        match entity.role {
            NetRole::Authoritative => Ok(ApplyOutcome::Authoritative(id)),
            NetRole::Proxy => {
                entity.state.apply(body)?;
                Ok(ApplyOutcome::Applied(id))
            }
        }
    }
}
