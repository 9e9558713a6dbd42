mod entity;
mod kind;
mod registry;
mod transform;

pub use entity::{EntityKind, NetRole, Replicate, ReplicatedEntity, ReplicatedEntityId};
pub use kind::KindTable;
pub use registry::{
    create_entity_packet, parse_create, parse_update, update_packet, ApplyOutcome,
    ReplicationRegistry, CREATE_ENTITY_SIZE, ENTITY_ID_INDEX, ENTITY_KIND_INDEX,
    REPLICATION_HEADER_SIZE,
};
pub use transform::{TransformEncoding, TransformReplica};
