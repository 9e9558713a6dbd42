use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ReplicationError;

/// Session-unique entity id, assigned by the server. Zero is reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReplicatedEntityId(u8);

impl ReplicatedEntityId {
    pub const INVALID: Self = Self(0);

    pub const fn new(raw: u8) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u8 {
        self.0
    }

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl fmt::Display for ReplicatedEntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKind(u8);

impl EntityKind {
    pub const TRANSFORM: Self = Self(0);
    pub const TRANSFORM_DELTA: Self = Self(1);

    pub const fn new(raw: u8) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u8 {
        self.0
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetRole {
    Authoritative,
    Proxy,
}

/// `serialize` produces only the kind-specific bytes; the registry adds the
/// replication header.
pub trait Replicate: Any + Send + fmt::Debug {
    fn kind(&self) -> EntityKind;

    fn serialize(&mut self) -> Vec<u8>;

    /// Must reject input whose length does not match the encoding exactly,
    /// leaving state untouched.
    fn apply(&mut self, bytes: &[u8]) -> Result<(), ReplicationError>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

#[derive(Debug)]
pub struct ReplicatedEntity {
    pub id: ReplicatedEntityId,
    pub role: NetRole,
    pub replicate_each_tick: bool,
    pub state: Box<dyn Replicate>,
}

impl ReplicatedEntity {
    pub fn new(
        id: ReplicatedEntityId,
        role: NetRole,
        replicate_each_tick: bool,
        state: Box<dyn Replicate>,
    ) -> Self {
        Self {
            id,
            role,
            replicate_each_tick,
            state,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.state.kind()
    }

    pub fn is_authoritative(&self) -> bool {
        self.role == NetRole::Authoritative
    }

    pub fn state<T: Replicate>(&self) -> Option<&T> {
        self.state.as_any().downcast_ref()
    }

    pub fn state_mut<T: Replicate>(&mut self) -> Option<&mut T> {
        self.state.as_any_mut().downcast_mut()
    }
}
