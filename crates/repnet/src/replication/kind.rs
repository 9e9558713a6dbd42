use std::collections::HashMap;
use std::fmt;

use super::entity::{EntityKind, Replicate};
use super::transform::{TransformEncoding, TransformReplica};
use crate::error::ReplicationError;

type Factory = Box<dyn Fn() -> Box<dyn Replicate> + Send>;

/// Kind-indexed table of state factories, used when an entity is created
/// from a CreateEntity packet rather than registered by the host.
pub struct KindTable {
    factories: HashMap<EntityKind, Factory>,
}

impl fmt::Debug for KindTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.factories.keys().collect();
        kinds.sort();
        f.debug_struct("KindTable").field("kinds", &kinds).finish()
    }
}

impl Default for KindTable {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl KindTable {
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn with_builtin() -> Self {
        let mut table = Self::empty();
        table.register(EntityKind::TRANSFORM, || {
            Box::new(TransformReplica::new(TransformEncoding::Matrix))
        });
        table.register(EntityKind::TRANSFORM_DELTA, || {
            Box::new(TransformReplica::new(TransformEncoding::Delta))
        });
        table
    }

    pub fn register<F>(&mut self, kind: EntityKind, factory: F)
    where
        F: Fn() -> Box<dyn Replicate> + Send + 'static,
    {
        self.factories.insert(kind, Box::new(factory));
    }

    pub fn contains(&self, kind: EntityKind) -> bool {
        self.factories.contains_key(&kind)
    }

    pub fn create(&self, kind: EntityKind) -> Result<Box<dyn Replicate>, ReplicationError> {
        self.factories
            .get(&kind)
            .map(|factory| factory())
            .ok_or(ReplicationError::UnknownKind(kind))
    }
}
