//! Entity - Opaque identities
//!
//! Entities carry no data of their own. The registry hands out ids from a
//! monotonic counter, so an id is never reused after its entity is destroyed.

use std::collections::BTreeSet;
use std::fmt;

use loom_core::IdGenerator;

/// Opaque entity identifier
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(u64);

impl EntityId {
    /// Get the raw bits
    #[inline]
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    /// Create from raw bits.
    ///
    /// Mostly useful for tests and diagnostics; ids that were not issued by a
    /// registry are simply never alive.
    #[inline]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The set of live entities.
///
/// Iteration order is ascending id, which equals creation order.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    ids: IdGenerator,
    live: BTreeSet<EntityId>,
}

impl EntityRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new live entity
    pub fn create(&mut self) -> EntityId {
        let entity = EntityId(self.ids.next().to_bits());
        self.live.insert(entity);
        entity
    }

    /// Destroy an entity. Returns `false` if it was not alive.
    pub fn destroy(&mut self, entity: EntityId) -> bool {
        self.live.remove(&entity)
    }

    /// Check if an entity is alive
    #[inline]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.live.contains(&entity)
    }

    /// Number of live entities
    #[inline]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Iterate live entities
    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.live.iter().copied()
    }

    /// Copy of the live set, safe to hold across mutation
    pub fn snapshot(&self) -> Vec<EntityId> {
        self.live.iter().copied().collect()
    }
}
