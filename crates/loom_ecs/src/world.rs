//! World - Entity registry plus component store
//!
//! The world is the single mutation authority for entities and components.
//! It guarantees that no component exists for an entity that is not alive.

use crate::component::Component;
use crate::entity::{EntityId, EntityRegistry};
use crate::error::{EcsError, Result};
use crate::hierarchy::{Children, Parent};
use crate::store::ComponentStore;

/// Container for all entity and component data
#[derive(Debug, Default)]
pub struct World {
    entities: EntityRegistry,
    components: ComponentStore,
}

impl World {
    /// Create an empty world
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn an entity with no components
    pub fn spawn(&mut self) -> EntityId {
        self.entities.create()
    }

    /// Start building an entity; see [`EntityBuilder`]
    pub fn build_entity(&mut self) -> EntityBuilder<'_> {
        let entity = self.spawn();
        EntityBuilder {
            world: self,
            entity,
            committed: false,
        }
    }

    /// Despawn an entity and delete all of its components.
    ///
    /// The entity is unlinked from the hierarchy: it leaves its parent's
    /// [`Children`] and its own children become roots. Use
    /// `HierarchyCommands::despawn_recursive` to take the subtree with it.
    pub fn despawn(&mut self, entity: EntityId) -> bool {
        if !self.entities.destroy(entity) {
            return false;
        }
        self.unlink(entity);
        let removed = self.components.delete_all(entity);
        log::trace!("despawned {:?} ({} component types)", entity, removed);
        true
    }

    fn unlink(&mut self, entity: EntityId) {
        if let Some(parent) = self.components.try_get::<Parent>(entity).map(Parent::get) {
            let now_empty = match self.components.get_mut::<Children>(parent) {
                Some(children) => {
                    children.remove(entity);
                    children.is_empty()
                }
                None => false,
            };
            if now_empty {
                self.components.delete::<Children>(parent);
            }
        }

        let orphans = self
            .components
            .try_get::<Children>(entity)
            .map(|children| children.as_slice().to_vec())
            .unwrap_or_default();
        for child in orphans {
            self.components.delete::<Parent>(child);
        }
    }

    /// Check if an entity is alive
    #[inline]
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.entities.contains(entity)
    }

    /// Number of live entities
    #[inline]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Iterate live entities
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.iter()
    }

    /// The entity registry
    pub fn registry(&self) -> &EntityRegistry {
        &self.entities
    }

    /// Read access to the component store
    pub fn components(&self) -> &ComponentStore {
        &self.components
    }

    /// Add a component to a live entity
    pub fn add<T: Component>(&mut self, entity: EntityId, component: T) -> Result<()> {
        if !self.is_alive(entity) {
            return Err(EcsError::EntityNotFound(entity));
        }
        self.components.add(entity, component)
    }

    /// Remove all instances of `T` from an entity
    pub fn remove<T: Component>(&mut self, entity: EntityId) -> bool {
        self.components.delete::<T>(entity)
    }

    /// Get a component
    pub fn get<T: Component>(&self, entity: EntityId) -> Option<&T> {
        self.components.try_get::<T>(entity)
    }

    /// Get a component mutably
    pub fn get_mut<T: Component>(&mut self, entity: EntityId) -> Option<&mut T> {
        self.components.get_mut::<T>(entity)
    }

    /// Check if an entity has a component
    pub fn has<T: Component>(&self, entity: EntityId) -> bool {
        self.components.contains::<T>(entity)
    }

    /// Replace the component if present, add it otherwise.
    ///
    /// Returns the previous value. Only for single-instance components
    /// owned by the engine (cached transforms and the like).
    pub(crate) fn upsert<T: Component>(&mut self, entity: EntityId, component: T) -> Result<Option<T>> {
        match self.components.get_mut::<T>(entity) {
            Some(slot) => Ok(Some(std::mem::replace(slot, component))),
            None => self.add(entity, component).map(|()| None),
        }
    }
}

/// Builds an entity component by component.
///
/// If any step fails, or the builder is dropped before [`finish`](Self::finish),
/// the entity and everything added so far is removed.
///
/// ```ignore
/// let player = world
///     .build_entity()
///     .with(Position::default())?
///     .with(Health(100.0))?
///     .finish();
/// ```
pub struct EntityBuilder<'w> {
    world: &'w mut World,
    entity: EntityId,
    committed: bool,
}

impl<'w> EntityBuilder<'w> {
    /// The entity being built
    pub fn id(&self) -> EntityId {
        self.entity
    }

    /// Add a component, rolling the entity back on failure
    pub fn with<T: Component>(self, component: T) -> Result<Self> {
        // On error `self` drops here and the entity is despawned
        self.world.add(self.entity, component)?;
        Ok(self)
    }

    /// Keep the entity
    pub fn finish(mut self) -> EntityId {
        self.committed = true;
        self.entity
    }
}

impl Drop for EntityBuilder<'_> {
    fn drop(&mut self) {
        if !self.committed {
            log::debug!("rolling back partially built entity {:?}", self.entity);
            self.world.despawn(self.entity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Health(u32);
    impl Component for Health {}

    #[derive(Debug, PartialEq)]
    struct Name(&'static str);
    impl Component for Name {}

    #[test]
    fn test_spawn_and_despawn() {
        let mut world = World::new();
        let e = world.spawn();
        world.add(e, Health(3)).unwrap();

        assert!(world.is_alive(e));
        assert_eq!(world.entity_count(), 1);

        assert!(world.despawn(e));
        assert!(!world.is_alive(e));
        assert!(world.get::<Health>(e).is_none());
        assert!(!world.despawn(e));
    }

    #[test]
    fn test_add_to_dead_entity() {
        let mut world = World::new();
        let e = world.spawn();
        world.despawn(e);

        assert_eq!(world.add(e, Health(1)), Err(EcsError::EntityNotFound(e)));
        assert!(!world.has::<Health>(e));
    }

    #[test]
    fn test_despawn_unlinks_hierarchy() {
        let mut world = World::new();
        let parent = world.spawn();
        let child = world.spawn();
        let grandchild = world.spawn();
        world.add(child, Parent::new(parent)).unwrap();
        world.add(parent, Children::with_child(child)).unwrap();
        world.add(grandchild, Parent::new(child)).unwrap();
        world.add(child, Children::with_child(grandchild)).unwrap();

        assert!(world.despawn(child));
        assert!(world.get::<Children>(parent).is_none());
        assert!(world.get::<Parent>(grandchild).is_none());
    }

    #[test]
    fn test_builder_commits() {
        let mut world = World::new();
        let e = world
            .build_entity()
            .with(Health(10))
            .and_then(|b| b.with(Name("orc")))
            .unwrap()
            .finish();

        assert_eq!(world.get::<Health>(e), Some(&Health(10)));
        assert_eq!(world.get::<Name>(e), Some(&Name("orc")));
    }

    #[test]
    fn test_builder_rolls_back_on_duplicate() {
        let mut world = World::new();
        let rejected = matches!(
            world.build_entity().with(Health(10)).and_then(|b| b.with(Health(20))),
            Err(EcsError::DuplicateComponent { .. })
        );

        assert!(rejected);
        assert_eq!(world.entity_count(), 0);
        assert_eq!(world.components().len_of::<Health>(), 0);
    }

    #[test]
    fn test_builder_rolls_back_when_dropped() {
        let mut world = World::new();
        {
            let builder = world.build_entity().with(Health(1)).unwrap();
            let _ = builder.id();
        }
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn test_upsert() {
        let mut world = World::new();
        let e = world.spawn();

        assert_eq!(world.upsert(e, Health(1)).unwrap(), None);
        assert_eq!(world.upsert(e, Health(2)).unwrap(), Some(Health(1)));
        assert_eq!(world.get::<Health>(e), Some(&Health(2)));
    }
}
