//! Hierarchy Commands API
//!
//! Validated mutation of the parent/child graph. Every operation keeps the
//! cached [`GlobalTransform`](crate::hierarchy::GlobalTransform)s of the
//! affected subtree consistent and rejects changes that would introduce a
//! cycle.
//!
//! # Usage
//!
//! ```ignore
//! let mut commands = HierarchyCommands::new(&mut world);
//!
//! // Child keeps its local transform, its world transform moves with the parent
//! commands.add_child(parent, child)?;
//!
//! // Child keeps its world transform, its local transform is recomputed
//! commands.add_child_in_place(parent, other)?;
//!
//! // Despawn entity and all descendants
//! commands.despawn_recursive(parent);
//! ```

use glam::Mat4;
use loom_math::Transform;

use crate::component::Component;
use crate::entity::EntityId;
use crate::error::HierarchyError;
use crate::hierarchy::{Children, LocalTransform, Parent};
use crate::hierarchy_system::{local_matrix, propagate_subtree};
use crate::world::World;

/// Upper bound on parent-link walks. Longer chains are treated as cycles.
pub const MAX_HIERARCHY_DEPTH: usize = 1024;

type Result<T> = std::result::Result<T, HierarchyError>;

/// Commands for manipulating the entity hierarchy
pub struct HierarchyCommands<'w> {
    world: &'w mut World,
}

impl<'w> HierarchyCommands<'w> {
    pub fn new(world: &'w mut World) -> Self {
        Self { world }
    }

    /// Attach `child` under `parent`, keeping the child's local transform.
    ///
    /// # Errors
    ///
    /// - [`HierarchyError::EntityNotFound`] if either entity is dead
    /// - [`HierarchyError::ChildAlreadyHasParent`] if `child` is attached elsewhere
    /// - [`HierarchyError::CircularReference`] if `parent` is `child` or one of its descendants
    pub fn add_child(&mut self, parent: EntityId, child: EntityId) -> Result<()> {
        self.check_attach(parent, child)?;
        self.attach(parent, child)?;

        let parent_world = self.world_transform(parent);
        propagate_subtree(self.world, child, parent_world);
        log::trace!("attached {:?} under {:?}", child, parent);
        Ok(())
    }

    /// Attach `child` under `parent`, keeping the child's world transform.
    ///
    /// The new local transform is `inverse(parent_world) * child_world`.
    /// Nothing is modified when it cannot be computed.
    pub fn add_child_in_place(&mut self, parent: EntityId, child: EntityId) -> Result<()> {
        self.check_attach(parent, child)?;

        let parent_world = self.world_transform(parent);
        let child_world = self.world_transform(child);
        let local = Transform::relative_to(&parent_world, &child_world).map_err(|source| {
            HierarchyError::UnableToCalculateRelativeLocalTransform {
                parent,
                child,
                source,
            }
        })?;

        self.attach(parent, child)?;
        self.world.upsert(child, LocalTransform(local))?;
        propagate_subtree(self.world, child, parent_world);
        Ok(())
    }

    /// Detach `child` from `parent`.
    ///
    /// The child's local transform is left as it was and becomes its world
    /// transform, so the child visibly jumps unless the parent was at the
    /// identity. See [`remove_child_in_place`](Self::remove_child_in_place).
    pub fn remove_child(&mut self, parent: EntityId, child: EntityId) -> Result<()> {
        self.check_detach(parent, child)?;
        self.detach(parent, child);
        propagate_subtree(self.world, child, Mat4::IDENTITY);
        Ok(())
    }

    /// Detach `child` from `parent`, rewriting its local transform so its
    /// world transform is unchanged.
    pub fn remove_child_in_place(&mut self, parent: EntityId, child: EntityId) -> Result<()> {
        self.check_detach(parent, child)?;

        let child_world = self.world_transform(child);
        let local = Transform::try_from_matrix(&child_world).map_err(|source| {
            HierarchyError::UnableToCalculateRelativeLocalTransform {
                parent,
                child,
                source,
            }
        })?;

        self.detach(parent, child);
        self.world.upsert(child, LocalTransform(local))?;
        propagate_subtree(self.world, child, Mat4::IDENTITY);
        Ok(())
    }

    /// Replace an entity's local transform and refresh its subtree
    pub fn set_local_transform(&mut self, entity: EntityId, transform: Transform) -> Result<()> {
        self.ensure_alive(entity)?;
        self.world.upsert(entity, LocalTransform(transform))?;

        let parent_world = self
            .parent_of(entity)
            .map(|parent| self.world_transform(parent))
            .unwrap_or(Mat4::IDENTITY);
        propagate_subtree(self.world, entity, parent_world);
        Ok(())
    }

    /// Despawn an entity and all of its descendants, detaching it from its
    /// parent first. Returns the number of entities despawned.
    pub fn despawn_recursive(&mut self, entity: EntityId) -> usize {
        if !self.world.is_alive(entity) {
            return 0;
        }
        if let Some(parent) = self.parent_of(entity) {
            self.detach(parent, entity);
        }

        let mut doomed = self.descendants(entity);
        doomed.push(entity);
        doomed
            .into_iter()
            .filter(|&e| self.world.despawn(e))
            .count()
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn parent_of(&self, entity: EntityId) -> Option<EntityId> {
        self.world.get::<Parent>(entity).map(Parent::get)
    }

    pub fn children_of(&self, entity: EntityId) -> Vec<EntityId> {
        self.world
            .get::<Children>(entity)
            .map(|children| children.as_slice().to_vec())
            .unwrap_or_default()
    }

    /// Ancestors from the direct parent up to the root
    pub fn ancestors(&self, entity: EntityId) -> Vec<EntityId> {
        let mut ancestors = Vec::new();
        let mut current = self.parent_of(entity);
        while let Some(parent) = current {
            if ancestors.len() >= MAX_HIERARCHY_DEPTH {
                log::error!("ancestor walk from {:?} exceeded depth bound", entity);
                break;
            }
            ancestors.push(parent);
            current = self.parent_of(parent);
        }
        ancestors
    }

    /// Topmost ancestor, or the entity itself if it has no parent
    pub fn root_of(&self, entity: EntityId) -> EntityId {
        self.ancestors(entity).last().copied().unwrap_or(entity)
    }

    /// Whether `candidate` is a (transitive) ancestor of `entity`
    pub fn is_ancestor(&self, entity: EntityId, candidate: EntityId) -> bool {
        self.parent_of(entity)
            .map(|parent| self.reaches(parent, candidate))
            .unwrap_or(false)
    }

    /// All descendants in depth-first pre-order
    pub fn descendants(&self, entity: EntityId) -> Vec<EntityId> {
        let mut result = Vec::new();
        let mut stack: Vec<EntityId> = self.children_of(entity).into_iter().rev().collect();
        while let Some(current) = stack.pop() {
            if result.contains(&current) {
                continue;
            }
            result.push(current);
            stack.extend(self.children_of(current).into_iter().rev());
        }
        result
    }

    /// World-space matrix composed from the local transforms up the parent
    /// chain. Does not read the cached
    /// [`GlobalTransform`](crate::hierarchy::GlobalTransform), which lags behind
    /// direct `LocalTransform` edits until propagation runs.
    pub fn world_transform(&self, entity: EntityId) -> Mat4 {
        let mut chain = vec![entity];
        chain.extend(self.ancestors(entity));
        chain
            .iter()
            .rev()
            .fold(Mat4::IDENTITY, |acc, &e| acc * local_matrix(self.world, e))
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn ensure_alive(&self, entity: EntityId) -> Result<()> {
        if self.world.is_alive(entity) {
            Ok(())
        } else {
            Err(HierarchyError::EntityNotFound(entity))
        }
    }

    fn check_attach(&self, parent: EntityId, child: EntityId) -> Result<()> {
        self.ensure_alive(parent)?;
        self.ensure_alive(child)?;

        if let Some(existing) = self.parent_of(child) {
            return Err(HierarchyError::ChildAlreadyHasParent {
                child,
                parent: existing,
            });
        }
        if self.reaches(parent, child) {
            return Err(HierarchyError::CircularReference { parent, child });
        }
        Ok(())
    }

    fn check_detach(&self, parent: EntityId, child: EntityId) -> Result<()> {
        self.ensure_alive(parent)?;
        self.ensure_alive(child)?;

        match self.parent_of(child) {
            Some(p) if p == parent => Ok(()),
            _ => Err(HierarchyError::NotAChild { parent, child }),
        }
    }

    /// Walk parent links from `from` (inclusive). True if `target` is met or
    /// the walk exceeds [`MAX_HIERARCHY_DEPTH`].
    fn reaches(&self, from: EntityId, target: EntityId) -> bool {
        let mut current = Some(from);
        let mut steps = 0;
        while let Some(entity) = current {
            if entity == target {
                return true;
            }
            steps += 1;
            if steps > MAX_HIERARCHY_DEPTH {
                log::error!("parent walk from {:?} exceeded depth bound", from);
                return true;
            }
            current = self.parent_of(entity);
        }
        false
    }

    fn attach(&mut self, parent: EntityId, child: EntityId) -> Result<()> {
        self.world.add(child, Parent::new(parent))?;

        if let Some(children) = self.world.get_mut::<Children>(parent) {
            children.push(child);
            return Ok(());
        }
        if let Err(err) = self.world.add(parent, Children::with_child(child)) {
            self.world.remove::<Parent>(child);
            return Err(err.into());
        }
        Ok(())
    }

    fn detach(&mut self, parent: EntityId, child: EntityId) {
        self.world.remove::<Parent>(child);

        let now_empty = match self.world.get_mut::<Children>(parent) {
            Some(children) => {
                children.remove(child);
                children.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.world.remove::<Children>(parent);
        }
    }
}

// ============================================================================
// Hierarchy Builder
// ============================================================================

/// Builds a subtree of entities as one unit.
///
/// When a step fails, every entity spawned by the builder so far is despawned
/// before the error is returned. Dropping the builder without calling
/// [`finish`](Self::finish) does the same.
///
/// ```ignore
/// let mut builder = HierarchyBuilder::new(&mut world);
/// let body = builder.spawn(None, LocalTransform::IDENTITY)?;
/// let arm = builder.spawn(Some(body), LocalTransform::from_xyz(1.0, 0.0, 0.0))?;
/// builder.insert(arm, Name("arm"))?;
/// let entities = builder.finish();
/// ```
pub struct HierarchyBuilder<'w> {
    world: &'w mut World,
    spawned: Vec<EntityId>,
    committed: bool,
}

impl<'w> HierarchyBuilder<'w> {
    pub fn new(world: &'w mut World) -> Self {
        Self {
            world,
            spawned: Vec::new(),
            committed: false,
        }
    }

    /// Spawn an entity with a local transform, attached under `parent` if given
    pub fn spawn(&mut self, parent: Option<EntityId>, local: LocalTransform) -> Result<EntityId> {
        let entity = self.world.spawn();
        self.spawned.push(entity);

        if let Err(err) = self.world.add(entity, local) {
            return self.fail(err.into());
        }

        let attached = match parent {
            Some(parent) => HierarchyCommands::new(self.world).add_child(parent, entity),
            None => {
                propagate_subtree(self.world, entity, Mat4::IDENTITY);
                Ok(())
            }
        };
        match attached {
            Ok(()) => Ok(entity),
            Err(err) => self.fail(err),
        }
    }

    /// Add a component to an entity of this subtree
    pub fn insert<T: Component>(&mut self, entity: EntityId, component: T) -> Result<()> {
        match self.world.add(entity, component) {
            Ok(()) => Ok(()),
            Err(err) => self.fail(err.into()),
        }
    }

    /// Entities spawned so far, in spawn order
    pub fn spawned(&self) -> &[EntityId] {
        &self.spawned
    }

    /// Keep everything that was built
    pub fn finish(mut self) -> Vec<EntityId> {
        self.committed = true;
        std::mem::take(&mut self.spawned)
    }

    fn fail<T>(&mut self, err: HierarchyError) -> Result<T> {
        log::debug!("hierarchy builder failed ({}), rolling back {} entities", err, self.spawned.len());
        self.rollback();
        Err(err)
    }

    fn rollback(&mut self) {
        let mut commands = HierarchyCommands::new(self.world);
        for entity in self.spawned.drain(..).rev() {
            commands.despawn_recursive(entity);
        }
    }
}

impl Drop for HierarchyBuilder<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.rollback();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::GlobalTransform;
    use approx::assert_relative_eq;
    use glam::{Quat, Vec3};
    use loom_math::TransformError;

    fn spawn_at(world: &mut World, x: f32, y: f32, z: f32) -> EntityId {
        let entity = world.spawn();
        world.add(entity, LocalTransform::from_xyz(x, y, z)).unwrap();
        entity
    }

    fn world_translation(world: &World, entity: EntityId) -> Vec3 {
        world.get::<GlobalTransform>(entity).unwrap().translation()
    }

    #[test]
    fn test_add_child() {
        let mut world = World::new();
        let parent = spawn_at(&mut world, 5.0, 0.0, 0.0);
        let child = spawn_at(&mut world, 0.0, 1.0, 0.0);

        HierarchyCommands::new(&mut world).add_child(parent, child).unwrap();

        assert_eq!(world.get::<Parent>(child).map(Parent::get), Some(parent));
        assert!(world.get::<Children>(parent).unwrap().contains(child));

        let t = world_translation(&world, child);
        assert_relative_eq!(t.x, 5.0);
        assert_relative_eq!(t.y, 1.0);
    }

    #[test]
    fn test_child_already_has_parent() {
        let mut world = World::new();
        let a = world.spawn();
        let b = world.spawn();
        let child = world.spawn();

        let mut commands = HierarchyCommands::new(&mut world);
        commands.add_child(a, child).unwrap();

        assert_eq!(
            commands.add_child(b, child),
            Err(HierarchyError::ChildAlreadyHasParent { child, parent: a })
        );
        assert_eq!(commands.parent_of(child), Some(a));
        assert!(commands.children_of(b).is_empty());
    }

    #[test]
    fn test_cycle_detection() {
        let mut world = World::new();
        let a = world.spawn();
        let b = world.spawn();
        let c = world.spawn();

        let mut commands = HierarchyCommands::new(&mut world);
        commands.add_child(a, b).unwrap();
        commands.add_child(b, c).unwrap();

        // c -> a would close the loop a -> b -> c -> a
        assert_eq!(
            commands.add_child(c, a),
            Err(HierarchyError::CircularReference { parent: c, child: a })
        );
        assert_eq!(commands.parent_of(a), None);
        assert!(commands.children_of(c).is_empty());
        assert_eq!(commands.ancestors(c), vec![b, a]);
    }

    #[test]
    fn test_self_parent_rejected() {
        let mut world = World::new();
        let a = world.spawn();

        let mut commands = HierarchyCommands::new(&mut world);
        assert_eq!(
            commands.add_child(a, a),
            Err(HierarchyError::CircularReference { parent: a, child: a })
        );
    }

    #[test]
    fn test_dead_entities_rejected() {
        let mut world = World::new();
        let alive = world.spawn();
        let dead = world.spawn();
        world.despawn(dead);

        let mut commands = HierarchyCommands::new(&mut world);
        assert_eq!(commands.add_child(dead, alive), Err(HierarchyError::EntityNotFound(dead)));
        assert_eq!(commands.add_child(alive, dead), Err(HierarchyError::EntityNotFound(dead)));
    }

    #[test]
    fn test_remove_child_drops_parent_contribution() {
        let mut world = World::new();
        let parent = spawn_at(&mut world, 5.0, 0.0, 0.0);
        let child = spawn_at(&mut world, 1.0, 0.0, 0.0);

        let mut commands = HierarchyCommands::new(&mut world);
        commands.add_child(parent, child).unwrap();
        commands.remove_child(parent, child).unwrap();

        assert!(world.get::<Parent>(child).is_none());
        assert!(world.get::<Children>(parent).is_none());
        assert_relative_eq!(world_translation(&world, child).x, 1.0);
        assert_eq!(world.get::<LocalTransform>(child), Some(&LocalTransform::from_xyz(1.0, 0.0, 0.0)));
    }

    #[test]
    fn test_remove_child_not_a_child() {
        let mut world = World::new();
        let a = world.spawn();
        let b = world.spawn();
        let child = world.spawn();

        let mut commands = HierarchyCommands::new(&mut world);
        commands.add_child(a, child).unwrap();
        assert_eq!(
            commands.remove_child(b, child),
            Err(HierarchyError::NotAChild { parent: b, child })
        );
        assert_eq!(commands.parent_of(child), Some(a));
    }

    #[test]
    fn test_remove_child_in_place_keeps_world_position() {
        let mut world = World::new();
        let parent = spawn_at(&mut world, 5.0, 0.0, 0.0);
        let child = spawn_at(&mut world, 1.0, 0.0, 0.0);

        let mut commands = HierarchyCommands::new(&mut world);
        commands.add_child(parent, child).unwrap();
        commands.remove_child_in_place(parent, child).unwrap();

        assert_relative_eq!(world_translation(&world, child).x, 6.0);
        let local = world.get::<LocalTransform>(child).unwrap();
        assert_relative_eq!(local.0.translation.x, 6.0);
    }

    #[test]
    fn test_add_child_in_place_round_trip() {
        let mut world = World::new();
        let parent = world.spawn();
        world
            .add(
                parent,
                LocalTransform(Transform::new(
                    Vec3::new(3.0, -1.0, 2.0),
                    Quat::from_rotation_y(1.1),
                    Vec3::splat(2.5),
                )),
            )
            .unwrap();
        let child = spawn_at(&mut world, 1.0, 2.0, 3.0);

        let mut commands = HierarchyCommands::new(&mut world);
        let before = commands.world_transform(child);
        commands.add_child_in_place(parent, child).unwrap();
        let after = commands.world_transform(child);

        assert!(after.abs_diff_eq(before, 1e-4));
        assert_eq!(commands.parent_of(child), Some(parent));
    }

    #[test]
    fn test_add_child_in_place_singular_parent() {
        let mut world = World::new();
        let parent = world.spawn();
        world
            .add(parent, LocalTransform(Transform::from_scale(Vec3::new(0.0, 1.0, 1.0))))
            .unwrap();
        let child = spawn_at(&mut world, 1.0, 0.0, 0.0);

        let mut commands = HierarchyCommands::new(&mut world);
        let result = commands.add_child_in_place(parent, child);

        assert!(matches!(
            result,
            Err(HierarchyError::UnableToCalculateRelativeLocalTransform {
                source: TransformError::NotInvertible { .. },
                ..
            })
        ));
        assert_eq!(commands.parent_of(child), None);
        assert!(commands.children_of(parent).is_empty());
        assert_eq!(world.get::<LocalTransform>(child), Some(&LocalTransform::from_xyz(1.0, 0.0, 0.0)));
    }

    #[test]
    fn test_set_local_transform_updates_subtree() {
        let mut world = World::new();
        let root = spawn_at(&mut world, 0.0, 0.0, 0.0);
        let child = spawn_at(&mut world, 1.0, 0.0, 0.0);

        let mut commands = HierarchyCommands::new(&mut world);
        commands.add_child(root, child).unwrap();
        commands
            .set_local_transform(root, Transform::from_xyz(0.0, 10.0, 0.0))
            .unwrap();

        let t = world_translation(&world, child);
        assert_relative_eq!(t.x, 1.0);
        assert_relative_eq!(t.y, 10.0);
    }

    #[test]
    fn test_get_root_and_is_ancestor() {
        let mut world = World::new();
        let root = world.spawn();
        let child = world.spawn();
        let grandchild = world.spawn();

        let mut commands = HierarchyCommands::new(&mut world);
        commands.add_child(root, child).unwrap();
        commands.add_child(child, grandchild).unwrap();

        assert_eq!(commands.root_of(grandchild), root);
        assert_eq!(commands.root_of(root), root);
        assert!(commands.is_ancestor(grandchild, root));
        assert!(!commands.is_ancestor(root, grandchild));
        assert_eq!(commands.descendants(root), vec![child, grandchild]);
    }

    #[test]
    fn test_despawn_recursive() {
        let mut world = World::new();
        let keeper = world.spawn();
        let root = world.spawn();
        let child1 = world.spawn();
        let child2 = world.spawn();
        let grandchild = world.spawn();

        let mut commands = HierarchyCommands::new(&mut world);
        commands.add_child(keeper, root).unwrap();
        commands.add_child(root, child1).unwrap();
        commands.add_child(root, child2).unwrap();
        commands.add_child(child1, grandchild).unwrap();

        assert_eq!(commands.despawn_recursive(root), 4);
        assert!(commands.children_of(keeper).is_empty());
        assert_eq!(world.entity_count(), 1);
    }

    #[test]
    fn test_builder_commits_subtree() {
        let mut world = World::new();
        let mut builder = HierarchyBuilder::new(&mut world);
        let body = builder.spawn(None, LocalTransform::from_xyz(1.0, 0.0, 0.0)).unwrap();
        let arm = builder.spawn(Some(body), LocalTransform::from_xyz(0.0, 1.0, 0.0)).unwrap();
        let spawned = builder.finish();

        assert_eq!(spawned, vec![body, arm]);
        let t = world_translation(&world, arm);
        assert_relative_eq!(t.x, 1.0);
        assert_relative_eq!(t.y, 1.0);
    }

    #[test]
    fn test_builder_rolls_back_on_failure() {
        let mut world = World::new();
        let anchor = world.spawn();

        let mut builder = HierarchyBuilder::new(&mut world);
        let body = builder.spawn(Some(anchor), LocalTransform::IDENTITY).unwrap();
        builder.spawn(Some(body), LocalTransform::IDENTITY).unwrap();

        let duplicate = builder.insert(body, LocalTransform::IDENTITY);
        assert!(matches!(duplicate, Err(HierarchyError::Component(_))));
        assert!(builder.spawned().is_empty());
        drop(builder);

        assert_eq!(world.entity_count(), 1);
        assert!(world.get::<Children>(anchor).is_none());
    }
}
