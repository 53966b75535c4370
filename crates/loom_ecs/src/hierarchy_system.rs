//! Transform propagation
//!
//! Recomputes [`GlobalTransform`] top-down from every root. Walks use an
//! explicit stack over entity ids, so deep hierarchies cannot overflow the
//! call stack.

use std::collections::HashSet;

use glam::Mat4;

use crate::entity::EntityId;
use crate::hierarchy::{Children, GlobalTransform, LocalTransform, Parent};
use crate::world::World;

/// Recomputes world transforms for the whole world.
///
/// Must run after anything that mutates local transforms and before anything
/// that reads world positions in the same tick.
pub struct TransformPropagation;

impl TransformPropagation {
    /// Propagate from every parentless entity that has a `LocalTransform` or
    /// `Children`. Returns the number of entities updated.
    pub fn run(world: &mut World) -> usize {
        let roots: Vec<EntityId> = world
            .entities()
            .filter(|&entity| {
                !world.has::<Parent>(entity)
                    && (world.has::<LocalTransform>(entity) || world.has::<Children>(entity))
            })
            .collect();

        roots
            .into_iter()
            .map(|root| propagate_subtree(world, root, Mat4::IDENTITY))
            .sum()
    }
}

/// Local matrix of an entity, identity if it has no `LocalTransform`
pub(crate) fn local_matrix(world: &World, entity: EntityId) -> Mat4 {
    world
        .get::<LocalTransform>(entity)
        .map(LocalTransform::to_matrix)
        .unwrap_or(Mat4::IDENTITY)
}

/// Recompute `start` and all of its descendants, with `parent_world` as the
/// world transform `start` hangs off. Returns the number of entities updated.
pub(crate) fn propagate_subtree(world: &mut World, start: EntityId, parent_world: Mat4) -> usize {
    let mut stack = vec![(start, parent_world)];
    let mut visited = HashSet::new();
    let mut updated = 0;

    while let Some((entity, parent_world)) = stack.pop() {
        if !visited.insert(entity) {
            log::warn!("transform propagation reached {:?} twice; hierarchy is corrupt", entity);
            continue;
        }
        if !world.is_alive(entity) {
            log::warn!("transform propagation skipped dead entity {:?}", entity);
            continue;
        }

        let world_matrix = parent_world * local_matrix(world, entity);
        if let Err(err) = world.upsert(entity, GlobalTransform(world_matrix)) {
            log::warn!("failed to cache world transform of {:?}: {}", entity, err);
            continue;
        }
        updated += 1;

        if let Some(children) = world.get::<Children>(entity) {
            // Reverse so the first child is processed first
            stack.extend(children.iter().rev().map(|child| (child, world_matrix)));
        }
    }

    updated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy_commands::HierarchyCommands;
    use approx::assert_relative_eq;

    #[test]
    fn test_propagates_through_chain() {
        let mut world = World::new();
        let root = world.spawn();
        let child = world.spawn();
        let grandchild = world.spawn();
        world.add(root, LocalTransform::from_xyz(1.0, 0.0, 0.0)).unwrap();
        world.add(child, LocalTransform::from_xyz(0.0, 2.0, 0.0)).unwrap();
        world.add(grandchild, LocalTransform::from_xyz(0.0, 0.0, 3.0)).unwrap();

        {
            let mut commands = HierarchyCommands::new(&mut world);
            commands.add_child(root, child).unwrap();
            commands.add_child(child, grandchild).unwrap();
        }

        // Mutate locals behind the commands' back, then propagate
        world.get_mut::<LocalTransform>(root).unwrap().0.translation.x = 10.0;
        assert_eq!(TransformPropagation::run(&mut world), 3);

        let t = world.get::<GlobalTransform>(grandchild).unwrap().translation();
        assert_relative_eq!(t.x, 10.0);
        assert_relative_eq!(t.y, 2.0);
        assert_relative_eq!(t.z, 3.0);
    }

    #[test]
    fn test_entities_without_transforms_are_ignored() {
        let mut world = World::new();
        let plain = world.spawn();

        assert_eq!(TransformPropagation::run(&mut world), 0);
        assert!(world.get::<GlobalTransform>(plain).is_none());
    }

    #[test]
    fn test_deep_hierarchy() {
        let mut world = World::new();
        let mut parent = world.spawn();
        world.add(parent, LocalTransform::from_xyz(1.0, 0.0, 0.0)).unwrap();
        let root = parent;

        for _ in 0..500 {
            let child = world.spawn();
            world.add(child, LocalTransform::from_xyz(1.0, 0.0, 0.0)).unwrap();
            HierarchyCommands::new(&mut world).add_child(parent, child).unwrap();
            parent = child;
        }

        assert_eq!(TransformPropagation::run(&mut world), 501);
        let leaf = world.get::<GlobalTransform>(parent).unwrap().translation();
        assert_relative_eq!(leaf.x, 501.0);
        assert!(world.get::<GlobalTransform>(root).is_some());
    }
}
