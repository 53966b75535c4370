//! Integration tests for hierarchy commands and transform caching

use approx::assert_relative_eq;
use glam::{Quat, Vec3};
use loom_ecs::*;
use loom_math::Transform;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn global(world: &World, entity: EntityId) -> GlobalTransform {
    *world.get::<GlobalTransform>(entity).unwrap()
}

#[test]
fn test_attach_and_detach_scenario() {
    let mut world = World::new();

    let parent = world.spawn();
    world.add(parent, LocalTransform::from_xyz(5.0, 0.0, 0.0)).unwrap();
    let child = world.spawn();
    world.add(child, LocalTransform::from_xyz(0.0, 0.0, 0.0)).unwrap();

    // Root: world equals local
    TransformPropagation::run(&mut world);
    assert_eq!(global(&world, child), GlobalTransform::from_local(&LocalTransform::IDENTITY));

    // Attached: parent offset applies
    HierarchyCommands::new(&mut world).add_child(parent, child).unwrap();
    let attached = global(&world, child).translation();
    assert_relative_eq!(attached.x, 5.0);
    assert_relative_eq!(attached.y, 0.0);

    // Detached: world reverts to the unchanged local, offset is lost
    HierarchyCommands::new(&mut world).remove_child(parent, child).unwrap();
    let detached = global(&world, child).translation();
    assert_relative_eq!(detached.x, 0.0);
    assert_eq!(world.get::<LocalTransform>(child), Some(&LocalTransform::IDENTITY));
}

#[test]
fn test_child_with_local_offset() {
    let mut world = World::new();
    let parent = world.spawn();
    world.add(parent, LocalTransform::from_xyz(5.0, 0.0, 0.0)).unwrap();
    let child = world.spawn();
    world.add(child, LocalTransform::from_xyz(1.0, 2.0, 3.0)).unwrap();

    HierarchyCommands::new(&mut world).add_child(parent, child).unwrap();

    let t = global(&world, child).translation();
    assert_relative_eq!(t.x, 6.0);
    assert_relative_eq!(t.y, 2.0);
    assert_relative_eq!(t.z, 3.0);
}

#[test]
fn test_cycle_rejected_for_any_chain_length() {
    init_logging();
    for length in 2..8 {
        let mut world = World::new();
        let chain: Vec<EntityId> = (0..length).map(|_| world.spawn()).collect();

        let mut commands = HierarchyCommands::new(&mut world);
        for pair in chain.windows(2) {
            commands.add_child(pair[0], pair[1]).unwrap();
        }

        let first = chain[0];
        let last = chain[length - 1];
        let result = commands.add_child(last, first);
        assert_eq!(
            result,
            Err(HierarchyError::CircularReference { parent: last, child: first })
        );

        // Hierarchy unchanged
        assert_eq!(commands.parent_of(first), None);
        assert!(commands.children_of(last).is_empty());
        for pair in chain.windows(2) {
            assert_eq!(commands.parent_of(pair[1]), Some(pair[0]));
        }
    }
}

#[test]
fn test_in_place_attach_preserves_world_transform() {
    let parents = [
        Transform::from_xyz(5.0, 0.0, 0.0),
        Transform::new(Vec3::new(-2.0, 4.0, 1.0), Quat::from_rotation_z(0.8), Vec3::ONE),
        Transform::new(Vec3::ZERO, Quat::from_rotation_x(-1.3), Vec3::splat(0.5)),
        Transform::new(Vec3::new(10.0, 10.0, 10.0), Quat::IDENTITY, Vec3::new(2.0, 3.0, 4.0)),
    ];

    for parent_transform in parents {
        let mut world = World::new();
        let parent = world.spawn();
        world.add(parent, LocalTransform(parent_transform)).unwrap();
        let child = world.spawn();
        world
            .add(child, LocalTransform(Transform::from_xyz(1.0, -1.0, 2.0)))
            .unwrap();
        TransformPropagation::run(&mut world);

        let before = global(&world, child).matrix();
        HierarchyCommands::new(&mut world)
            .add_child_in_place(parent, child)
            .unwrap();
        let after = global(&world, child).matrix();

        assert!(after.abs_diff_eq(before, 1e-4), "{after:?} != {before:?}");
    }
}

#[test]
fn test_in_place_attach_under_sheared_parent_fails() {
    init_logging();
    let mut world = World::new();

    // Non-uniform scale above a rotation gives the inner parent a sheared world matrix
    let outer = world.spawn();
    world
        .add(outer, LocalTransform(Transform::from_scale(Vec3::new(4.0, 1.0, 1.0))))
        .unwrap();
    let inner = world.spawn();
    world
        .add(inner, LocalTransform(Transform::from_rotation(Quat::from_rotation_z(0.5))))
        .unwrap();
    HierarchyCommands::new(&mut world).add_child(outer, inner).unwrap();

    let child = world.spawn();
    world.add(child, LocalTransform::from_xyz(1.0, 0.0, 0.0)).unwrap();

    let result = HierarchyCommands::new(&mut world).add_child_in_place(inner, child);
    assert!(matches!(
        result,
        Err(HierarchyError::UnableToCalculateRelativeLocalTransform { .. })
    ));
    assert!(world.get::<Parent>(child).is_none());
}

#[test]
fn test_propagation_after_grandparent_moves() {
    let mut world = World::new();
    let mut builder = HierarchyBuilder::new(&mut world);
    let root = builder.spawn(None, LocalTransform::from_xyz(1.0, 0.0, 0.0)).unwrap();
    let mid = builder.spawn(Some(root), LocalTransform::from_xyz(1.0, 0.0, 0.0)).unwrap();
    let leaf = builder.spawn(Some(mid), LocalTransform::from_xyz(1.0, 0.0, 0.0)).unwrap();
    builder.finish();

    assert_relative_eq!(global(&world, leaf).translation().x, 3.0);

    world.get_mut::<LocalTransform>(root).unwrap().0.translation.x = 11.0;
    assert_relative_eq!(
        HierarchyCommands::new(&mut world).world_transform(leaf).w_axis.x,
        13.0
    );

    TransformPropagation::run(&mut world);
    assert_relative_eq!(global(&world, leaf).translation().x, 13.0);
}

#[test]
fn test_attach_after_direct_local_edit() {
    let mut world = World::new();
    let parent = world.spawn();
    world.add(parent, LocalTransform::from_xyz(5.0, 0.0, 0.0)).unwrap();
    let child = world.spawn();
    world.add(child, LocalTransform::from_xyz(1.0, 0.0, 0.0)).unwrap();
    TransformPropagation::run(&mut world);

    // Edited without propagating; in-place attach must see the new position
    world.get_mut::<LocalTransform>(child).unwrap().0.translation.x = 2.0;
    HierarchyCommands::new(&mut world).add_child_in_place(parent, child).unwrap();
    assert_relative_eq!(global(&world, child).translation().x, 2.0, epsilon = 1e-5);
    assert_relative_eq!(
        world.get::<LocalTransform>(child).unwrap().0.translation.x,
        -3.0,
        epsilon = 1e-5
    );

    // Moving the parent directly is honoured by the next attach
    let other = world.spawn();
    world.add(other, LocalTransform::from_xyz(1.0, 0.0, 0.0)).unwrap();
    world.get_mut::<LocalTransform>(parent).unwrap().0.translation.x = 7.0;
    HierarchyCommands::new(&mut world).add_child(parent, other).unwrap();
    assert_relative_eq!(global(&world, other).translation().x, 8.0);
}

#[test]
fn test_despawned_parent_releases_children() {
    let mut world = World::new();
    let parent = world.spawn();
    world.add(parent, LocalTransform::from_xyz(5.0, 0.0, 0.0)).unwrap();
    let child = world.spawn();
    world.add(child, LocalTransform::from_xyz(1.0, 0.0, 0.0)).unwrap();
    HierarchyCommands::new(&mut world).add_child(parent, child).unwrap();

    world.despawn(parent);
    assert!(world.get::<Parent>(child).is_none());

    // The orphan is a root again: propagation reaches it and it can be re-parented
    TransformPropagation::run(&mut world);
    assert_relative_eq!(global(&world, child).translation().x, 1.0);

    let adopter = world.spawn();
    world.add(adopter, LocalTransform::from_xyz(0.0, 3.0, 0.0)).unwrap();
    HierarchyCommands::new(&mut world).add_child(adopter, child).unwrap();
    assert_relative_eq!(global(&world, child).translation().y, 3.0);
}

#[test]
fn test_despawned_child_leaves_parent_list() {
    let mut world = World::new();
    let parent = world.spawn();
    let first = world.spawn();
    let second = world.spawn();
    let mut commands = HierarchyCommands::new(&mut world);
    commands.add_child(parent, first).unwrap();
    commands.add_child(parent, second).unwrap();

    world.despawn(first);
    assert_eq!(HierarchyCommands::new(&mut world).children_of(parent), vec![second]);

    world.despawn(second);
    assert!(world.get::<Children>(parent).is_none());
}
