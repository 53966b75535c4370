//! Hierarchical entity components
//!
//! - [`Parent`] - the single parent of an entity
//! - [`Children`] - ordered list of child entities, maintained by `HierarchyCommands`
//! - [`LocalTransform`] - transform relative to the parent (or the world for roots)
//! - [`GlobalTransform`] - cached world-space matrix
//!
//! Invariant: `GlobalTransform(child) == GlobalTransform(parent) * LocalTransform(child)`,
//! and a root's global transform equals its local transform. Entities without a
//! `LocalTransform` behave as if they had the identity.
//!
//! ```ignore
//! let parent = world.spawn();
//! world.add(parent, LocalTransform::from_xyz(10.0, 0.0, 0.0))?;
//! let child = world.spawn();
//! world.add(child, LocalTransform::from_xyz(5.0, 0.0, 0.0))?;
//!
//! HierarchyCommands::new(&mut world).add_child(parent, child)?;
//! // child's GlobalTransform now has translation (15, 0, 0)
//! ```

use glam::{Mat4, Vec3};
use loom_math::Transform;

use crate::component::Component;
use crate::entity::EntityId;

// ============================================================================
// Parent / Children
// ============================================================================

/// Parent marker
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Parent(EntityId);

impl Parent {
    pub(crate) fn new(entity: EntityId) -> Self {
        Self(entity)
    }

    /// The parent entity
    #[inline]
    pub fn get(&self) -> EntityId {
        self.0
    }
}

impl Component for Parent {}

/// Ordered child list. Never contains duplicates.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Children(Vec<EntityId>);

impl Children {
    pub(crate) fn with_child(child: EntityId) -> Self {
        Self(vec![child])
    }

    /// Iterate children in attachment order
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = EntityId> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.0.contains(&entity)
    }

    pub fn as_slice(&self) -> &[EntityId] {
        &self.0
    }

    pub(crate) fn push(&mut self, child: EntityId) {
        if !self.0.contains(&child) {
            self.0.push(child);
        }
    }

    pub(crate) fn remove(&mut self, child: EntityId) -> bool {
        let before = self.0.len();
        self.0.retain(|&c| c != child);
        self.0.len() != before
    }
}

impl Component for Children {}

// ============================================================================
// Transforms
// ============================================================================

/// Transform relative to the parent
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LocalTransform(pub Transform);

impl LocalTransform {
    pub const IDENTITY: Self = Self(Transform::IDENTITY);

    #[inline]
    pub const fn from_xyz(x: f32, y: f32, z: f32) -> Self {
        Self(Transform::from_xyz(x, y, z))
    }

    #[inline]
    pub const fn from_translation(translation: Vec3) -> Self {
        Self(Transform::from_translation(translation))
    }

    #[inline]
    pub fn to_matrix(&self) -> Mat4 {
        self.0.to_matrix()
    }
}

impl From<Transform> for LocalTransform {
    fn from(transform: Transform) -> Self {
        Self(transform)
    }
}

impl Component for LocalTransform {}

/// Cached world-space transform
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlobalTransform(pub Mat4);

impl GlobalTransform {
    pub const IDENTITY: Self = Self(Mat4::IDENTITY);

    /// Root-space transform: world equals local
    pub fn from_local(local: &LocalTransform) -> Self {
        Self(local.to_matrix())
    }

    /// This transform followed by a child's local transform
    pub fn mul_local(&self, local: &LocalTransform) -> Self {
        Self(self.0 * local.to_matrix())
    }

    #[inline]
    pub fn matrix(&self) -> Mat4 {
        self.0
    }

    /// World-space position
    #[inline]
    pub fn translation(&self) -> Vec3 {
        self.0.w_axis.truncate()
    }

    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.0.transform_point3(point)
    }

    /// Decompose into translation/rotation/scale
    pub fn to_transform(&self) -> loom_math::Result<Transform> {
        Transform::try_from_matrix(&self.0)
    }
}

impl Default for GlobalTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Component for GlobalTransform {}
