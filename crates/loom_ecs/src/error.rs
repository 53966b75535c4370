//! Error types for the ECS

use loom_math::TransformError;
use thiserror::Error;

use crate::entity::EntityId;

/// Component store and world errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EcsError {
    /// The entity is not (or no longer) alive
    #[error("entity {0:?} does not exist")]
    EntityNotFound(EntityId),

    /// A single-instance component was added twice
    #[error("entity {entity:?} already has a {component} component")]
    DuplicateComponent {
        entity: EntityId,
        component: &'static str,
    },
}

/// Resource registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    /// A resource of this type is already registered
    #[error("resource {0} is already registered")]
    AlreadyRegistered(&'static str),
}

/// Hierarchy mutation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HierarchyError {
    /// Entity does not exist
    #[error("entity {0:?} does not exist")]
    EntityNotFound(EntityId),

    /// The child is already attached somewhere
    #[error("entity {child:?} already has parent {parent:?}")]
    ChildAlreadyHasParent { child: EntityId, parent: EntityId },

    /// Attaching would make the child its own ancestor
    #[error("attaching {child:?} under {parent:?} would create a cycle")]
    CircularReference { parent: EntityId, child: EntityId },

    /// The child is not attached to the given parent
    #[error("entity {child:?} is not a child of {parent:?}")]
    NotAChild { parent: EntityId, child: EntityId },

    /// The new local transform could not be derived from the world transforms
    #[error("unable to calculate local transform of {child:?} relative to {parent:?}: {source}")]
    UnableToCalculateRelativeLocalTransform {
        parent: EntityId,
        child: EntityId,
        #[source]
        source: TransformError,
    },

    /// Underlying component store failure
    #[error(transparent)]
    Component(#[from] EcsError),
}

/// Result type for ECS operations
pub type Result<T> = std::result::Result<T, EcsError>;
