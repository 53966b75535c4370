//! # loom_ecs - Entity Component storage for the Loom runtime
//!
//! - Type-erased component store with typed per-component buckets
//! - Joined queries with required and optional slots
//! - Parent/child hierarchy with cycle rejection and cached world transforms
//! - Type-keyed resource registry with a deferred registration queue
//!
//! ## Example
//!
//! ```ignore
//! use loom_ecs::prelude::*;
//!
//! struct Position(f32, f32);
//! impl Component for Position {}
//!
//! struct Velocity(f32, f32);
//! impl Component for Velocity {}
//!
//! let mut world = World::new();
//! let entity = world
//!     .build_entity()
//!     .with(Position(0.0, 0.0))?
//!     .with(Velocity(1.0, 0.5))?
//!     .finish();
//!
//! let movers = Query::<(Position, Opt<Velocity>)>::new();
//! for (entity, (position, velocity)) in movers.iter(&world) {
//!     // ...
//! }
//! ```

pub mod component;
pub mod entity;
pub mod error;
pub mod handoff;
pub mod hierarchy;
pub mod hierarchy_commands;
pub mod hierarchy_system;
pub mod query;
pub mod resource;
pub mod store;
pub mod world;

pub use component::Component;
pub use entity::{EntityId, EntityRegistry};
pub use error::{EcsError, HierarchyError, ResourceError, Result};
pub use handoff::{HandoffQueue, HandoffSender};
pub use hierarchy::{Children, GlobalTransform, LocalTransform, Parent};
pub use hierarchy_commands::{HierarchyBuilder, HierarchyCommands, MAX_HIERARCHY_DEPTH};
pub use hierarchy_system::TransformPropagation;
pub use query::{Access, Fetch, Joiner, Opt, Query, QueryIter, QueryShape, QuerySlot};
pub use resource::{PendingResource, Res, Resource, ResourceQueue, ResourceRegistry, ResourceSender};
pub use store::ComponentStore;
pub use world::{EntityBuilder, World};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::component::Component;
    pub use crate::entity::EntityId;
    pub use crate::hierarchy::{Children, GlobalTransform, LocalTransform, Parent};
    pub use crate::hierarchy_commands::{HierarchyBuilder, HierarchyCommands};
    pub use crate::query::{Opt, Query};
    pub use crate::resource::{Res, ResourceQueue, ResourceRegistry};
    pub use crate::world::World;
    pub use loom_math::Transform;
}
