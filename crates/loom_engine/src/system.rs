//! System - Units of logic driven by the scheduler
//!
//! A per-frame [`System`] runs once per tick; a [`StartupSystem`] runs exactly
//! once before the frame loop. Neither is built by the application directly:
//! the scheduler constructs a unit once every resource its descriptor names
//! is registered, handing it a [`Dependencies`] view to pull them from.

use std::time::Duration;

use loom_core::TypeKey;
use loom_ecs::query::{Fetch, Joiner, QueryShape};
use loom_ecs::{HierarchyCommands, Query, Res, Resource, ResourceRegistry, World};

use crate::descriptor::SystemDescriptor;
use crate::error::ConstructError;

/// Everything a unit can touch while it runs
pub struct SystemContext<'a> {
    world: &'a mut World,
    resources: &'a ResourceRegistry,
    delta: Duration,
    frame: u64,
}

impl<'a> SystemContext<'a> {
    pub(crate) fn new(
        world: &'a mut World,
        resources: &'a ResourceRegistry,
        delta: Duration,
        frame: u64,
    ) -> Self {
        Self {
            world,
            resources,
            delta,
            frame,
        }
    }

    pub fn world(&self) -> &World {
        self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        self.world
    }

    /// Hierarchy commands over the world
    pub fn hierarchy(&mut self) -> HierarchyCommands<'_> {
        HierarchyCommands::new(self.world)
    }

    pub fn resources(&self) -> &ResourceRegistry {
        self.resources
    }

    /// Look up any registered resource
    pub fn resource<R: Resource>(&self) -> Option<Res<R>> {
        self.resources.try_get::<R>()
    }

    /// Ask for `value` to be registered once this unit returns
    pub fn queue_resource<R: Resource>(&self, value: R) {
        log::debug!("queued resource {}", TypeKey::of::<R>());
        self.resources.queue().read().push(value);
    }

    /// Time since the previous tick (zero during startup)
    pub fn delta(&self) -> Duration {
        self.delta
    }

    /// Current frame number (zero during startup)
    pub fn frame(&self) -> u64 {
        self.frame
    }
}

/// Logic run once per tick
pub trait System: 'static {
    fn run(&mut self, ctx: &mut SystemContext<'_>);
}

/// Logic run once before the frame loop
pub trait StartupSystem: 'static {
    fn run(&mut self, ctx: &mut SystemContext<'_>);
}

/// Adapts a closure into a [`System`] or [`StartupSystem`]
pub struct FnSystem<F>(F);

impl<F> FnSystem<F>
where
    F: FnMut(&mut SystemContext<'_>) + 'static,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> System for FnSystem<F>
where
    F: FnMut(&mut SystemContext<'_>) + 'static,
{
    fn run(&mut self, ctx: &mut SystemContext<'_>) {
        (self.0)(ctx)
    }
}

impl<F> StartupSystem for FnSystem<F>
where
    F: FnMut(&mut SystemContext<'_>) + 'static,
{
    fn run(&mut self, ctx: &mut SystemContext<'_>) {
        (self.0)(ctx)
    }
}

/// A per-frame system type with a static descriptor
pub trait SystemUnit: System + Sized {
    fn descriptor() -> SystemDescriptor;
    fn construct(deps: &Dependencies<'_>) -> Result<Self, ConstructError>;
}

/// A startup system type with a static descriptor
pub trait StartupUnit: StartupSystem + Sized {
    fn descriptor() -> SystemDescriptor;
    fn construct(deps: &Dependencies<'_>) -> Result<Self, ConstructError>;
}

/// What a unit's constructor can draw on.
///
/// Only dependencies the descriptor declares can be requested.
pub struct Dependencies<'a> {
    descriptor: &'a SystemDescriptor,
    resources: &'a ResourceRegistry,
}

impl<'a> Dependencies<'a> {
    pub(crate) fn new(descriptor: &'a SystemDescriptor, resources: &'a ResourceRegistry) -> Self {
        Self {
            descriptor,
            resources,
        }
    }

    pub fn descriptor(&self) -> &SystemDescriptor {
        self.descriptor
    }

    /// A declared resource
    pub fn resource<R: Resource>(&self) -> Result<Res<R>, ConstructError> {
        let key = TypeKey::of::<R>();
        if !self.descriptor.declares_resource(key) {
            return Err(ConstructError::UndeclaredResource(key));
        }
        self.resources
            .try_get::<R>()
            .ok_or(ConstructError::MissingResource(key))
    }

    /// A fresh query over a declared shape
    pub fn query<Q: Fetch>(&self) -> Result<Query<Q>, ConstructError> {
        self.check_query::<Q>()?;
        Ok(Query::new())
    }

    /// A fresh query over a declared shape, using a custom joiner
    pub fn query_with<Q: Fetch>(&self, joiner: Joiner<Q>) -> Result<Query<Q>, ConstructError> {
        self.check_query::<Q>()?;
        Ok(Query::with_joiner(joiner))
    }

    fn check_query<Q: Fetch>(&self) -> Result<(), ConstructError> {
        let shape = QueryShape::of::<Q>();
        if self.descriptor.declares_query(&shape) {
            Ok(())
        } else {
            Err(ConstructError::UndeclaredQuery(shape.to_string()))
        }
    }
}
