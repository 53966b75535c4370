//! # loom_engine - System scheduling for the Loom runtime
//!
//! Ties the world, the resource registry and the scheduler together:
//! - Systems declare the resources and queries they need
//! - A system is constructed the moment its last resource is registered
//! - Startup systems run once, in activation order
//! - Per-frame systems run in configured stages every tick
//!
//! ## Example
//!
//! ```ignore
//! use loom_engine::prelude::*;
//!
//! let mut catalog = SystemCatalog::with_builtins();
//! catalog.add_startup::<SpawnLevel>().add_system::<Movement>();
//!
//! let config = EngineConfig::default()
//!     .with_startup("spawn_level")
//!     .with_system("movement", "update")
//!     .with_system("transform_propagation", "post_update");
//!
//! let mut engine = Engine::new(config, catalog)?;
//! engine.run(&mut FixedStepRunner::default().max_ticks(600))?;
//! ```

pub mod builtin;
pub mod catalog;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod logging;
pub mod runner;
pub mod scheduler;
pub mod system;

pub use builtin::TransformPropagationSystem;
pub use catalog::{SystemCatalog, UnitKind};
pub use config::{EngineConfig, RunnerConfig, StageConfig, SystemConfig, DEFAULT_STAGES};
pub use descriptor::{Dependency, SystemDescriptor, SystemId};
pub use error::{ConfigError, ConstructError, EngineError, Result};
pub use runner::{FixedStepRunner, StopHandle, UpdateRunner};
pub use scheduler::{Phase, Scheduler, UnitState};
pub use system::{
    Dependencies, FnSystem, StartupSystem, StartupUnit, System, SystemContext, SystemUnit,
};

pub use loom_core;
pub use loom_ecs;
pub use loom_math;

use std::time::Duration;

use loom_core::TypeKey;
use loom_ecs::{HandoffQueue, HandoffSender, Res, Resource, ResourceRegistry, World};

/// Owns the world, the resources and the scheduler
pub struct Engine {
    world: World,
    resources: ResourceRegistry,
    scheduler: Scheduler,
    handoff: Res<HandoffQueue>,
    config: EngineConfig,
}

impl Engine {
    /// Create an engine. Nothing is activated until [`startup`](Self::startup).
    pub fn new(config: EngineConfig, catalog: SystemCatalog) -> Result<Self> {
        let scheduler = Scheduler::new(catalog, &config)?;
        let mut resources = ResourceRegistry::new();
        let handoff = resources.register(HandoffQueue::new())?;

        log::info!(
            "engine created: {} stages, {} systems, {} startup systems requested",
            config.stages.len(),
            config.systems.len(),
            config.startup.len()
        );

        Ok(Self {
            world: World::new(),
            resources,
            scheduler,
            handoff,
            config,
        })
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Register a resource.
    ///
    /// After startup has begun this immediately activates whatever was
    /// waiting on it.
    pub fn insert_resource<R: Resource>(&mut self, value: R) -> Result<Res<R>> {
        let handle = self.resources.register(value)?;
        self.scheduler
            .on_resource_registered(TypeKey::of::<R>(), &self.resources);
        Ok(handle)
    }

    /// Look up a registered resource
    pub fn resource<R: Resource>(&self) -> Option<Res<R>> {
        self.resources.try_get::<R>()
    }

    /// Sender for work that must be applied to the world on the main thread
    pub fn handoff_sender(&self) -> HandoffSender {
        self.handoff.read().sender()
    }

    /// Run every startup system. Called implicitly by the first tick.
    pub fn startup(&mut self) {
        self.scheduler.run_startup(&mut self.world, &mut self.resources);
    }

    /// Run one frame
    pub fn tick(&mut self, delta: Duration) {
        if self.scheduler.phase() != Phase::Running {
            self.startup();
        }
        self.handoff.read().drain_into(&mut self.world);
        self.scheduler
            .tick(&mut self.world, &mut self.resources, delta);
    }

    /// Start up, then hand the frame loop to `runner` until it stops
    pub fn run(&mut self, runner: &mut dyn UpdateRunner) -> Result<()> {
        let stop = runner.stop_handle();
        match self.resources.try_get::<StopHandle>() {
            Some(existing) => *existing.write() = stop,
            None => {
                self.insert_resource(stop)?;
            }
        }

        self.startup();
        runner.run_until_stopped(&mut |delta| self.tick(delta));
        log::info!("engine stopped after {} frames", self.frame());
        Ok(())
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// State of a catalog unit, by name
    pub fn unit_state(&self, name: &str) -> Option<UnitState> {
        self.scheduler.unit_state(name)
    }

    pub fn phase(&self) -> Phase {
        self.scheduler.phase()
    }

    /// Ticks run so far
    pub fn frame(&self) -> u64 {
        self.scheduler.frame()
    }
}

type Seed = Box<dyn FnOnce(&mut Engine) -> Result<()>>;

/// Builder for [`Engine`]
pub struct EngineBuilder {
    config: EngineConfig,
    catalog: SystemCatalog,
    seeds: Vec<Seed>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            catalog: SystemCatalog::with_builtins(),
            seeds: Vec::new(),
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn catalog(mut self, catalog: SystemCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Seed a resource before startup
    pub fn with_resource<R: Resource>(mut self, value: R) -> Self {
        self.seeds.push(Box::new(move |engine: &mut Engine| {
            engine.insert_resource(value).map(|_| ())
        }));
        self
    }

    pub fn build(self) -> Result<Engine> {
        let mut engine = Engine::new(self.config, self.catalog)?;
        for seed in self.seeds {
            seed(&mut engine)?;
        }
        Ok(engine)
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Dependencies, Engine, EngineConfig, FixedStepRunner, StartupSystem, StartupUnit,
        StopHandle, System, SystemCatalog, SystemContext, SystemDescriptor, SystemUnit,
        UpdateRunner,
    };
    pub use loom_core::prelude::*;
    pub use loom_ecs::prelude::*;
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_ecs::{Component, GlobalTransform, HierarchyCommands, LocalTransform};

    #[derive(Debug, PartialEq)]
    struct Marker(u32);
    impl Component for Marker {}

    #[test]
    fn test_handoff_applied_before_stages() {
        let mut engine = Engine::new(EngineConfig::default(), SystemCatalog::new()).unwrap();
        let sender = engine.handoff_sender();

        let worker = std::thread::spawn(move || {
            sender.submit(|world: &mut World| {
                let e = world.spawn();
                world.add(e, Marker(7)).unwrap();
            })
        });
        assert!(worker.join().unwrap());
        assert_eq!(engine.world().entity_count(), 0);

        engine.tick(Duration::ZERO);
        assert_eq!(engine.world().entity_count(), 1);
        assert_eq!(engine.phase(), Phase::Running);
    }

    #[test]
    fn test_builtin_propagation() {
        let config = EngineConfig::default()
            .with_system(TransformPropagationSystem::NAME, "post_update");
        let mut engine = Engine::builder().config(config).build().unwrap();

        let world = engine.world_mut();
        let parent = world.spawn();
        world.add(parent, LocalTransform::from_xyz(1.0, 0.0, 0.0)).unwrap();
        let child = world.spawn();
        world.add(child, LocalTransform::from_xyz(0.0, 2.0, 0.0)).unwrap();
        HierarchyCommands::new(world).add_child(parent, child).unwrap();

        engine.tick(Duration::ZERO);
        assert_eq!(
            engine.unit_state(TransformPropagationSystem::NAME),
            Some(UnitState::Activated)
        );
        let global = engine.world().get::<GlobalTransform>(child).unwrap();
        assert_eq!(global.translation(), loom_math::Vec3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn test_duplicate_seed_fails_build() {
        let result = Engine::builder()
            .with_resource(Marker(1))
            .with_resource(Marker(2))
            .build();
        assert!(matches!(result, Err(EngineError::Resource(_))));
    }
}
