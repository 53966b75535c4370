//! Scheduler - lazy activation and staged execution
//!
//! Every requested unit starts out unactivated with the set of resource
//! types it is still waiting for. The scheduler keeps, per resource type,
//! the units blocked on it; each registration re-examines only those units.
//! A unit whose set empties is constructed and either attached to its stage
//! (per-frame) or queued to run once (startup).
//!
//! # Phases
//!
//! 1. **Setup**: seed resources go straight into the registry.
//! 2. **Startup**: startup units run in the order they were activated. The
//!    pending-registration queue is drained after each one, so a startup
//!    unit can unblock the next.
//! 3. **Running**: every tick runs the stages in ascending priority, then
//!    drains the queue. Only per-frame units activate from here on.

use std::any::TypeId;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::time::Duration;

use loom_core::TypeKey;
use loom_ecs::{ResourceRegistry, World};

use crate::catalog::{SystemCatalog, UnitDecl, UnitInstance, UnitKind};
use crate::config::EngineConfig;
use crate::descriptor::SystemId;
use crate::error::ConfigError;
use crate::system::{Dependencies, StartupSystem, System, SystemContext};

/// Lifecycle of a catalog unit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnitState {
    /// Requested, still waiting for resources
    Unactivated,
    /// Constructed and scheduled
    Activated,
    /// Not requested by the configuration
    Removed,
    /// Constructor returned an error; never retried
    Failed,
}

/// Where the scheduler is in its lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Setup,
    Startup,
    Running,
}

struct Unit {
    decl: UnitDecl,
    state: UnitState,
    /// Index into `Scheduler::stages` for per-frame units
    stage: Option<usize>,
    unmet: BTreeSet<TypeKey>,
}

struct ScheduledSystem {
    name: String,
    system: Box<dyn System>,
}

struct Stage {
    name: String,
    priority: i32,
    systems: Vec<ScheduledSystem>,
}

struct ScheduledStartup {
    name: String,
    system: Box<dyn StartupSystem>,
}

/// Activates and runs the units of a [`SystemCatalog`]
pub struct Scheduler {
    units: Vec<Unit>,
    stages: Vec<Stage>,
    blocked: HashMap<TypeId, Vec<usize>>,
    startup_queue: VecDeque<ScheduledStartup>,
    phase: Phase,
    frame: u64,
}

impl Scheduler {
    /// Build from a catalog, keeping only the units `config` requests
    pub fn new(catalog: SystemCatalog, config: &EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut stages: Vec<Stage> = config
            .stages
            .iter()
            .map(|stage| Stage {
                name: stage.name.clone(),
                priority: stage.priority,
                systems: Vec::new(),
            })
            .collect();
        // Stable, so equal priorities keep configuration order
        stages.sort_by_key(|stage| stage.priority);

        let units: Vec<Unit> = catalog
            .into_units()
            .into_iter()
            .map(|decl| {
                let name = decl.descriptor.name();
                let (state, stage) = match decl.kind {
                    UnitKind::PerFrame => match config.stage_of(name) {
                        Some(stage_name) => (
                            UnitState::Unactivated,
                            stages.iter().position(|s| s.name == stage_name),
                        ),
                        None => (UnitState::Removed, None),
                    },
                    UnitKind::Startup if config.requests_startup(name) => {
                        (UnitState::Unactivated, None)
                    }
                    UnitKind::Startup => (UnitState::Removed, None),
                };
                let unmet = decl.descriptor.resource_keys().into_iter().collect();
                Unit {
                    decl,
                    state,
                    stage,
                    unmet,
                }
            })
            .collect();

        let scheduler = Self {
            units,
            stages,
            blocked: HashMap::new(),
            startup_queue: VecDeque::new(),
            phase: Phase::Setup,
            frame: 0,
        };
        scheduler.report_configuration(config);
        Ok(scheduler)
    }

    fn report_configuration(&self, config: &EngineConfig) {
        for unit in &self.units {
            if unit.state == UnitState::Removed {
                log::debug!("{} '{}' not requested; removed", unit.decl.kind, unit.decl.descriptor.name());
            }
        }

        let requested = config
            .systems
            .iter()
            .map(|s| (s.name.as_str(), UnitKind::PerFrame))
            .chain(config.startup.iter().map(|s| (s.as_str(), UnitKind::Startup)));
        for (name, kind) in requested {
            match self.find(name) {
                None => log::warn!("{} '{}' is not in the catalog", kind, name),
                Some(unit) if unit.decl.kind != kind => log::warn!(
                    "'{}' is requested as a {} but declared as a {}; removed",
                    name,
                    kind,
                    unit.decl.kind
                ),
                Some(_) => {}
            }
        }
    }

    fn find(&self, name: &str) -> Option<&Unit> {
        let id = SystemId::new(name);
        self.units.iter().find(|unit| unit.decl.descriptor.id() == id)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Ticks run so far
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// State of a catalog unit, by name
    pub fn unit_state(&self, name: &str) -> Option<UnitState> {
        self.find(name).map(|unit| unit.state)
    }

    /// Names of the systems attached to `stage`, in run order
    pub fn systems_in_stage(&self, stage: &str) -> Vec<&str> {
        self.stages
            .iter()
            .find(|s| s.name == stage)
            .map(|s| s.systems.iter().map(|entry| entry.name.as_str()).collect())
            .unwrap_or_default()
    }

    /// Stage names in run order
    pub fn stage_order(&self) -> Vec<&str> {
        self.stages.iter().map(|stage| stage.name.as_str()).collect()
    }

    /// Resource types a unit is still waiting for
    pub fn unmet_dependencies(&self, name: &str) -> Vec<TypeKey> {
        self.find(name)
            .map(|unit| unit.unmet.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Initial activation pass over every requested unit, in catalog order
    fn activate_initial(&mut self, resources: &ResourceRegistry) {
        for index in 0..self.units.len() {
            let unit = &mut self.units[index];
            if unit.state != UnitState::Unactivated {
                continue;
            }

            unit.unmet.retain(|key| !resources.contains_key(*key));
            if unit.unmet.is_empty() {
                self.try_activate(index, resources);
            } else {
                log::debug!(
                    "{} '{}' waiting for {}",
                    unit.decl.kind,
                    unit.decl.descriptor.name(),
                    KeyList(&unit.unmet)
                );
                for key in &unit.unmet {
                    self.blocked.entry(key.type_id()).or_default().push(index);
                }
            }
        }
    }

    /// Re-examine the units blocked on `key`
    pub fn on_resource_registered(&mut self, key: TypeKey, resources: &ResourceRegistry) {
        if self.phase == Phase::Setup {
            return;
        }
        let Some(waiting) = self.blocked.remove(&key.type_id()) else {
            return;
        };
        for index in waiting {
            self.units[index].unmet.remove(&key);
            self.try_activate(index, resources);
        }
    }

    fn try_activate(&mut self, index: usize, resources: &ResourceRegistry) {
        let unit = &mut self.units[index];
        if unit.state != UnitState::Unactivated || !unit.unmet.is_empty() {
            return;
        }
        let name = unit.decl.descriptor.name().to_string();
        if unit.decl.kind == UnitKind::Startup && self.phase == Phase::Running {
            log::debug!("startup system '{}' unblocked after startup; ignored", name);
            return;
        }

        let deps = Dependencies::new(&unit.decl.descriptor, resources);
        match (unit.decl.constructor)(&deps) {
            Ok(UnitInstance::PerFrame(system)) => {
                let Some(stage) = unit.stage.and_then(|i| self.stages.get_mut(i)) else {
                    log::error!("system '{}' has no stage; removed", name);
                    unit.state = UnitState::Removed;
                    return;
                };
                log::debug!("activated system '{}' in stage '{}'", name, stage.name);
                stage.systems.push(ScheduledSystem { name, system });
                unit.state = UnitState::Activated;
            }
            Ok(UnitInstance::Startup(system)) => {
                log::debug!("activated startup system '{}'", name);
                self.startup_queue.push_back(ScheduledStartup { name, system });
                unit.state = UnitState::Activated;
            }
            Err(err) => {
                log::error!("failed to construct {} '{}': {}", unit.decl.kind, name, err);
                unit.state = UnitState::Failed;
            }
        }
    }

    /// Commit everything in the pending-registration queue.
    ///
    /// Each registration immediately activates the units it unblocks.
    /// Returns the number of resources registered.
    pub fn drain_pending(&mut self, resources: &mut ResourceRegistry) -> usize {
        let mut registered = 0;
        loop {
            let pending = resources.drain_pending();
            if pending.is_empty() {
                break;
            }
            for request in pending {
                let key = request.key();
                match resources.insert_pending(request) {
                    Ok(key) => {
                        registered += 1;
                        self.on_resource_registered(key, resources);
                    }
                    Err(err) => log::warn!("skipping queued resource {}: {}", key, err),
                }
            }
        }
        registered
    }

    /// Activate what can be activated and run every startup unit once
    pub fn run_startup(&mut self, world: &mut World, resources: &mut ResourceRegistry) {
        if self.phase != Phase::Setup {
            log::warn!("startup already ran");
            return;
        }
        log::info!("starting up");
        self.phase = Phase::Startup;
        self.activate_initial(resources);
        self.drain_pending(resources);

        let mut ran = 0;
        while let Some(mut entry) = self.startup_queue.pop_front() {
            log::debug!("running startup system '{}'", entry.name);
            let mut ctx = SystemContext::new(world, resources, Duration::ZERO, 0);
            entry.system.run(&mut ctx);
            ran += 1;
            self.drain_pending(resources);
        }

        for unit in &self.units {
            if unit.decl.kind == UnitKind::Startup && unit.state == UnitState::Unactivated {
                log::warn!(
                    "startup system '{}' never ran; missing {}",
                    unit.decl.descriptor.name(),
                    KeyList(&unit.unmet)
                );
            }
        }

        self.phase = Phase::Running;
        log::info!("startup complete: {} startup systems ran", ran);
    }

    /// Run one frame.
    ///
    /// Runs startup first if it has not happened yet.
    pub fn tick(&mut self, world: &mut World, resources: &mut ResourceRegistry, delta: Duration) {
        if self.phase != Phase::Running {
            self.run_startup(world, resources);
        }
        self.frame += 1;

        for stage in &mut self.stages {
            for entry in &mut stage.systems {
                log::trace!("frame {}: running '{}'", self.frame, entry.name);
                let mut ctx = SystemContext::new(world, resources, delta, self.frame);
                entry.system.run(&mut ctx);
            }
        }

        self.drain_pending(resources);
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("phase", &self.phase)
            .field("frame", &self.frame)
            .field(
                "units",
                &self
                    .units
                    .iter()
                    .map(|unit| (unit.decl.descriptor.name(), unit.state))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

struct KeyList<'a>(&'a BTreeSet<TypeKey>);

impl fmt::Display for KeyList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", key)?;
        }
        Ok(())
    }
}
