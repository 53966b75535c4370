//! System catalog - every unit the application could run
//!
//! The catalog is the hand-written (or generated) registration table: for
//! each unit type, its descriptor and a way to construct it. Which of them
//! actually run is decided by the [`EngineConfig`](crate::config::EngineConfig).

use std::fmt;

use crate::builtin::TransformPropagationSystem;
use crate::descriptor::{SystemDescriptor, SystemId};
use crate::error::ConstructError;
use crate::system::{Dependencies, StartupSystem, StartupUnit, System, SystemUnit};

/// Whether a unit runs once before the loop or every tick
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnitKind {
    Startup,
    PerFrame,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitKind::Startup => f.write_str("startup system"),
            UnitKind::PerFrame => f.write_str("system"),
        }
    }
}

/// A constructed unit
pub(crate) enum UnitInstance {
    Startup(Box<dyn StartupSystem>),
    PerFrame(Box<dyn System>),
}

type Constructor = Box<dyn Fn(&Dependencies<'_>) -> Result<UnitInstance, ConstructError>>;

fn constructor<F>(f: F) -> Constructor
where
    F: Fn(&Dependencies<'_>) -> Result<UnitInstance, ConstructError> + 'static,
{
    Box::new(f)
}

/// One catalog entry
pub(crate) struct UnitDecl {
    pub(crate) descriptor: SystemDescriptor,
    pub(crate) kind: UnitKind,
    pub(crate) constructor: Constructor,
}

/// Registration table of every known unit
#[derive(Default)]
pub struct SystemCatalog {
    units: Vec<UnitDecl>,
}

impl SystemCatalog {
    /// Empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog pre-populated with the engine's own units
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        catalog.add_system::<TransformPropagationSystem>();
        catalog
    }

    /// Register a per-frame system type
    pub fn add_system<S: SystemUnit>(&mut self) -> &mut Self {
        let decl = UnitDecl {
            descriptor: S::descriptor(),
            kind: UnitKind::PerFrame,
            constructor: constructor(|deps| {
                S::construct(deps).map(|system| UnitInstance::PerFrame(Box::new(system)))
            }),
        };
        self.push(decl)
    }

    /// Register a startup system type
    pub fn add_startup<S: StartupUnit>(&mut self) -> &mut Self {
        let decl = UnitDecl {
            descriptor: S::descriptor(),
            kind: UnitKind::Startup,
            constructor: constructor(|deps| {
                S::construct(deps).map(|system| UnitInstance::Startup(Box::new(system)))
            }),
        };
        self.push(decl)
    }

    /// Register a per-frame system from a descriptor and a constructor
    pub fn add_system_with<S, F>(&mut self, descriptor: SystemDescriptor, construct: F) -> &mut Self
    where
        S: System,
        F: Fn(&Dependencies<'_>) -> Result<S, ConstructError> + 'static,
    {
        let decl = UnitDecl {
            descriptor,
            kind: UnitKind::PerFrame,
            constructor: constructor(move |deps| {
                construct(deps).map(|system| UnitInstance::PerFrame(Box::new(system)))
            }),
        };
        self.push(decl)
    }

    /// Register a startup system from a descriptor and a constructor
    pub fn add_startup_with<S, F>(&mut self, descriptor: SystemDescriptor, construct: F) -> &mut Self
    where
        S: StartupSystem,
        F: Fn(&Dependencies<'_>) -> Result<S, ConstructError> + 'static,
    {
        let decl = UnitDecl {
            descriptor,
            kind: UnitKind::Startup,
            constructor: constructor(move |deps| {
                construct(deps).map(|system| UnitInstance::Startup(Box::new(system)))
            }),
        };
        self.push(decl)
    }

    fn push(&mut self, decl: UnitDecl) -> &mut Self {
        let id = decl.descriptor.id();
        if self.units.iter().any(|unit| unit.descriptor.id() == id) {
            log::warn!(
                "{} '{}' is already in the catalog; ignoring duplicate",
                decl.kind,
                decl.descriptor.name()
            );
            return self;
        }
        self.units.push(decl);
        self
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        let id = SystemId::new(name);
        self.units.iter().any(|unit| unit.descriptor.id() == id)
    }

    /// Descriptors and kinds in registration order
    pub fn descriptors(&self) -> impl Iterator<Item = (&SystemDescriptor, UnitKind)> + '_ {
        self.units.iter().map(|unit| (&unit.descriptor, unit.kind))
    }

    pub(crate) fn into_units(self) -> Vec<UnitDecl> {
        self.units
    }
}

impl fmt::Debug for SystemCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.units.iter().map(|unit| (unit.descriptor.name(), unit.kind)))
            .finish()
    }
}
