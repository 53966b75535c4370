//! System descriptors - static dependency metadata
//!
//! A descriptor names a unit and lists, in constructor order, the resources
//! and query shapes it needs. The scheduler reads it as plain data to decide
//! when the unit can be constructed.

use std::fmt;

use loom_core::{Id, TypeKey};
use loom_ecs::query::{Fetch, QueryShape};
use loom_ecs::Resource;

/// Unique identifier for a system, hashed from its name
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SystemId(pub Id);

impl SystemId {
    pub const fn new(name: &str) -> Self {
        Self(Id::from_name(name))
    }

    pub fn id(&self) -> Id {
        self.0
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One constructor dependency
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Dependency {
    /// A resource of the given type must be registered
    Resource(TypeKey),
    /// A query over the given shape is built at construction
    Query(QueryShape),
}

/// Static metadata for a system or startup system
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SystemDescriptor {
    id: SystemId,
    name: String,
    dependencies: Vec<Dependency>,
}

impl SystemDescriptor {
    /// Create a descriptor with no dependencies
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: SystemId::new(&name),
            name,
            dependencies: Vec::new(),
        }
    }

    /// Declare a resource dependency
    pub fn resource<R: Resource>(self) -> Self {
        self.dependency(Dependency::Resource(TypeKey::of::<R>()))
    }

    /// Declare a query dependency
    pub fn query<Q: Fetch>(self) -> Self {
        self.dependency(Dependency::Query(QueryShape::of::<Q>()))
    }

    /// Declare an arbitrary dependency
    pub fn dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn id(&self) -> SystemId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dependencies in declaration order
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Declared resource types, de-duplicated, in declaration order
    pub fn resource_keys(&self) -> Vec<TypeKey> {
        let mut keys: Vec<TypeKey> = Vec::new();
        for dependency in &self.dependencies {
            if let Dependency::Resource(key) = dependency {
                if !keys.contains(key) {
                    keys.push(*key);
                }
            }
        }
        keys
    }

    pub fn declares_resource(&self, key: TypeKey) -> bool {
        self.dependencies
            .iter()
            .any(|dependency| matches!(dependency, Dependency::Resource(k) if *k == key))
    }

    pub fn declares_query(&self, shape: &QueryShape) -> bool {
        self.dependencies
            .iter()
            .any(|dependency| matches!(dependency, Dependency::Query(s) if s == shape))
    }
}
