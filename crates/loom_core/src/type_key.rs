//! Stable, printable type identifiers
//!
//! A [`TypeKey`] pairs a [`TypeId`] with the type's name so that type-erased
//! tables (component buckets, resources, dependency lists) can be compared by
//! identity and still produce readable log output.

use std::any::TypeId;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of a Rust type plus its name for diagnostics.
///
/// Equality, ordering and hashing only consider the `TypeId`.
#[derive(Clone, Copy)]
pub struct TypeKey {
    type_id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Key for a concrete type
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The underlying `TypeId`
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Fully qualified type name
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without its module path, e.g. `Velocity` for `game::physics::Velocity`.
    ///
    /// Generic arguments are kept as written.
    pub fn short_name(&self) -> &'static str {
        let base = match self.name.find('<') {
            Some(generic_start) => &self.name[..generic_start],
            None => self.name,
        };
        match base.rfind("::") {
            Some(sep) => &self.name[sep + 2..],
            None => self.name,
        }
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for TypeKey {}

impl PartialOrd for TypeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.type_id.cmp(&other.type_id)
    }
}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}
