//! # loom_core
//!
//! Identifier primitives shared by every Loom crate:
//! - [`Id`] hashed names and counters for stable unit identities
//! - [`TypeKey`] a comparable, printable stand-in for a Rust type

pub mod id;
pub mod type_key;

pub use id::*;
pub use type_key::*;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::id::{Id, IdGenerator};
    pub use crate::type_key::TypeKey;
}
