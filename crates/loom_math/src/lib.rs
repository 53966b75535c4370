//! # loom_math
//!
//! Translation/rotation/scale transforms over [`glam`] matrices, including the
//! decomposition used to re-express a world transform relative to a new parent.

pub mod error;
pub mod transform;

pub use error::{Result, TransformError};
pub use transform::{Transform, DECOMPOSE_TOLERANCE};

pub use glam::{Mat4, Quat, Vec3};
