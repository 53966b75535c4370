//! Error types for transform math

use thiserror::Error;

/// Failures when turning a matrix back into a [`crate::Transform`]
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum TransformError {
    /// The matrix has (near) zero determinant
    #[error("matrix is not invertible (determinant {determinant})")]
    NotInvertible { determinant: f32 },

    /// The matrix contains NaN or infinite elements
    #[error("matrix contains non-finite elements")]
    NonFinite,

    /// The matrix carries shear or projection, typically from non-uniform
    /// scale combined with rotation up the hierarchy
    #[error("matrix cannot be decomposed into translation, rotation and scale")]
    NotDecomposable,
}

/// Result type for transform operations
pub type Result<T> = std::result::Result<T, TransformError>;
