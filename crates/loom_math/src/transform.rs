//! Translation, rotation and scale

use glam::{Mat4, Quat, Vec3};

use crate::error::{Result, TransformError};

/// Relative tolerance used when checking that a decomposition reproduces its matrix
pub const DECOMPOSE_TOLERANCE: f32 = 1e-4;

/// Determinants at or below this magnitude are treated as singular
const SINGULAR_DETERMINANT: f32 = 1e-8;

/// 3D transform with translation, rotation, and scale.
///
/// The matrix form is `T * R * S`: scale first, then rotate, then translate.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    /// Identity transform
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    #[inline]
    pub const fn new(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    #[inline]
    pub const fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }

    #[inline]
    pub const fn from_rotation(rotation: Quat) -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation,
            scale: Vec3::ONE,
        }
    }

    #[inline]
    pub const fn from_scale(scale: Vec3) -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale,
        }
    }

    /// Shorthand for `from_translation(Vec3::new(x, y, z))`
    #[inline]
    pub const fn from_xyz(x: f32, y: f32, z: f32) -> Self {
        Self::from_translation(Vec3::new(x, y, z))
    }

    /// Set translation (builder pattern)
    #[inline]
    pub fn with_translation(mut self, translation: Vec3) -> Self {
        self.translation = translation;
        self
    }

    /// Set rotation (builder pattern)
    #[inline]
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Set scale (builder pattern)
    #[inline]
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Compose into a 4x4 matrix
    #[inline]
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Transform a point
    #[inline]
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.translation + self.rotation * (self.scale * point)
    }

    /// Whether every component is finite
    pub fn is_finite(&self) -> bool {
        self.translation.is_finite() && self.rotation.is_finite() && self.scale.is_finite()
    }

    /// Decompose a matrix into translation, rotation and scale.
    ///
    /// Fails when the matrix is singular or non-finite, or when the
    /// recomposed transform does not reproduce the input (shear).
    pub fn try_from_matrix(matrix: &Mat4) -> Result<Self> {
        if !matrix.is_finite() {
            return Err(TransformError::NonFinite);
        }

        let determinant = matrix.determinant();
        if determinant.abs() <= SINGULAR_DETERMINANT {
            return Err(TransformError::NotInvertible { determinant });
        }

        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        let candidate = Self::new(translation, rotation.normalize(), scale);
        if !candidate.is_finite() {
            return Err(TransformError::NotDecomposable);
        }

        let tolerance = DECOMPOSE_TOLERANCE * max_abs_element(matrix).max(1.0);
        if !candidate.to_matrix().abs_diff_eq(*matrix, tolerance) {
            return Err(TransformError::NotDecomposable);
        }

        Ok(candidate)
    }

    /// Express `world` relative to `parent_world`: the local transform `L`
    /// with `parent_world * L == world`.
    pub fn relative_to(parent_world: &Mat4, world: &Mat4) -> Result<Self> {
        let parent = invert(parent_world)?;
        Self::try_from_matrix(&(parent * *world))
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<Transform> for Mat4 {
    fn from(transform: Transform) -> Self {
        transform.to_matrix()
    }
}

/// Invert a matrix that must also decompose into translation/rotation/scale.
pub fn invert(matrix: &Mat4) -> Result<Mat4> {
    // Validates finiteness, determinant and shear in one go
    Transform::try_from_matrix(matrix)?;
    Ok(matrix.inverse())
}

fn max_abs_element(matrix: &Mat4) -> f32 {
    matrix
        .to_cols_array()
        .iter()
        .fold(0.0f32, |acc, value| acc.max(value.abs()))
}
