//! Transform type used by emitters and particles.
//!
//! A decomposed translation / rotation / scale transform. Particles in
//! world-space freeze a copy of the emitter transform at spawn time;
//! local-space particles re-apply the live emitter transform every tick.

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// A decomposed rigid transform with non-uniform scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// World-space translation.
    pub translation: Vec3,
    /// Rotation.
    pub rotation: Quat,
    /// Per-axis scale.
    pub scale: Vec3,
}

impl Transform {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    /// Creates a transform from a translation only.
    #[must_use]
    pub const fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }

    /// Creates a transform from translation, rotation and scale.
    #[must_use]
    pub const fn new(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    /// Returns the equivalent column-major matrix.
    #[must_use]
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Transforms a point (applies scale, rotation and translation).
    #[must_use]
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation * (point * self.scale) + self.translation
    }

    /// Transforms a direction (rotation only, no translation or scale).
    #[must_use]
    pub fn transform_direction(&self, dir: Vec3) -> Vec3 {
        self.rotation * dir
    }

    /// Composes `self * other` (other applied first).
    #[must_use]
    pub fn mul_transform(&self, other: &Self) -> Self {
        Self {
            translation: self.transform_point(other.translation),
            rotation: self.rotation * other.rotation,
            scale: self.scale * other.scale,
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}
