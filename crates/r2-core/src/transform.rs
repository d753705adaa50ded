//! Local transforms for instances and lights.
//!
//! Each transform writes its object-to-world matrix into a caller-provided
//! output, using a [`TransformContext`] for any temporaries. Transforms that
//! are orthonormal (no scale) can also produce a view matrix, which is how
//! lights become observers when rendering shadow maps.

use std::fmt::Debug;

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::TransformContext;

/// A transform that can produce an object-to-world matrix.
pub trait Transform: Debug {
    /// Writes the object-to-world matrix into `out`.
    fn make_matrix(&self, ctx: &mut TransformContext, out: &mut Mat4);
}

/// A transform that can also produce the corresponding view matrix.
pub trait TransformView: Transform {
    /// Writes the world-to-object (view) matrix into `out`.
    fn make_view_matrix(&self, ctx: &mut TransformContext, out: &mut Mat4);
}

/// The identity transform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformIdentity;

impl Transform for TransformIdentity {
    fn make_matrix(&self, _ctx: &mut TransformContext, out: &mut Mat4) {
        *out = Mat4::IDENTITY;
    }
}

impl TransformView for TransformIdentity {
    fn make_view_matrix(&self, _ctx: &mut TransformContext, out: &mut Mat4) {
        *out = Mat4::IDENTITY;
    }
}

/// A translation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformT {
    /// Translation component.
    pub translation: Vec3,
}

impl TransformT {
    /// Creates a translation transform.
    #[must_use]
    pub fn new(translation: Vec3) -> Self {
        Self { translation }
    }
}

impl Transform for TransformT {
    fn make_matrix(&self, _ctx: &mut TransformContext, out: &mut Mat4) {
        *out = Mat4::from_translation(self.translation);
    }
}

impl TransformView for TransformT {
    fn make_view_matrix(&self, _ctx: &mut TransformContext, out: &mut Mat4) {
        *out = Mat4::from_translation(-self.translation);
    }
}

/// An orientation followed by a translation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformOT {
    /// Orientation component.
    pub orientation: Quat,
    /// Translation component.
    pub translation: Vec3,
}

impl Default for TransformOT {
    fn default() -> Self {
        Self {
            orientation: Quat::IDENTITY,
            translation: Vec3::ZERO,
        }
    }
}

impl TransformOT {
    /// Creates a transform from an orientation and a translation.
    #[must_use]
    pub fn new(orientation: Quat, translation: Vec3) -> Self {
        Self {
            orientation,
            translation,
        }
    }

    /// Creates a transform positioned at `eye` whose negative Z axis points
    /// at `target`.
    #[must_use]
    pub fn looking_at(eye: Vec3, target: Vec3, up: Vec3) -> Self {
        let view = Mat4::look_at_rh(eye, target, up);
        let orientation = Quat::from_mat4(&view).conjugate().normalize();
        Self {
            orientation,
            translation: eye,
        }
    }
}

impl Transform for TransformOT {
    fn make_matrix(&self, _ctx: &mut TransformContext, out: &mut Mat4) {
        *out = Mat4::from_rotation_translation(self.orientation, self.translation);
    }
}

impl TransformView for TransformOT {
    fn make_view_matrix(&self, ctx: &mut TransformContext, out: &mut Mat4) {
        ctx.q_0 = self.orientation.conjugate();
        ctx.m4_0 = Mat4::from_quat(ctx.q_0);
        *out = ctx.m4_0 * Mat4::from_translation(-self.translation);
    }
}

/// An orientation, a uniform scale and a translation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformOST {
    /// Orientation component.
    pub orientation: Quat,
    /// Uniform scale.
    pub scale: f32,
    /// Translation component.
    pub translation: Vec3,
}

impl Default for TransformOST {
    fn default() -> Self {
        Self {
            orientation: Quat::IDENTITY,
            scale: 1.0,
            translation: Vec3::ZERO,
        }
    }
}

impl Transform for TransformOST {
    fn make_matrix(&self, ctx: &mut TransformContext, out: &mut Mat4) {
        ctx.v3_0 = Vec3::splat(self.scale);
        *out = Mat4::from_scale_rotation_translation(ctx.v3_0, self.orientation, self.translation);
    }
}

/// A per-axis scale, an orientation and a translation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformSOT {
    /// Scale component.
    pub scale: Vec3,
    /// Orientation component.
    pub orientation: Quat,
    /// Translation component.
    pub translation: Vec3,
}

impl Default for TransformSOT {
    fn default() -> Self {
        Self {
            scale: Vec3::ONE,
            orientation: Quat::IDENTITY,
            translation: Vec3::ZERO,
        }
    }
}

impl TransformSOT {
    /// Decomposes a matrix into scale, orientation and translation.
    ///
    /// This decomposition may not be exact for matrices with shear.
    #[must_use]
    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, orientation, translation) = matrix.to_scale_rotation_translation();
        Self {
            scale,
            orientation,
            translation,
        }
    }
}

impl Transform for TransformSOT {
    fn make_matrix(&self, _ctx: &mut TransformContext, out: &mut Mat4) {
        *out =
            Mat4::from_scale_rotation_translation(self.scale, self.orientation, self.translation);
    }
}

/// An explicitly specified matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformMatrix {
    /// The object-to-world matrix.
    pub matrix: Mat4,
}

impl TransformMatrix {
    /// Wraps a matrix.
    #[must_use]
    pub fn new(matrix: Mat4) -> Self {
        Self { matrix }
    }
}

impl Transform for TransformMatrix {
    fn make_matrix(&self, _ctx: &mut TransformContext, out: &mut Mat4) {
        *out = self.matrix;
    }
}
