//! Reusable scratch space for matrix composition.

use glam::{Mat3, Mat4, Quat, Vec3};

/// Scratch temporaries used while composing matrices.
///
/// A context is owned by whatever drives composition (a [`crate::Matrices`]
/// root, a shadow renderer) and is passed by `&mut` into every transform, so
/// the per-instance path never allocates.
#[derive(Debug, Clone)]
pub struct TransformContext {
    pub(crate) m4_0: Mat4,
    pub(crate) m4_1: Mat4,
    pub(crate) m3_0: Mat3,
    pub(crate) v3_0: Vec3,
    pub(crate) q_0: Quat,
}

impl Default for TransformContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformContext {
    /// Creates a new context with identity temporaries.
    #[must_use]
    pub fn new() -> Self {
        Self {
            m4_0: Mat4::IDENTITY,
            m4_1: Mat4::IDENTITY,
            m3_0: Mat3::IDENTITY,
            v3_0: Vec3::ZERO,
            q_0: Quat::IDENTITY,
        }
    }

    /// Writes the normal matrix for `model_view` into `out`: the
    /// inverse-transpose of its upper 3x3.
    pub fn make_normal_matrix(&mut self, model_view: &Mat4, out: &mut Mat3) {
        self.m3_0 = Mat3::from_mat4(*model_view);
        *out = self.m3_0.inverse().transpose();
    }

    /// Writes `left * right` into `out`.
    pub fn multiply(&mut self, left: &Mat4, right: &Mat4, out: &mut Mat4) {
        self.m4_1 = left.mul_mat4(right);
        *out = self.m4_1;
    }
}
