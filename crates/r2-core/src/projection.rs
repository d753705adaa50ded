//! Projections for observers and projective lights.
//!
//! All matrices follow OpenGL clip conventions: right-handed eye space
//! looking down negative Z, normalized device Z in `[-1, 1]`.

use std::fmt::Debug;

use glam::{Mat4, Vec4};
use serde::{Deserialize, Serialize};

/// A projection that can produce a clip matrix.
pub trait Projection: Debug {
    /// Returns the eye-to-clip matrix.
    fn make_matrix(&self) -> Mat4;

    /// Distance to the near clipping plane.
    fn z_near(&self) -> f32;

    /// Distance to the far clipping plane.
    fn z_far(&self) -> f32;

    /// Sets the distance to the near clipping plane.
    fn set_z_near(&mut self, z_near: f32);

    /// Sets the distance to the far clipping plane.
    fn set_z_far(&mut self, z_far: f32);
}

/// Computes a perspective matrix from near-plane extents, as `glFrustum` does.
#[must_use]
pub fn frustum_matrix(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    let width = right - left;
    let height = top - bottom;
    let depth = far - near;
    Mat4::from_cols(
        Vec4::new(2.0 * near / width, 0.0, 0.0, 0.0),
        Vec4::new(0.0, 2.0 * near / height, 0.0, 0.0),
        Vec4::new(
            (right + left) / width,
            (top + bottom) / height,
            -(far + near) / depth,
            -1.0,
        ),
        Vec4::new(0.0, 0.0, -2.0 * far * near / depth, 0.0),
    )
}

/// An orthographic projection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectionOrthographic {
    pub x_min: f32,
    pub x_max: f32,
    pub y_min: f32,
    pub y_max: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl ProjectionOrthographic {
    /// Creates an orthographic projection.
    #[must_use]
    pub fn new(x_min: f32, x_max: f32, y_min: f32, y_max: f32, z_near: f32, z_far: f32) -> Self {
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
            z_near,
            z_far,
        }
    }
}

impl Projection for ProjectionOrthographic {
    fn make_matrix(&self) -> Mat4 {
        Mat4::orthographic_rh_gl(
            self.x_min,
            self.x_max,
            self.y_min,
            self.y_max,
            self.z_near,
            self.z_far,
        )
    }

    fn z_near(&self) -> f32 {
        self.z_near
    }

    fn z_far(&self) -> f32 {
        self.z_far
    }

    fn set_z_near(&mut self, z_near: f32) {
        self.z_near = z_near;
    }

    fn set_z_far(&mut self, z_far: f32) {
        self.z_far = z_far;
    }
}

/// A perspective projection given by its near-plane extents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectionFrustum {
    pub x_min: f32,
    pub x_max: f32,
    pub y_min: f32,
    pub y_max: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl ProjectionFrustum {
    /// Creates a frustum projection.
    #[must_use]
    pub fn new(x_min: f32, x_max: f32, y_min: f32, y_max: f32, z_near: f32, z_far: f32) -> Self {
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
            z_near,
            z_far,
        }
    }
}

impl Projection for ProjectionFrustum {
    fn make_matrix(&self) -> Mat4 {
        frustum_matrix(
            self.x_min,
            self.x_max,
            self.y_min,
            self.y_max,
            self.z_near,
            self.z_far,
        )
    }

    fn z_near(&self) -> f32 {
        self.z_near
    }

    fn z_far(&self) -> f32 {
        self.z_far
    }

    fn set_z_near(&mut self, z_near: f32) {
        self.z_near = z_near;
    }

    fn set_z_far(&mut self, z_far: f32) {
        self.z_far = z_far;
    }
}

/// A symmetric perspective projection given by a horizontal field of view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectionFov {
    /// Horizontal field of view in radians.
    pub horizontal_fov: f32,
    /// Width divided by height.
    pub aspect: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl ProjectionFov {
    /// Creates a field-of-view projection.
    #[must_use]
    pub fn new(horizontal_fov: f32, aspect: f32, z_near: f32, z_far: f32) -> Self {
        Self {
            horizontal_fov,
            aspect,
            z_near,
            z_far,
        }
    }

    /// Half the width of the near plane.
    #[must_use]
    pub fn near_x_max(&self) -> f32 {
        self.z_near * (self.horizontal_fov * 0.5).tan()
    }

    /// Half the height of the near plane.
    #[must_use]
    pub fn near_y_max(&self) -> f32 {
        self.near_x_max() / self.aspect
    }

    pub fn set_horizontal_fov(&mut self, horizontal_fov: f32) {
        self.horizontal_fov = horizontal_fov;
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }
}

impl Projection for ProjectionFov {
    fn make_matrix(&self) -> Mat4 {
        let x = self.near_x_max();
        let y = self.near_y_max();
        frustum_matrix(-x, x, -y, y, self.z_near, self.z_far)
    }

    fn z_near(&self) -> f32 {
        self.z_near
    }

    fn z_far(&self) -> f32 {
        self.z_far
    }

    fn set_z_near(&mut self, z_near: f32) {
        self.z_near = z_near;
    }

    fn set_z_far(&mut self, z_far: f32) {
        self.z_far = z_far;
    }
}
