//! Eye-space corner rays for position reconstruction.
//!
//! Given a fragment's eye-space Z (recovered from depth), the eye-space
//! position is `origin + ray * z`, where `origin` and `ray` are bilinearly
//! interpolated from the four frustum corners computed here.

use glam::{Mat4, Vec3, Vec4};

/// Normalized device corners in the order x0y0, x1y0, x0y1, x1y1.
const CORNERS: [(f32, f32); 4] = [(-1.0, -1.0), (1.0, -1.0), (-1.0, 1.0), (1.0, 1.0)];

/// The view rays of a projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewRays {
    origins: [Vec3; 4],
    rays: [Vec3; 4],
}

impl ViewRays {
    /// Computes view rays from the inverse of a projection matrix.
    #[must_use]
    pub fn from_projection_inverse(projection_inverse: &Mat4) -> Self {
        let mut origins = [Vec3::ZERO; 4];
        let mut rays = [Vec3::ZERO; 4];

        for (index, &(x, y)) in CORNERS.iter().enumerate() {
            let near = unproject(projection_inverse, Vec4::new(x, y, -1.0, 1.0));
            let far = unproject(projection_inverse, Vec4::new(x, y, 1.0, 1.0));
            let difference = far - near;
            let ray = difference / difference.z;
            rays[index] = ray;
            origins[index] = near - ray * near.z;
        }

        Self { origins, rays }
    }

    /// Ray origins at the four corners.
    #[must_use]
    pub fn origins(&self) -> &[Vec3; 4] {
        &self.origins
    }

    /// Ray directions at the four corners, scaled so that `z == 1`.
    #[must_use]
    pub fn rays(&self) -> &[Vec3; 4] {
        &self.rays
    }

    /// `origin[x1y0] - origin[x0y0]`.
    #[must_use]
    pub fn origin_x0y0_to_x1y0(&self) -> Vec3 {
        self.origins[1] - self.origins[0]
    }

    /// `origin[x1y1] - origin[x0y1]`.
    #[must_use]
    pub fn origin_x0y1_to_x1y1(&self) -> Vec3 {
        self.origins[3] - self.origins[2]
    }

    /// `ray[x1y0] - ray[x0y0]`.
    #[must_use]
    pub fn ray_x0y0_to_x1y0(&self) -> Vec3 {
        self.rays[1] - self.rays[0]
    }

    /// `ray[x1y1] - ray[x0y1]`.
    #[must_use]
    pub fn ray_x0y1_to_x1y1(&self) -> Vec3 {
        self.rays[3] - self.rays[2]
    }

    /// Reconstructs an eye-space position from normalized screen
    /// coordinates in `[0, 1]` and an eye-space Z.
    #[must_use]
    pub fn reconstruct(&self, u: f32, v: f32, eye_z: f32) -> Vec3 {
        let origin_bottom = self.origins[0] + self.origin_x0y0_to_x1y0() * u;
        let origin_top = self.origins[2] + self.origin_x0y1_to_x1y1() * u;
        let ray_bottom = self.rays[0] + self.ray_x0y0_to_x1y0() * u;
        let ray_top = self.rays[2] + self.ray_x0y1_to_x1y1() * u;
        let origin = origin_bottom.lerp(origin_top, v);
        let ray = ray_bottom.lerp(ray_top, v);
        origin + ray * eye_z
    }
}

fn unproject(projection_inverse: &Mat4, ndc: Vec4) -> Vec3 {
    let p = *projection_inverse * ndc;
    p.truncate() / p.w
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Projection, ProjectionFrustum, ProjectionOrthographic};

    #[test]
    fn test_perspective_rays_pass_through_origin() {
        let p = ProjectionFrustum::new(-1.0, 1.0, -1.0, 1.0, 1.0, 100.0);
        let rays = ViewRays::from_projection_inverse(&p.make_matrix().inverse());
        for origin in rays.origins() {
            assert!(origin.abs_diff_eq(Vec3::ZERO, 1e-3));
        }
        assert!(rays.rays()[3].abs_diff_eq(Vec3::new(-1.0, -1.0, 1.0), 1e-3));
    }

    #[test]
    fn test_reconstruct_perspective_point() {
        let p = ProjectionFrustum::new(-1.0, 1.0, -1.0, 1.0, 1.0, 100.0);
        let m = p.make_matrix();
        let rays = ViewRays::from_projection_inverse(&m.inverse());
        let eye = Vec3::new(2.0, -1.0, -5.0);
        let ndc = m.project_point3(eye);
        let u = ndc.x * 0.5 + 0.5;
        let v = ndc.y * 0.5 + 0.5;
        let back = rays.reconstruct(u, v, eye.z);
        assert!(back.abs_diff_eq(eye, 1e-3));
    }

    #[test]
    fn test_orthographic_rays_are_parallel() {
        let p = ProjectionOrthographic::new(-2.0, 2.0, -3.0, 3.0, 1.0, 10.0);
        let rays = ViewRays::from_projection_inverse(&p.make_matrix().inverse());
        for ray in rays.rays() {
            assert!(ray.abs_diff_eq(Vec3::Z, 1e-4));
        }
        assert!(rays.origins()[0].abs_diff_eq(Vec3::new(-2.0, -3.0, 0.0), 1e-4));
        assert!(rays.origin_x0y0_to_x1y0().abs_diff_eq(Vec3::new(4.0, 0.0, 0.0), 1e-4));
    }
}
