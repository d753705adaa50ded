//! Shadow-casting lights.

use glam::Vec3;
use r2_core::{IdPool, Projection, ProjectiveLight, TransformOT, TransformView};

use crate::DepthVarianceBufferDescription;

/// A variance shadow attached to a light.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowDepthVariance {
    shadow_id: u64,
    map_description: DepthVarianceBufferDescription,
    /// Lower bound on the variance used when sampling the map.
    pub minimum_variance: f32,
    /// Fraction of the shadow falloff discarded to reduce light bleeding.
    pub light_bleed_reduction: f32,
    /// Lowest light factor a shadowed fragment receives.
    pub factor_minimum: f32,
}

impl ShadowDepthVariance {
    /// Creates a shadow with a fresh id and default sampling parameters.
    pub fn new(
        id_pool: &IdPool,
        map_description: DepthVarianceBufferDescription,
    ) -> r2_core::Result<Self> {
        Ok(Self {
            shadow_id: id_pool.fresh_id()?,
            map_description,
            minimum_variance: 0.000_02,
            light_bleed_reduction: 0.2,
            factor_minimum: 0.2,
        })
    }

    #[must_use]
    pub fn shadow_id(&self) -> u64 {
        self.shadow_id
    }

    /// The description of the buffer the shadow is rendered into.
    #[must_use]
    pub fn map_description(&self) -> &DepthVarianceBufferDescription {
        &self.map_description
    }
}

/// A projective light that casts a variance shadow.
pub trait LightWithShadow: ProjectiveLight {
    fn shadow(&self) -> &ShadowDepthVariance;
}

/// A projective light with a variance shadow.
#[derive(Debug)]
pub struct LightProjectiveWithShadowVariance {
    id: u64,
    pub transform: TransformOT,
    projection: Box<dyn Projection>,
    shadow: ShadowDepthVariance,
    pub color: Vec3,
    intensity: f32,
    pub falloff: f32,
    radius: f32,
}

impl LightProjectiveWithShadowVariance {
    /// Creates a white light at the origin with a fresh id.
    pub fn new(
        id_pool: &IdPool,
        projection: Box<dyn Projection>,
        shadow: ShadowDepthVariance,
    ) -> r2_core::Result<Self> {
        Ok(Self {
            id: id_pool.fresh_id()?,
            transform: TransformOT::default(),
            projection,
            shadow,
            color: Vec3::ONE,
            intensity: 1.0,
            falloff: 1.0,
            radius: 1.0,
        })
    }

    #[must_use]
    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    /// Sets the intensity, clamped to be non-negative.
    pub fn set_intensity(&mut self, intensity: f32) {
        self.intensity = intensity.max(0.0);
    }

    #[must_use]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Sets the radius, clamped to a small positive minimum.
    pub fn set_radius(&mut self, radius: f32) {
        self.radius = radius.max(0.001);
    }

    pub fn projection_mut(&mut self) -> &mut dyn Projection {
        &mut *self.projection
    }
}

impl ProjectiveLight for LightProjectiveWithShadowVariance {
    fn light_id(&self) -> u64 {
        self.id
    }

    fn transform(&self) -> &dyn TransformView {
        &self.transform
    }

    fn projection(&self) -> &dyn Projection {
        &*self.projection
    }
}

impl LightWithShadow for LightProjectiveWithShadowVariance {
    fn shadow(&self) -> &ShadowDepthVariance {
        &self.shadow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AreaSize;
    use r2_core::ProjectionFov;

    #[test]
    fn test_ids_are_distinct() {
        let pool = IdPool::new();
        let description = DepthVarianceBufferDescription::new(AreaSize::square(64));
        let shadow = ShadowDepthVariance::new(&pool, description).unwrap();
        let light = LightProjectiveWithShadowVariance::new(
            &pool,
            Box::new(ProjectionFov::new(1.0, 1.0, 0.1, 50.0)),
            shadow,
        )
        .unwrap();
        assert_eq!(light.shadow().shadow_id(), 0);
        assert_eq!(light.light_id(), 1);
        assert_eq!(light.shadow().map_description().area, AreaSize::square(64));
        assert_eq!(light.projection().z_far(), 50.0);
    }

    #[test]
    fn test_clamped_setters() {
        let pool = IdPool::new();
        let description = DepthVarianceBufferDescription::new(AreaSize::square(8));
        let shadow = ShadowDepthVariance::new(&pool, description).unwrap();
        let mut light = LightProjectiveWithShadowVariance::new(
            &pool,
            Box::new(ProjectionFov::new(1.0, 1.0, 0.1, 50.0)),
            shadow,
        )
        .unwrap();
        light.set_intensity(-2.0);
        light.set_radius(0.0);
        assert_eq!(light.intensity(), 0.0);
        assert_eq!(light.radius(), 0.001);
        light.projection_mut().set_z_far(20.0);
        assert_eq!(light.projection().z_far(), 20.0);
    }
}
