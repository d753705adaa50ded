//! Rendering depth instances into a bound depth-variance buffer.

use std::fmt::Debug;

use r2_core::MatricesObserver;

use crate::{
    AreaSize, DepthInstanceUniforms, DepthInstances, RenderDevice, RenderError, RenderResult,
    TextureUnitContext,
};

/// Renders the depth moments of a set of instances.
pub trait DepthVarianceRenderer: Debug {
    /// Draws `instances` as seen by `observer` into the currently bound
    /// framebuffer, which must cover `area`.
    fn render_depth_variance_with_bound_buffer(
        &mut self,
        device: &mut dyn RenderDevice,
        area: AreaSize,
        texture_units: &mut TextureUnitContext<'_>,
        observer: &MatricesObserver<'_>,
        instances: &DepthInstances,
    ) -> RenderResult<()>;
}

/// Draws every instance with the device's depth-variance program.
#[derive(Debug, Default)]
pub struct BasicDepthVarianceRenderer {
    draws: u64,
}

impl BasicDepthVarianceRenderer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of instance draws issued.
    #[must_use]
    pub fn draw_count(&self) -> u64 {
        self.draws
    }
}

impl DepthVarianceRenderer for BasicDepthVarianceRenderer {
    fn render_depth_variance_with_bound_buffer(
        &mut self,
        device: &mut dyn RenderDevice,
        area: AreaSize,
        _texture_units: &mut TextureUnitContext<'_>,
        observer: &MatricesObserver<'_>,
        instances: &DepthInstances,
    ) -> RenderResult<()> {
        if device.framebuffer_draw_bound().is_none() {
            return Err(RenderError::FramebufferNotBound);
        }

        device.viewport_set(area);
        device.face_culling_set(instances.face_culling());

        let projection = observer.matrix_projection();
        for instance in instances.iter() {
            observer.with_transform(
                &*instance.transform,
                instance.uv,
                &mut *device,
                |scope, device| {
                    let uniforms =
                        DepthInstanceUniforms::new(scope.matrix_model_view(), projection);
                    device.draw_depth_variance(instance.array_object, &uniforms)
                },
            )?;
            self.draws += 1;
        }
        log::trace!("drew {} depth instances", instances.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        DepthInstance, FaceCulling, FramebufferDescription, HeadlessDevice, TextureUnitAllocator,
    };
    use glam::{Mat4, Vec3, Vec4};
    use r2_core::{Matrices, ProjectionOrthographic, TransformT};

    fn triangle(device: &mut HeadlessDevice) -> crate::ArrayObjectHandle {
        device
            .array_object_allocate(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]], &[0, 1, 2])
            .unwrap()
    }

    #[test]
    fn test_draws_each_instance_with_model_view() {
        let mut device = HeadlessDevice::new(4);
        let mut allocator = TextureUnitAllocator::for_device(&device, 4);
        let mut units = allocator.root_context();
        let ao = triangle(&mut device);
        let fb = device
            .framebuffer_allocate(&FramebufferDescription {
                color: Vec::new(),
                depth: None,
            })
            .unwrap();
        device.framebuffer_draw_bind(fb).unwrap();

        let mut instances = DepthInstances::new();
        instances
            .add(DepthInstance::new(1, Box::new(TransformT::new(Vec3::X)), ao))
            .unwrap();
        instances
            .add(DepthInstance::new(2, Box::new(TransformT::new(Vec3::Y)), ao))
            .unwrap();
        instances.set_face_culling(FaceCulling::Front);

        let matrices = Matrices::new();
        let projection = ProjectionOrthographic::new(-1.0, 1.0, -1.0, 1.0, 0.1, 10.0);
        let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
        let mut renderer = BasicDepthVarianceRenderer::new();
        matrices
            .with_observer(view, &projection, (), |observer, ()| {
                renderer.render_depth_variance_with_bound_buffer(
                    &mut device,
                    AreaSize::square(64),
                    &mut units,
                    observer,
                    &instances,
                )
            })
            .unwrap();

        assert_eq!(renderer.draw_count(), 2);
        let draws = device.draws();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].viewport, Some(AreaSize::square(64)));
        assert_eq!(draws[0].culling, FaceCulling::Front);
        assert_eq!(draws[0].framebuffer, Some(fb));

        let model_view = Mat4::from_cols_array_2d(&draws[1].uniforms.model_view);
        let origin = model_view * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert!((origin - Vec4::new(0.0, 1.0, -5.0, 1.0)).length() < 1e-6);
        assert_eq!(
            Mat4::from_cols_array_2d(&draws[1].uniforms.projection),
            glam::Mat4::orthographic_rh_gl(-1.0, 1.0, -1.0, 1.0, 0.1, 10.0)
        );
        assert!(!matrices.is_observer_active());
    }

    #[test]
    fn test_requires_bound_framebuffer() {
        let mut device = HeadlessDevice::new(4);
        let mut allocator = TextureUnitAllocator::for_device(&device, 4);
        let mut units = allocator.root_context();
        let matrices = Matrices::new();
        let projection = ProjectionOrthographic::new(-1.0, 1.0, -1.0, 1.0, 0.1, 10.0);
        let mut renderer = BasicDepthVarianceRenderer::new();
        let result = matrices.with_observer(Mat4::IDENTITY, &projection, (), |observer, ()| {
            renderer.render_depth_variance_with_bound_buffer(
                &mut device,
                AreaSize::square(8),
                &mut units,
                observer,
                &DepthInstances::new(),
            )
        });
        assert!(matches!(result, Err(RenderError::FramebufferNotBound)));
    }
}
