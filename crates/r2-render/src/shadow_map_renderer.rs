//! The shadow map rendering state machine.
//!
//! A frame renders shadow maps in three steps:
//!
//! 1. [`ShadowMapRenderer::shadow_begin`] opens an execution.
//! 2. [`ShadowMapRendererExecution::shadow_exec_render_light`] renders the
//!    shadow of each light into a depth-variance buffer taken from the pool.
//! 3. [`ShadowMapRendererExecution::shadow_exec_complete`] yields a
//!    [`ShadowMapContext`] from which light renderers look up the maps.
//!    [`ShadowMapContext::shadow_map_context_finish`] returns every buffer to
//!    the pool and closes the execution.
//!
//! Only one execution may be open per renderer. An execution or context that
//! is dropped without being finished, for example when a frame bails out with
//! `?`, returns its maps to the pool and closes the execution.

use std::rc::Rc;

use glam::Mat4;
use r2_core::{Matrices, MatricesObserver, TransformContext};

use crate::{
    DepthInstances, DepthVarianceBuffer, DepthVarianceRenderer, LightWithShadow,
    ProfilingContext, RenderDevice, RenderError, RenderResult, RenderTarget,
    SharedDepthVarianceBufferPool, TextureUnitContext,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExecutionState {
    Idle,
    Executing,
    ContextActive,
}

#[derive(Debug)]
struct RendererState {
    state: ExecutionState,
    pool: SharedDepthVarianceBufferPool,
    renderer: Box<dyn DepthVarianceRenderer>,
    shadow_maps: Vec<(u64, Rc<DepthVarianceBuffer>)>,
    transform_context: TransformContext,
    deleted: bool,
}

impl RendererState {
    fn check_executing(&self) -> RenderResult<()> {
        match self.state {
            ExecutionState::Executing => Ok(()),
            ExecutionState::ContextActive => Err(RenderError::ShadowMapContextAlreadyActive),
            ExecutionState::Idle => Err(RenderError::ShadowExecutionNotActive),
        }
    }

    /// Closes an execution that was dropped without being finished.
    fn abandon(&mut self) {
        if self.state == ExecutionState::Idle {
            return;
        }
        log::warn!(
            "shadow execution dropped without finish, returning {} maps",
            self.shadow_maps.len()
        );
        self.state = ExecutionState::Idle;
        if let Err(error) = self.return_shadow_maps() {
            log::warn!("failed to return abandoned shadow maps: {error}");
        }
    }

    /// Returns every rendered map to the pool, reporting the first failure.
    fn return_shadow_maps(&mut self) -> RenderResult<()> {
        let mut result = Ok(());
        let mut pool = self.pool.borrow_mut();
        for (shadow_id, map) in self.shadow_maps.drain(..) {
            if let Err(error) = pool.return_value(map) {
                log::warn!("failed to return shadow map {shadow_id}: {error}");
                if result.is_ok() {
                    result = Err(error);
                }
            }
        }
        result
    }

    fn render_variance(
        &mut self,
        device: &mut dyn RenderDevice,
        texture_units: &mut TextureUnitContext<'_>,
        matrices: &Matrices,
        light: &dyn LightWithShadow,
        instances: &DepthInstances,
    ) -> RenderResult<()> {
        let shadow = light.shadow();
        let buffer = self
            .pool
            .borrow_mut()
            .get(device, texture_units, shadow.map_description())?;

        let mut view = Mat4::IDENTITY;
        light
            .transform()
            .make_view_matrix(&mut self.transform_context, &mut view);

        let renderer = &mut *self.renderer;
        let drawn = matrices.with_observer(
            view,
            light.projection(),
            (&mut *device, &mut *texture_units),
            |observer, (device, texture_units)| {
                draw_shadow_map(renderer, device, texture_units, observer, &buffer, instances)
            },
        );

        if let Err(error) = drawn {
            if let Err(returned) = self.pool.borrow_mut().return_value(buffer) {
                log::warn!("failed to return shadow map after error: {returned}");
            }
            return Err(error);
        }

        let shadow_id = shadow.shadow_id();
        log::debug!(
            "rendered shadow {shadow_id} of light {} ({} instances)",
            light.light_id(),
            instances.len()
        );
        let existing = self.shadow_maps.iter().position(|(id, _)| *id == shadow_id);
        match existing {
            Some(index) => {
                let previous = std::mem::replace(&mut self.shadow_maps[index].1, buffer);
                self.pool.borrow_mut().return_value(previous)
            }
            None => {
                self.shadow_maps.push((shadow_id, buffer));
                Ok(())
            }
        }
    }
}

fn draw_shadow_map(
    renderer: &mut dyn DepthVarianceRenderer,
    device: &mut dyn RenderDevice,
    texture_units: &mut TextureUnitContext<'_>,
    observer: &MatricesObserver<'_>,
    buffer: &DepthVarianceBuffer,
    instances: &DepthInstances,
) -> RenderResult<()> {
    device.framebuffer_draw_bind(buffer.primary_framebuffer())?;
    let drawn = buffer.clear_bound_primary_framebuffer(device).and_then(|()| {
        renderer.render_depth_variance_with_bound_buffer(
            device,
            buffer.size(),
            texture_units,
            observer,
            instances,
        )
    });
    device.framebuffer_draw_unbind();
    drawn?;

    if buffer.description().minification_filter.uses_mipmaps() {
        let mut child = texture_units.child_with_reserved(1)?;
        let regenerated = child
            .bind_texture_2d(device, buffer.depth_variance_texture())
            .and_then(|unit| device.texture_2d_regenerate_mipmaps(unit));
        child.finish(device)?;
        regenerated?;
    }
    Ok(())
}

/// Renders variance shadow maps for shadow-casting lights.
#[derive(Debug)]
pub struct ShadowMapRenderer {
    inner: RendererState,
}

impl ShadowMapRenderer {
    /// Creates a renderer that takes buffers from `pool` and draws them with
    /// `renderer`.
    #[must_use]
    pub fn new(
        pool: SharedDepthVarianceBufferPool,
        renderer: Box<dyn DepthVarianceRenderer>,
    ) -> Self {
        Self {
            inner: RendererState {
                state: ExecutionState::Idle,
                pool,
                renderer,
                shadow_maps: Vec::new(),
                transform_context: TransformContext::new(),
                deleted: false,
            },
        }
    }

    /// Opens an execution.
    ///
    /// Fails with [`RenderError::ShadowExecutionAlreadyActive`] if an
    /// earlier execution was leaked without being dropped.
    pub fn shadow_begin(&mut self) -> RenderResult<ShadowMapRendererExecution<'_>> {
        if self.inner.deleted {
            return Err(RenderError::ShadowRendererDeleted);
        }
        if self.inner.state != ExecutionState::Idle {
            return Err(RenderError::ShadowExecutionAlreadyActive);
        }
        log::trace!("shadow execution begin");
        self.inner.state = ExecutionState::Executing;
        Ok(ShadowMapRendererExecution {
            inner: &mut self.inner,
        })
    }

    /// Returns `true` while an execution is open.
    #[must_use]
    pub fn is_executing(&self) -> bool {
        self.inner.state != ExecutionState::Idle
    }

    /// Returns any outstanding shadow maps to the pool and marks the renderer
    /// deleted. Later executions fail with
    /// [`RenderError::ShadowRendererDeleted`].
    pub fn delete(&mut self) -> RenderResult<()> {
        if self.inner.deleted {
            return Ok(());
        }
        log::debug!("delete shadow map renderer");
        self.inner.deleted = true;
        self.inner.state = ExecutionState::Idle;
        self.inner.return_shadow_maps()
    }

    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.inner.deleted
    }
}

/// An open shadow map execution.
#[derive(Debug)]
pub struct ShadowMapRendererExecution<'r> {
    inner: &'r mut RendererState,
}

impl ShadowMapRendererExecution<'_> {
    /// Renders the shadow map of `light` from `instances`.
    ///
    /// The light's view and projection are installed as an observer on
    /// `matrices`, so no observer may be open there. Rendering a shadow that
    /// was already rendered in this execution replaces the earlier map and
    /// returns it to the pool.
    pub fn shadow_exec_render_light(
        &mut self,
        profiling: &mut ProfilingContext,
        device: &mut dyn RenderDevice,
        texture_units: &mut TextureUnitContext<'_>,
        matrices: &Matrices,
        light: &dyn LightWithShadow,
        instances: &DepthInstances,
    ) -> RenderResult<()> {
        self.inner.check_executing()?;

        let variance = profiling.child("shadow-map-renderer").child("variance");
        variance.start_measuring_if_enabled();
        let rendered = self
            .inner
            .render_variance(device, texture_units, matrices, light, instances);
        variance.stop_measuring();
        rendered
    }

    /// Finishes rendering and opens the context for reading shadow maps.
    pub fn shadow_exec_complete(&mut self) -> RenderResult<ShadowMapContext<'_>> {
        self.inner.check_executing()?;
        log::trace!(
            "shadow execution complete with {} maps",
            self.inner.shadow_maps.len()
        );
        self.inner.state = ExecutionState::ContextActive;
        Ok(ShadowMapContext {
            inner: &mut *self.inner,
        })
    }
}

impl Drop for ShadowMapRendererExecution<'_> {
    fn drop(&mut self) {
        self.inner.abandon();
    }
}

/// Read access to the shadow maps rendered by one execution.
#[derive(Debug)]
pub struct ShadowMapContext<'c> {
    inner: &'c mut RendererState,
}

impl ShadowMapContext<'_> {
    /// The shadow map rendered for `light`.
    ///
    /// Fails with [`RenderError::ShadowNotRendered`] if the light's shadow
    /// was not rendered in this execution.
    pub fn shadow_map_get(
        &self,
        light: &dyn LightWithShadow,
    ) -> RenderResult<&DepthVarianceBuffer> {
        let shadow_id = light.shadow().shadow_id();
        self.inner
            .shadow_maps
            .iter()
            .find(|(id, _)| *id == shadow_id)
            .map(|(_, map)| &**map)
            .ok_or(RenderError::ShadowNotRendered {
                light: light.light_id(),
                shadow: shadow_id,
            })
    }

    /// Number of shadow maps rendered.
    #[must_use]
    pub fn shadow_map_count(&self) -> usize {
        self.inner.shadow_maps.len()
    }

    /// Returns every shadow map to the pool and closes the execution.
    ///
    /// Dropping the context has the same effect but only logs failures.
    pub fn shadow_map_context_finish(self) -> RenderResult<()> {
        log::trace!("shadow map context finish");
        self.inner.state = ExecutionState::Idle;
        self.inner.return_shadow_maps()
    }
}

impl Drop for ShadowMapContext<'_> {
    fn drop(&mut self) {
        if self.inner.state == ExecutionState::ContextActive {
            self.inner.abandon();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        AreaSize, ArrayObjectHandle, BasicDepthVarianceRenderer, DepthInstance,
        DepthVarianceBufferDescription, DepthVarianceBufferPool, HeadlessDevice,
        LightProjectiveWithShadowVariance, ShadowDepthVariance, TextureFilterMinification,
        TextureUnitAllocator,
    };
    use glam::Vec3;
    use r2_core::{IdPool, PoolLimits, ProjectionFov, ProjectiveLight, R2Error, TransformT};

    struct Fixture {
        device: HeadlessDevice,
        units: TextureUnitAllocator,
        pool: SharedDepthVarianceBufferPool,
        ids: IdPool,
        matrices: Matrices,
        profiling: ProfilingContext,
        instances: DepthInstances,
    }

    impl Fixture {
        fn new(limits: PoolLimits) -> Self {
            let mut device = HeadlessDevice::new(8);
            let units = TextureUnitAllocator::for_device(&device, 4);
            let ao = device
                .array_object_allocate(
                    &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
                    &[0, 1, 2],
                )
                .unwrap();
            let mut instances = DepthInstances::new();
            instances
                .add(DepthInstance::new(100, Box::new(TransformT::new(Vec3::Z)), ao))
                .unwrap();
            Self {
                device,
                units,
                pool: DepthVarianceBufferPool::new_shared(limits),
                ids: IdPool::new(),
                matrices: Matrices::new(),
                profiling: ProfilingContext::new_root("frame", true),
                instances,
            }
        }

        fn renderer(&self) -> ShadowMapRenderer {
            ShadowMapRenderer::new(
                Rc::clone(&self.pool),
                Box::new(BasicDepthVarianceRenderer::new()),
            )
        }

        fn light(&self, size: u32) -> LightProjectiveWithShadowVariance {
            self.light_with(DepthVarianceBufferDescription::new(AreaSize::square(size)))
        }

        fn light_with(
            &self,
            description: DepthVarianceBufferDescription,
        ) -> LightProjectiveWithShadowVariance {
            let shadow = ShadowDepthVariance::new(&self.ids, description).unwrap();
            LightProjectiveWithShadowVariance::new(
                &self.ids,
                Box::new(ProjectionFov::new(1.0, 1.0, 0.1, 20.0)),
                shadow,
            )
            .unwrap()
        }

        fn render(
            &mut self,
            execution: &mut ShadowMapRendererExecution<'_>,
            light: &dyn LightWithShadow,
        ) -> RenderResult<()> {
            let mut root = self.units.root_context();
            execution.shadow_exec_render_light(
                &mut self.profiling,
                &mut self.device,
                &mut root,
                &self.matrices,
                light,
                &self.instances,
            )
        }
    }

    fn roomy() -> PoolLimits {
        PoolLimits::new(1 << 20, 1 << 24)
    }

    #[test]
    fn test_full_cycle_returns_maps() {
        let mut fx = Fixture::new(roomy());
        let mut renderer = fx.renderer();
        let a = fx.light(16);
        let b = fx.light(32);

        let mut execution = renderer.shadow_begin().unwrap();
        fx.render(&mut execution, &a).unwrap();
        fx.render(&mut execution, &b).unwrap();
        assert_eq!(fx.pool.borrow().count_in_use(), 2);
        assert!(!fx.matrices.is_observer_active());
        assert_eq!(fx.device.framebuffer_draw_bound(), None);
        assert_eq!(fx.device.draws().len(), 2);
        assert_eq!(fx.device.clears().len(), 2);

        let context = execution.shadow_exec_complete().unwrap();
        assert_eq!(context.shadow_map_count(), 2);
        let map_a = context.shadow_map_get(&a).unwrap();
        let map_b = context.shadow_map_get(&b).unwrap();
        assert_eq!(map_a.size(), AreaSize::square(16));
        assert_eq!(map_b.size(), AreaSize::square(32));
        assert_eq!(fx.device.draws()[0].framebuffer, Some(map_a.primary_framebuffer()));

        context.shadow_map_context_finish().unwrap();
        assert_eq!(fx.pool.borrow().count_in_use(), 0);
        assert_eq!(fx.pool.borrow().count_available(), 2);
        drop(execution);
        assert!(!renderer.is_executing());

        let variance = &fx.profiling.children()[0].children()[0];
        assert_eq!(variance.name(), "variance");
        assert!(variance.elapsed().is_some());
    }

    #[test]
    fn test_unrendered_light() {
        let mut fx = Fixture::new(roomy());
        let mut renderer = fx.renderer();
        let rendered = fx.light(16);
        let skipped = fx.light(16);

        let mut execution = renderer.shadow_begin().unwrap();
        fx.render(&mut execution, &rendered).unwrap();
        let context = execution.shadow_exec_complete().unwrap();
        let result = context.shadow_map_get(&skipped);
        assert!(matches!(
            result,
            Err(RenderError::ShadowNotRendered { light, shadow })
                if light == skipped.light_id() && shadow == skipped.shadow().shadow_id()
        ));
        context.shadow_map_context_finish().unwrap();
    }

    #[test]
    fn test_begin_after_leaked_execution() {
        let fx = Fixture::new(roomy());
        let mut renderer = fx.renderer();
        std::mem::forget(renderer.shadow_begin().unwrap());
        assert!(renderer.is_executing());
        assert!(matches!(
            renderer.shadow_begin(),
            Err(RenderError::ShadowExecutionAlreadyActive)
        ));
    }

    #[test]
    fn test_dropped_execution_returns_maps() {
        let mut fx = Fixture::new(roomy());
        let mut renderer = fx.renderer();
        let light = fx.light(16);

        let mut execution = renderer.shadow_begin().unwrap();
        fx.render(&mut execution, &light).unwrap();
        assert_eq!(fx.pool.borrow().count_in_use(), 1);
        drop(execution);

        assert!(!renderer.is_executing());
        assert_eq!(fx.pool.borrow().count_in_use(), 0);
        assert_eq!(fx.pool.borrow().count_available(), 1);
        assert!(renderer.shadow_begin().is_ok());
    }

    #[test]
    fn test_dropped_context_returns_maps() {
        let mut fx = Fixture::new(roomy());
        let mut renderer = fx.renderer();
        let light = fx.light(16);

        let mut execution = renderer.shadow_begin().unwrap();
        fx.render(&mut execution, &light).unwrap();
        drop(execution.shadow_exec_complete().unwrap());
        assert_eq!(fx.pool.borrow().count_in_use(), 0);
        assert!(matches!(
            execution.shadow_exec_complete(),
            Err(RenderError::ShadowExecutionNotActive)
        ));
        drop(execution);

        let mut execution = renderer.shadow_begin().unwrap();
        fx.render(&mut execution, &light).unwrap();
        let context = execution.shadow_exec_complete().unwrap();
        assert!(context.shadow_map_get(&light).is_ok());
        context.shadow_map_context_finish().unwrap();
        assert_eq!(fx.pool.borrow().count_available(), 1);
    }

    #[test]
    fn test_frame_abandoned_with_question_mark() {
        fn frame(
            fx: &mut Fixture,
            renderer: &mut ShadowMapRenderer,
            lights: &[&dyn LightWithShadow],
        ) -> RenderResult<()> {
            let mut execution = renderer.shadow_begin()?;
            for light in lights {
                fx.render(&mut execution, *light)?;
            }
            let context = execution.shadow_exec_complete()?;
            context.shadow_map_context_finish()
        }

        let mut fx = Fixture::new(PoolLimits::new(0, 2048));
        let mut renderer = fx.renderer();
        let fits = fx.light(8);
        let too_large = fx.light(64);

        let result = frame(&mut fx, &mut renderer, &[&fits, &too_large]);
        assert!(matches!(result, Err(RenderError::PoolHardLimitExceeded { .. })));
        assert!(!renderer.is_executing());
        assert_eq!(fx.pool.borrow().count_in_use(), 0);

        frame(&mut fx, &mut renderer, &[&fits]).unwrap();
        assert_eq!(fx.pool.borrow().count_in_use(), 0);
    }

    #[test]
    fn test_transitions_after_complete_and_finish() {
        let mut fx = Fixture::new(roomy());
        let mut renderer = fx.renderer();
        let light = fx.light(16);
        let mut execution = renderer.shadow_begin().unwrap();

        std::mem::forget(execution.shadow_exec_complete().unwrap());
        assert!(matches!(
            execution.shadow_exec_complete(),
            Err(RenderError::ShadowMapContextAlreadyActive)
        ));
        assert!(matches!(
            fx.render(&mut execution, &light),
            Err(RenderError::ShadowMapContextAlreadyActive)
        ));

        let mut fx = Fixture::new(roomy());
        let mut renderer = fx.renderer();
        let mut execution = renderer.shadow_begin().unwrap();
        execution
            .shadow_exec_complete()
            .unwrap()
            .shadow_map_context_finish()
            .unwrap();
        assert!(matches!(
            execution.shadow_exec_complete(),
            Err(RenderError::ShadowExecutionNotActive)
        ));
        assert!(matches!(
            fx.render(&mut execution, &light),
            Err(RenderError::ShadowExecutionNotActive)
        ));
        drop(execution);
        assert!(renderer.shadow_begin().is_ok());
    }

    #[test]
    fn test_second_execution_reuses_buffers() {
        let mut fx = Fixture::new(roomy());
        let mut renderer = fx.renderer();
        let light = fx.light(16);

        for _ in 0..2 {
            let mut execution = renderer.shadow_begin().unwrap();
            fx.render(&mut execution, &light).unwrap();
            execution
                .shadow_exec_complete()
                .unwrap()
                .shadow_map_context_finish()
                .unwrap();
        }
        assert_eq!(fx.pool.borrow().count_available(), 1);
        assert_eq!(fx.device.framebuffer_count(), 1);
    }

    #[test]
    fn test_rendering_twice_replaces_map() {
        let mut fx = Fixture::new(roomy());
        let mut renderer = fx.renderer();
        let light = fx.light(16);

        let mut execution = renderer.shadow_begin().unwrap();
        fx.render(&mut execution, &light).unwrap();
        fx.render(&mut execution, &light).unwrap();
        assert_eq!(fx.pool.borrow().count_in_use(), 1);
        assert_eq!(fx.pool.borrow().count_available(), 1);

        let context = execution.shadow_exec_complete().unwrap();
        assert_eq!(context.shadow_map_count(), 1);
        let latest = context.shadow_map_get(&light).unwrap().primary_framebuffer();
        assert_eq!(fx.device.draws()[1].framebuffer, Some(latest));
        context.shadow_map_context_finish().unwrap();
        assert_eq!(fx.pool.borrow().count_available(), 2);
    }

    #[test]
    fn test_mipmaps_regenerated_for_mipmap_filters() {
        let mut fx = Fixture::new(roomy());
        let mut renderer = fx.renderer();
        let mut description = DepthVarianceBufferDescription::new(AreaSize::square(16));
        description.minification_filter = TextureFilterMinification::LinearMipmapLinear;
        let mipmapped = fx.light_with(description);
        let plain = fx.light(16);

        let mut execution = renderer.shadow_begin().unwrap();
        fx.render(&mut execution, &plain).unwrap();
        assert!(fx.device.mipmap_regenerations().is_empty());
        fx.render(&mut execution, &mipmapped).unwrap();

        let context = execution.shadow_exec_complete().unwrap();
        let texture = context
            .shadow_map_get(&mipmapped)
            .unwrap()
            .depth_variance_texture();
        assert_eq!(fx.device.mipmap_regenerations(), &[texture]);
        context.shadow_map_context_finish().unwrap();
    }

    #[test]
    fn test_open_observer_fails_and_returns_buffer() {
        let mut fx = Fixture::new(roomy());
        let mut renderer = fx.renderer();
        let light = fx.light(16);
        let mut execution = renderer.shadow_begin().unwrap();

        let matrices = Matrices::new();
        let projection = ProjectionFov::new(1.0, 1.0, 0.1, 10.0);
        let result = matrices.with_observer(Mat4::IDENTITY, &projection, (), |_, ()| {
            let mut root = fx.units.root_context();
            execution.shadow_exec_render_light(
                &mut fx.profiling,
                &mut fx.device,
                &mut root,
                &matrices,
                &light,
                &fx.instances,
            )
        });
        assert!(matches!(
            result,
            Err(RenderError::Core(R2Error::ObserverAlreadyActive))
        ));
        assert_eq!(fx.pool.borrow().count_in_use(), 0);
        assert_eq!(fx.pool.borrow().count_available(), 1);

        fx.render(&mut execution, &light).unwrap();
        let context = execution.shadow_exec_complete().unwrap();
        assert!(context.shadow_map_get(&light).is_ok());
        context.shadow_map_context_finish().unwrap();
    }

    #[test]
    fn test_pool_exhaustion_keeps_execution_open() {
        let mut fx = Fixture::new(PoolLimits::new(0, 1024));
        let mut renderer = fx.renderer();
        let small = fx.light(8);
        let large = fx.light(64);

        let mut execution = renderer.shadow_begin().unwrap();
        let result = fx.render(&mut execution, &large);
        assert!(matches!(result, Err(ref e) if e.is_resource_exhaustion()));
        fx.render(&mut execution, &small).unwrap();

        let context = execution.shadow_exec_complete().unwrap();
        assert!(context.shadow_map_get(&small).is_ok());
        context.shadow_map_context_finish().unwrap();
    }

    #[test]
    fn test_delete_returns_outstanding_maps() {
        let mut fx = Fixture::new(roomy());
        let mut renderer = fx.renderer();
        let light = fx.light(16);

        let mut execution = renderer.shadow_begin().unwrap();
        fx.render(&mut execution, &light).unwrap();
        std::mem::forget(execution);
        assert_eq!(fx.pool.borrow().count_in_use(), 1);

        renderer.delete().unwrap();
        assert!(renderer.is_deleted());
        assert!(!renderer.is_executing());
        assert_eq!(fx.pool.borrow().count_in_use(), 0);
        assert!(matches!(
            renderer.shadow_begin(),
            Err(RenderError::ShadowRendererDeleted)
        ));
        renderer.delete().unwrap();
    }

    #[test]
    fn test_unknown_instance_geometry_is_reported() {
        let mut fx = Fixture::new(roomy());
        fx.instances
            .add(DepthInstance::new(
                101,
                Box::new(TransformT::default()),
                ArrayObjectHandle(9999),
            ))
            .unwrap();
        let mut renderer = fx.renderer();
        let light = fx.light(16);
        let mut execution = renderer.shadow_begin().unwrap();
        assert!(matches!(
            fx.render(&mut execution, &light),
            Err(RenderError::UnknownObject(_))
        ));
        assert_eq!(fx.device.framebuffer_draw_bound(), None);
        assert_eq!(fx.pool.borrow().count_in_use(), 0);
    }
}
