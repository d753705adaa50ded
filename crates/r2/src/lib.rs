//! r2-rs: the coordination core of a deferred renderer.
//!
//! r2 keeps three things straight for a frame:
//!
//! - the observer / instance / light matrix scopes ([`Matrices`]),
//! - the pooled render targets that hold intermediate results
//!   ([`RenderTargetPool`]),
//! - the per-frame shadow map pass ([`ShadowMapRenderer`]).
//!
//! # Quick Start
//!
//! ```
//! use r2::*;
//!
//! fn main() -> RenderResult<()> {
//!     init();
//!
//!     let mut device = HeadlessDevice::default();
//!     let mut renderer = Renderer::new(Options::default(), &device)?;
//!
//!     let shadow = ShadowDepthVariance::new(
//!         renderer.id_pool(),
//!         DepthVarianceBufferDescription::new(AreaSize::square(256)),
//!     )?;
//!     let light = LightProjectiveWithShadowVariance::new(
//!         renderer.id_pool(),
//!         Box::new(ProjectionFov::new(1.0, 1.0, 0.1, 50.0)),
//!         shadow,
//!     )?;
//!     let instances = DepthInstances::new();
//!
//!     let lights: [&dyn LightWithShadow; 1] = [&light];
//!     renderer.render_shadows(&mut device, &lights, &instances, |maps, _matrices, _device| {
//!         let map = maps.shadow_map_get(&light)?;
//!         assert_eq!(map.description().area, AreaSize::square(256));
//!         Ok(())
//!     })?;
//!
//!     renderer.delete(&mut device)
//! }
//! ```

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

use std::path::Path;
use std::rc::Rc;

// Re-export core types
pub use r2_core::{
    frustum_matrix, IdPool, Matrices, MatricesInstance, MatricesObserver, MatricesProjectiveLight,
    MatricesVolumeLight, Options, PoolLimits, Projection, ProjectionFov, ProjectionFrustum,
    ProjectionOrthographic, ProjectiveLight, R2Error, Transform, TransformContext,
    TransformIdentity, TransformMatrix, TransformOST, TransformOT, TransformSOT, TransformT,
    TransformView, ViewRays, VolumeLight, ID_MAX,
};

// Re-export render types
pub use r2_render::{
    AmbientOcclusionBuffer, AmbientOcclusionBufferDescription, AmbientOcclusionBufferPool,
    AreaSize, ArrayObjectHandle, BasicDepthVarianceRenderer, ClearSpecification, DepthInstance,
    DepthInstances, DepthPrecision, DepthVarianceBuffer, DepthVarianceBufferDescription,
    DepthVarianceBufferPool, DepthVariancePrecision, DepthVarianceRenderer, FaceCulling,
    FramebufferDescription, FramebufferHandle, HeadlessDevice, LightProjectiveWithShadowVariance,
    LightWithShadow, ProfilingContext, RenderDevice, RenderError, RenderResult, RenderTarget,
    RenderTargetDescription, RenderTargetPool, ShadowDepthVariance, ShadowMapContext,
    ShadowMapRenderer, ShadowMapRendererExecution, SharedDepthVarianceBufferPool,
    Texture2DDescription, TextureFilterMagnification, TextureFilterMinification, TextureFormat,
    TextureHandle, TextureUnit, TextureUnitAllocator, TextureUnitContext, WgpuDevice,
};

pub use glam::{Mat3, Mat4, Quat, Vec3, Vec4};

/// Initializes logging. Safe to call more than once.
pub fn init() {
    let _ = env_logger::try_init();
    log::info!("r2-rs initialized");
}

/// Reads [`Options`] from a JSON file.
pub fn load_options(path: impl AsRef<Path>) -> r2_core::Result<Options> {
    let path = path.as_ref();
    let options = Options::from_json_file(path)?;
    log::debug!("loaded options from {}", path.display());
    Ok(options)
}

/// The per-process components of a renderer.
#[derive(Debug)]
pub struct Renderer {
    options: Options,
    id_pool: IdPool,
    matrices: Matrices,
    texture_units: TextureUnitAllocator,
    depth_variance_pool: SharedDepthVarianceBufferPool,
    ambient_occlusion_pool: AmbientOcclusionBufferPool,
    shadow_renderer: ShadowMapRenderer,
    profiling: ProfilingContext,
}

impl Renderer {
    /// Creates the components for `device` from validated `options`.
    ///
    /// The texture unit allocator manages the smaller of the configured and
    /// the device's unit counts.
    pub fn new(options: Options, device: &dyn RenderDevice) -> RenderResult<Self> {
        options.validate()?;

        let units = options.texture_units.min(device.texture_unit_count());
        if units < options.texture_units {
            log::warn!(
                "device has {units} texture units, fewer than the {} configured",
                options.texture_units
            );
        }

        let depth_variance_pool = DepthVarianceBufferPool::new_shared(options.depth_variance_pool);
        let shadow_renderer = ShadowMapRenderer::new(
            Rc::clone(&depth_variance_pool),
            Box::new(BasicDepthVarianceRenderer::new()),
        );
        Ok(Self {
            id_pool: IdPool::new(),
            matrices: Matrices::new(),
            texture_units: TextureUnitAllocator::new(units, options.texture_unit_stack_depth),
            ambient_occlusion_pool: AmbientOcclusionBufferPool::new(options.ambient_occlusion_pool),
            depth_variance_pool,
            shadow_renderer,
            profiling: ProfilingContext::new_root("frame", false),
            options,
        })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn id_pool(&self) -> &IdPool {
        &self.id_pool
    }

    pub fn matrices(&self) -> &Matrices {
        &self.matrices
    }

    pub fn texture_units(&mut self) -> &mut TextureUnitAllocator {
        &mut self.texture_units
    }

    pub fn depth_variance_pool(&self) -> &SharedDepthVarianceBufferPool {
        &self.depth_variance_pool
    }

    pub fn ambient_occlusion_pool(&mut self) -> &mut AmbientOcclusionBufferPool {
        &mut self.ambient_occlusion_pool
    }

    pub fn shadow_renderer(&mut self) -> &mut ShadowMapRenderer {
        &mut self.shadow_renderer
    }

    pub fn profiling(&mut self) -> &mut ProfilingContext {
        &mut self.profiling
    }

    /// Renders the shadow maps of `lights`, then runs `body` with the
    /// finished maps.
    ///
    /// The shadow map context is finished whether or not rendering or
    /// `body` succeed, so every map is back in the pool when this returns.
    pub fn render_shadows<B, F>(
        &mut self,
        device: &mut dyn RenderDevice,
        lights: &[&dyn LightWithShadow],
        instances: &DepthInstances,
        body: F,
    ) -> RenderResult<B>
    where
        F: FnOnce(&ShadowMapContext<'_>, &Matrices, &mut dyn RenderDevice) -> RenderResult<B>,
    {
        let mut execution = self.shadow_renderer.shadow_begin()?;
        let shadows = self.profiling.child("shadows");
        shadows.start_measuring_if_enabled();
        let rendered = lights.iter().try_for_each(|light| {
            let mut root = self.texture_units.root_context();
            execution.shadow_exec_render_light(
                shadows,
                device,
                &mut root,
                &self.matrices,
                *light,
                instances,
            )
        });
        shadows.stop_measuring();

        let context = execution.shadow_exec_complete()?;
        let result = rendered.and_then(|()| body(&context, &self.matrices, device));
        let finished = context.shadow_map_context_finish();
        let value = result?;
        finished?;
        Ok(value)
    }

    /// Deletes the shadow renderer and both pools.
    ///
    /// Every component is deleted even if an earlier one fails; the first
    /// failure is returned.
    pub fn delete(&mut self, device: &mut dyn RenderDevice) -> RenderResult<()> {
        let results = [
            self.shadow_renderer.delete(),
            self.depth_variance_pool.borrow_mut().delete(device),
            self.ambient_occlusion_pool.delete(device),
        ];
        let mut first_error = None;
        for error in results.into_iter().filter_map(Result::err) {
            log::warn!("renderer delete: {error}");
            first_error.get_or_insert(error);
        }
        log::info!("r2-rs renderer deleted");
        first_error.map_or(Ok(()), Err)
    }
}
