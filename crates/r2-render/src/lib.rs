//! Rendering layer for r2-rs.
//!
//! This crate provides the GPU-facing parts of r2:
//! - The [`RenderDevice`] boundary, with an in-memory [`HeadlessDevice`]
//!   and a wgpu-backed [`WgpuDevice`]
//! - Texture unit allocation
//! - Render targets and the [`RenderTargetPool`] that recycles them
//! - Depth instances and the depth-variance renderer
//! - The [`ShadowMapRenderer`] execution state machine
//! - Hierarchical [`ProfilingContext`] timing

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
// Pixel sizes are far below f32 precision limits
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::module_name_repetitions)]

pub mod ambient_occlusion_buffer;
pub mod depth_instances;
pub mod depth_variance_buffer;
pub mod depth_variance_renderer;
pub mod device;
pub mod error;
pub mod headless;
pub mod lights;
pub mod profiling;
pub mod render_target;
pub mod render_target_pool;
pub mod shadow_map_renderer;
pub mod texture_units;
pub mod wgpu_device;

pub use ambient_occlusion_buffer::{AmbientOcclusionBuffer, AmbientOcclusionBufferDescription};
pub use depth_instances::{DepthInstance, DepthInstances};
pub use depth_variance_buffer::{
    DepthPrecision, DepthVarianceBuffer, DepthVarianceBufferDescription, DepthVariancePrecision,
};
pub use depth_variance_renderer::{BasicDepthVarianceRenderer, DepthVarianceRenderer};
pub use device::{
    ArrayObjectHandle, ClearSpecification, DepthInstanceUniforms, FaceCulling,
    FramebufferDescription, FramebufferHandle, RenderDevice, Texture2DDescription,
    TextureFilterMagnification, TextureFilterMinification, TextureFormat, TextureHandle,
    TextureUnit, TextureWrap,
};
pub use error::{RenderError, RenderResult};
pub use headless::{HeadlessDevice, RecordedClear, RecordedDraw};
pub use lights::{LightProjectiveWithShadowVariance, LightWithShadow, ShadowDepthVariance};
pub use profiling::ProfilingContext;
pub use render_target::{AreaSize, RenderTarget, RenderTargetDescription};
pub use render_target_pool::{
    AmbientOcclusionBufferPool, DepthVarianceBufferPool, RenderTargetPool,
    SharedDepthVarianceBufferPool,
};
pub use shadow_map_renderer::{ShadowMapContext, ShadowMapRenderer, ShadowMapRendererExecution};
pub use texture_units::{TextureUnitAllocator, TextureUnitContext};
pub use wgpu_device::WgpuDevice;
