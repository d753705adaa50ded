//! Depth-variance buffers for variance shadow mapping.
//!
//! A buffer pairs a depth attachment with a two-channel float texture that
//! receives the first two moments of depth.

use std::cell::Cell;

use glam::Vec4;

use crate::{
    AreaSize, ClearSpecification, FramebufferDescription, FramebufferHandle, RenderDevice,
    RenderError, RenderResult, RenderTarget, RenderTargetDescription, Texture2DDescription,
    TextureFilterMagnification, TextureFilterMinification, TextureFormat, TextureHandle,
    TextureUnitContext,
};

/// Precision of the depth attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DepthPrecision {
    Depth16,
    #[default]
    Depth24,
    Depth32F,
}

impl DepthPrecision {
    #[must_use]
    pub fn texture_format(self) -> TextureFormat {
        match self {
            Self::Depth16 => TextureFormat::Depth16,
            Self::Depth24 => TextureFormat::Depth24,
            Self::Depth32F => TextureFormat::Depth32F,
        }
    }
}

/// Precision of the moments texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DepthVariancePrecision {
    #[default]
    Variance16,
    Variance32,
}

impl DepthVariancePrecision {
    #[must_use]
    pub fn texture_format(self) -> TextureFormat {
        match self {
            Self::Variance16 => TextureFormat::Rg16F,
            Self::Variance32 => TextureFormat::Rg32F,
        }
    }
}

/// Describes a [`DepthVarianceBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthVarianceBufferDescription {
    pub area: AreaSize,
    pub depth_precision: DepthPrecision,
    pub variance_precision: DepthVariancePrecision,
    pub minification_filter: TextureFilterMinification,
    pub magnification_filter: TextureFilterMagnification,
}

impl DepthVarianceBufferDescription {
    /// A description with default precisions and linear filtering.
    #[must_use]
    pub fn new(area: AreaSize) -> Self {
        Self {
            area,
            depth_precision: DepthPrecision::default(),
            variance_precision: DepthVariancePrecision::default(),
            minification_filter: TextureFilterMinification::Linear,
            magnification_filter: TextureFilterMagnification::Linear,
        }
    }

    fn depth_texture(&self) -> Texture2DDescription {
        Texture2DDescription::new(self.area, self.depth_precision.texture_format()).with_filters(
            TextureFilterMinification::Nearest,
            TextureFilterMagnification::Nearest,
        )
    }

    fn variance_texture(&self) -> Texture2DDescription {
        Texture2DDescription::new(self.area, self.variance_precision.texture_format())
            .with_filters(self.minification_filter, self.magnification_filter)
    }
}

impl RenderTargetDescription for DepthVarianceBufferDescription {
    fn area(&self) -> AreaSize {
        self.area
    }

    fn byte_size(&self) -> u64 {
        self.depth_texture().byte_size() + self.variance_texture().byte_size()
    }
}

/// A framebuffer holding a depth attachment and a depth-moments texture.
#[derive(Debug)]
pub struct DepthVarianceBuffer {
    description: DepthVarianceBufferDescription,
    framebuffer: FramebufferHandle,
    depth: TextureHandle,
    variance: TextureHandle,
    deleted: Cell<bool>,
}

impl DepthVarianceBuffer {
    /// The texture holding depth moments, sampled by shadowed light shaders.
    #[must_use]
    pub fn depth_variance_texture(&self) -> TextureHandle {
        self.variance
    }

    /// The depth attachment.
    #[must_use]
    pub fn depth_texture(&self) -> TextureHandle {
        self.depth
    }

    fn allocate(
        device: &mut dyn RenderDevice,
        texture_units: &mut TextureUnitContext<'_>,
        description: &DepthVarianceBufferDescription,
    ) -> RenderResult<Self> {
        let (_, depth) = texture_units.allocate_texture_2d(device, &description.depth_texture())?;
        let variance = texture_units.allocate_texture_2d(device, &description.variance_texture());
        let variance = match variance {
            Ok((_, variance)) => variance,
            Err(error) => {
                release(device, &[depth]);
                return Err(error);
            }
        };

        let framebuffer = device.framebuffer_allocate(&FramebufferDescription {
            color: vec![variance],
            depth: Some(depth),
        });
        match framebuffer {
            Ok(framebuffer) => Ok(Self {
                description: *description,
                framebuffer,
                depth,
                variance,
                deleted: Cell::new(false),
            }),
            Err(error) => {
                release(device, &[depth, variance]);
                Err(error)
            }
        }
    }
}

pub(crate) fn release(device: &mut dyn RenderDevice, textures: &[TextureHandle]) {
    for texture in textures {
        if let Err(error) = device.texture_delete(*texture) {
            log::warn!("failed to release texture {}: {error}", texture.0);
        }
    }
}

impl RenderTarget for DepthVarianceBuffer {
    type Description = DepthVarianceBufferDescription;

    fn create(
        device: &mut dyn RenderDevice,
        texture_units: &mut TextureUnitContext<'_>,
        description: &Self::Description,
    ) -> RenderResult<Self> {
        let mut child = texture_units.child_with_reserved(2)?;
        let created = Self::allocate(device, &mut child, description);
        let finished = child.finish(device);
        match (created, finished) {
            (Ok(buffer), Err(error)) => {
                if let Err(deleted) = buffer.delete(device) {
                    log::warn!("failed to release depth-variance buffer: {deleted}");
                }
                Err(error)
            }
            (created, finished) => finished.and(created),
        }
    }

    fn description(&self) -> &Self::Description {
        &self.description
    }

    fn primary_framebuffer(&self) -> FramebufferHandle {
        self.framebuffer
    }

    fn clear_bound_primary_framebuffer(&self, device: &mut dyn RenderDevice) -> RenderResult<()> {
        if device.framebuffer_draw_bound() != Some(self.framebuffer) {
            return Err(RenderError::FramebufferNotBound);
        }
        device.clear(&ClearSpecification {
            color: Some(Vec4::new(1.0, 1.0, 0.0, 0.0)),
            depth: Some(1.0),
            stencil: None,
        })
    }

    fn delete(&self, device: &mut dyn RenderDevice) -> RenderResult<()> {
        if self.deleted.replace(true) {
            return Ok(());
        }
        device.framebuffer_delete(self.framebuffer)?;
        device.texture_delete(self.depth)?;
        device.texture_delete(self.variance)
    }

    fn is_deleted(&self) -> bool {
        self.deleted.get()
    }
}
