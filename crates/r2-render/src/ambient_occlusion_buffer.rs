//! Single-channel ambient occlusion buffers.

use std::cell::Cell;

use glam::Vec4;

use crate::depth_variance_buffer::release;
use crate::{
    AreaSize, ClearSpecification, FramebufferDescription, FramebufferHandle, RenderDevice,
    RenderError, RenderResult, RenderTarget, RenderTargetDescription, Texture2DDescription,
    TextureFormat, TextureHandle, TextureUnitContext,
};

/// Describes an [`AmbientOcclusionBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AmbientOcclusionBufferDescription {
    pub area: AreaSize,
}

impl AmbientOcclusionBufferDescription {
    #[must_use]
    pub fn new(area: AreaSize) -> Self {
        Self { area }
    }

    fn occlusion_texture(&self) -> Texture2DDescription {
        Texture2DDescription::new(self.area, TextureFormat::R8)
    }
}

impl RenderTargetDescription for AmbientOcclusionBufferDescription {
    fn area(&self) -> AreaSize {
        self.area
    }

    fn byte_size(&self) -> u64 {
        self.occlusion_texture().byte_size()
    }
}

/// A framebuffer with one `R8` occlusion texture.
#[derive(Debug)]
pub struct AmbientOcclusionBuffer {
    description: AmbientOcclusionBufferDescription,
    framebuffer: FramebufferHandle,
    occlusion: TextureHandle,
    deleted: Cell<bool>,
}

impl AmbientOcclusionBuffer {
    #[must_use]
    pub fn ambient_occlusion_texture(&self) -> TextureHandle {
        self.occlusion
    }
}

impl RenderTarget for AmbientOcclusionBuffer {
    type Description = AmbientOcclusionBufferDescription;

    fn create(
        device: &mut dyn RenderDevice,
        texture_units: &mut TextureUnitContext<'_>,
        description: &Self::Description,
    ) -> RenderResult<Self> {
        let mut child = texture_units.child_with_reserved(1)?;
        let allocated = child.allocate_texture_2d(device, &description.occlusion_texture());
        let finished = child.finish(device);
        let (_, occlusion) = allocated?;
        if let Err(error) = finished {
            release(device, &[occlusion]);
            return Err(error);
        }

        let framebuffer = device.framebuffer_allocate(&FramebufferDescription {
            color: vec![occlusion],
            depth: None,
        });
        match framebuffer {
            Ok(framebuffer) => Ok(Self {
                description: *description,
                framebuffer,
                occlusion,
                deleted: Cell::new(false),
            }),
            Err(error) => {
                release(device, &[occlusion]);
                Err(error)
            }
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
            color: Some(Vec4::ONE),
            ..ClearSpecification::default()
        })
    }

    fn delete(&self, device: &mut dyn RenderDevice) -> RenderResult<()> {
        if self.deleted.replace(true) {
            return Ok(());
        }
        device.framebuffer_delete(self.framebuffer)?;
        device.texture_delete(self.occlusion)
    }

    fn is_deleted(&self) -> bool {
        self.deleted.get()
    }
}
