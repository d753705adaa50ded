//! The graphics device boundary.
//!
//! Everything above this module talks to the GPU through [`RenderDevice`]:
//! texture units, 2D textures, framebuffers, array objects and depth draws.
//! Objects are named by small copyable handles issued by the device.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

use crate::{AreaSize, RenderResult};

/// A 2D texture owned by a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u64);

/// A framebuffer owned by a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FramebufferHandle(pub u64);

/// Vertex and index data owned by a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArrayObjectHandle(pub u64);

/// A texture unit index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureUnit(pub u32);

/// Texture storage formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    R8,
    Rg16F,
    Rg32F,
    Rgba8,
    Rgba16F,
    Depth16,
    Depth24,
    Depth32F,
}

impl TextureFormat {
    /// Bytes of storage per texel.
    #[must_use]
    pub fn bytes_per_pixel(self) -> u64 {
        match self {
            Self::R8 => 1,
            Self::Depth16 => 2,
            Self::Rg16F | Self::Rgba8 | Self::Depth24 | Self::Depth32F => 4,
            Self::Rg32F | Self::Rgba16F => 8,
        }
    }

    /// Returns `true` for depth formats.
    #[must_use]
    pub fn is_depth(self) -> bool {
        matches!(self, Self::Depth16 | Self::Depth24 | Self::Depth32F)
    }
}

/// Minification filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFilterMinification {
    Nearest,
    #[default]
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapLinear,
}

impl TextureFilterMinification {
    /// Returns `true` if sampling with this filter reads mipmap levels.
    #[must_use]
    pub fn uses_mipmaps(self) -> bool {
        !matches!(self, Self::Nearest | Self::Linear)
    }
}

/// Magnification filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFilterMagnification {
    Nearest,
    #[default]
    Linear,
}

/// Texture coordinate wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureWrap {
    #[default]
    ClampToEdge,
    Repeat,
    MirroredRepeat,
}

/// Parameters for allocating a 2D texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Texture2DDescription {
    pub size: AreaSize,
    pub format: TextureFormat,
    pub wrap_s: TextureWrap,
    pub wrap_t: TextureWrap,
    pub minification: TextureFilterMinification,
    pub magnification: TextureFilterMagnification,
}

impl Texture2DDescription {
    /// A clamped, linearly filtered texture.
    #[must_use]
    pub fn new(size: AreaSize, format: TextureFormat) -> Self {
        Self {
            size,
            format,
            wrap_s: TextureWrap::ClampToEdge,
            wrap_t: TextureWrap::ClampToEdge,
            minification: TextureFilterMinification::Linear,
            magnification: TextureFilterMagnification::Linear,
        }
    }

    #[must_use]
    pub fn with_filters(
        mut self,
        minification: TextureFilterMinification,
        magnification: TextureFilterMagnification,
    ) -> Self {
        self.minification = minification;
        self.magnification = magnification;
        self
    }

    /// Storage required for the base level.
    #[must_use]
    pub fn byte_size(&self) -> u64 {
        self.size.area() * self.format.bytes_per_pixel()
    }
}

/// The attachments of a framebuffer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FramebufferDescription {
    /// Color attachments, in draw buffer order.
    pub color: Vec<TextureHandle>,
    /// Optional depth attachment.
    pub depth: Option<TextureHandle>,
}

/// Which buffers of the bound framebuffer to clear, and to what.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClearSpecification {
    pub color: Option<Vec4>,
    pub depth: Option<f32>,
    pub stencil: Option<u32>,
}

/// Face culling mode for draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FaceCulling {
    Disabled,
    #[default]
    Back,
    Front,
}

/// Per-instance uniforms for depth-variance draws.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct DepthInstanceUniforms {
    pub model_view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
}

impl DepthInstanceUniforms {
    #[must_use]
    pub fn new(model_view: Mat4, projection: Mat4) -> Self {
        Self {
            model_view: model_view.to_cols_array_2d(),
            projection: projection.to_cols_array_2d(),
        }
    }
}

/// A graphics device.
///
/// Calls are synchronous from the caller's point of view and must be made
/// from the thread that owns the device.
pub trait RenderDevice {
    /// Number of texture units available.
    fn texture_unit_count(&self) -> u32;

    /// Allocates a 2D texture and binds it to `unit`.
    fn texture_2d_allocate(
        &mut self,
        unit: TextureUnit,
        description: &Texture2DDescription,
    ) -> RenderResult<TextureHandle>;

    /// Binds a texture to `unit`.
    fn texture_2d_bind(&mut self, unit: TextureUnit, texture: TextureHandle) -> RenderResult<()>;

    /// Clears whatever is bound to `unit`.
    fn texture_unit_unbind(&mut self, unit: TextureUnit);

    /// Returns `true` if `texture` names a live texture.
    fn texture_is_live(&self, texture: TextureHandle) -> bool;

    /// Regenerates the mipmap chain of the texture bound to `unit`.
    fn texture_2d_regenerate_mipmaps(&mut self, unit: TextureUnit) -> RenderResult<()>;

    /// Deletes a texture.
    fn texture_delete(&mut self, texture: TextureHandle) -> RenderResult<()>;

    /// Creates a framebuffer from existing textures.
    fn framebuffer_allocate(
        &mut self,
        description: &FramebufferDescription,
    ) -> RenderResult<FramebufferHandle>;

    /// Deletes a framebuffer. Its attachments are not deleted.
    fn framebuffer_delete(&mut self, framebuffer: FramebufferHandle) -> RenderResult<()>;

    /// Binds a framebuffer as the draw target.
    fn framebuffer_draw_bind(&mut self, framebuffer: FramebufferHandle) -> RenderResult<()>;

    /// Restores the default draw target.
    fn framebuffer_draw_unbind(&mut self);

    /// The currently bound draw framebuffer, if any.
    fn framebuffer_draw_bound(&self) -> Option<FramebufferHandle>;

    /// Sets the viewport for subsequent draws.
    fn viewport_set(&mut self, area: AreaSize);

    /// Sets face culling for subsequent draws.
    fn face_culling_set(&mut self, culling: FaceCulling);

    /// Clears the bound draw framebuffer.
    fn clear(&mut self, clear: &ClearSpecification) -> RenderResult<()>;

    /// Uploads triangle geometry.
    fn array_object_allocate(
        &mut self,
        positions: &[[f32; 3]],
        indices: &[u32],
    ) -> RenderResult<ArrayObjectHandle>;

    /// Deletes geometry.
    fn array_object_delete(&mut self, array_object: ArrayObjectHandle) -> RenderResult<()>;

    /// Draws geometry into the bound framebuffer, writing depth and the
    /// first two moments of depth.
    fn draw_depth_variance(
        &mut self,
        array_object: ArrayObjectHandle,
        uniforms: &DepthInstanceUniforms,
    ) -> RenderResult<()>;
}
