//! Render target descriptions and targets.

use std::fmt::Debug;
use std::hash::Hash;

use crate::{FramebufferHandle, RenderDevice, RenderResult, TextureUnitContext};

/// A width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AreaSize {
    pub width: u32,
    pub height: u32,
}

impl AreaSize {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A square area.
    #[must_use]
    pub const fn square(size: u32) -> Self {
        Self::new(size, size)
    }

    /// Number of pixels.
    #[must_use]
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// A value describing a render target, used as a pool lookup key.
pub trait RenderTargetDescription: Clone + Eq + Hash + Debug {
    /// The size of the target's attachments.
    fn area(&self) -> AreaSize;

    /// Bytes of storage a target with this description occupies: the area
    /// times the bytes per pixel of every attachment.
    fn byte_size(&self) -> u64;
}

/// A framebuffer with attachments, allocated from a description.
pub trait RenderTarget: Debug + Sized {
    type Description: RenderTargetDescription;

    /// Allocates a new target on `device`.
    fn create(
        device: &mut dyn RenderDevice,
        texture_units: &mut TextureUnitContext<'_>,
        description: &Self::Description,
    ) -> RenderResult<Self>;

    /// The description the target was created from.
    fn description(&self) -> &Self::Description;

    /// The framebuffer that draws into the target.
    fn primary_framebuffer(&self) -> FramebufferHandle;

    /// Clears the target's attachments to their initial values. The primary
    /// framebuffer must be bound for drawing.
    fn clear_bound_primary_framebuffer(&self, device: &mut dyn RenderDevice) -> RenderResult<()>;

    /// Deletes the target's framebuffer and textures. Deleting twice has no
    /// effect.
    fn delete(&self, device: &mut dyn RenderDevice) -> RenderResult<()>;

    /// Returns `true` once [`RenderTarget::delete`] has run.
    fn is_deleted(&self) -> bool;

    /// The size of the target's attachments.
    fn size(&self) -> AreaSize {
        self.description().area()
    }

    /// Bytes of storage the target occupies.
    fn byte_size(&self) -> u64 {
        self.description().byte_size()
    }
}
