//! A device that keeps all objects in memory.
//!
//! [`HeadlessDevice`] performs no rendering. It tracks every object it
//! issues and records binds, clears and draws, which makes it suitable for
//! running the render core without a GPU and for inspecting what the core
//! asked the device to do.

use std::collections::HashMap;

use crate::{
    AreaSize, ArrayObjectHandle, ClearSpecification, DepthInstanceUniforms, FaceCulling,
    FramebufferDescription, FramebufferHandle, RenderDevice, RenderError, RenderResult,
    Texture2DDescription, TextureHandle, TextureUnit,
};

/// A recorded clear.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordedClear {
    pub framebuffer: Option<FramebufferHandle>,
    pub clear: ClearSpecification,
}

/// A recorded draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordedDraw {
    pub framebuffer: Option<FramebufferHandle>,
    pub array_object: ArrayObjectHandle,
    pub viewport: Option<AreaSize>,
    pub culling: FaceCulling,
    pub uniforms: DepthInstanceUniforms,
}

/// An in-memory [`RenderDevice`].
#[derive(Debug)]
pub struct HeadlessDevice {
    next_id: u64,
    units: Vec<Option<TextureHandle>>,
    textures: HashMap<TextureHandle, Texture2DDescription>,
    framebuffers: HashMap<FramebufferHandle, FramebufferDescription>,
    array_objects: HashMap<ArrayObjectHandle, usize>,
    bound: Option<FramebufferHandle>,
    viewport: Option<AreaSize>,
    culling: FaceCulling,
    clears: Vec<RecordedClear>,
    draws: Vec<RecordedDraw>,
    mipmap_regenerations: Vec<TextureHandle>,
    reject_binds: bool,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new(16)
    }
}

impl HeadlessDevice {
    /// Creates a device with `texture_units` texture units.
    #[must_use]
    pub fn new(texture_units: u32) -> Self {
        Self {
            next_id: 1,
            units: vec![None; texture_units as usize],
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            array_objects: HashMap::new(),
            bound: None,
            viewport: None,
            culling: FaceCulling::default(),
            clears: Vec::new(),
            draws: Vec::new(),
            mipmap_regenerations: Vec::new(),
            reject_binds: false,
        }
    }

    fn fresh(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn unit_slot(&mut self, unit: TextureUnit) -> RenderResult<&mut Option<TextureHandle>> {
        self.units
            .get_mut(unit.0 as usize)
            .ok_or_else(|| RenderError::UnknownObject(format!("texture unit {}", unit.0)))
    }

    /// Number of live textures.
    #[must_use]
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Number of live framebuffers.
    #[must_use]
    pub fn framebuffer_count(&self) -> usize {
        self.framebuffers.len()
    }

    /// The description a live texture was allocated with.
    #[must_use]
    pub fn texture_description(&self, texture: TextureHandle) -> Option<&Texture2DDescription> {
        self.textures.get(&texture)
    }

    /// The attachments of a live framebuffer.
    #[must_use]
    pub fn framebuffer_description(
        &self,
        framebuffer: FramebufferHandle,
    ) -> Option<&FramebufferDescription> {
        self.framebuffers.get(&framebuffer)
    }

    /// Returns `true` if `framebuffer` is live.
    #[must_use]
    pub fn framebuffer_is_live(&self, framebuffer: FramebufferHandle) -> bool {
        self.framebuffers.contains_key(&framebuffer)
    }

    /// The texture bound to `unit`, if any.
    #[must_use]
    pub fn unit_binding(&self, unit: TextureUnit) -> Option<TextureHandle> {
        self.units.get(unit.0 as usize).copied().flatten()
    }

    /// The current viewport.
    #[must_use]
    pub fn viewport(&self) -> Option<AreaSize> {
        self.viewport
    }

    /// All clears issued so far.
    #[must_use]
    pub fn clears(&self) -> &[RecordedClear] {
        &self.clears
    }

    /// All draws issued so far.
    #[must_use]
    pub fn draws(&self) -> &[RecordedDraw] {
        &self.draws
    }

    /// Textures whose mipmaps were regenerated, in order.
    #[must_use]
    pub fn mipmap_regenerations(&self) -> &[TextureHandle] {
        &self.mipmap_regenerations
    }

    /// Forgets recorded clears, draws and mipmap regenerations.
    /// Makes every later texture bind fail, as a device that has lost its
    /// context would.
    pub fn set_reject_texture_binds(&mut self, reject: bool) {
        self.reject_binds = reject;
    }

    pub fn reset_recording(&mut self) {
        self.clears.clear();
        self.draws.clear();
        self.mipmap_regenerations.clear();
    }
}

impl RenderDevice for HeadlessDevice {
    fn texture_unit_count(&self) -> u32 {
        u32::try_from(self.units.len()).unwrap_or(u32::MAX)
    }

    fn texture_2d_allocate(
        &mut self,
        unit: TextureUnit,
        description: &Texture2DDescription,
    ) -> RenderResult<TextureHandle> {
        self.unit_slot(unit)?;
        let texture = TextureHandle(self.fresh());
        self.textures.insert(texture, *description);
        *self.unit_slot(unit)? = Some(texture);
        Ok(texture)
    }

    fn texture_2d_bind(&mut self, unit: TextureUnit, texture: TextureHandle) -> RenderResult<()> {
        if self.reject_binds {
            return Err(RenderError::UnknownObject(format!("texture unit {}", unit.0)));
        }
        if !self.textures.contains_key(&texture) {
            return Err(RenderError::UnknownObject(format!("texture {}", texture.0)));
        }
        *self.unit_slot(unit)? = Some(texture);
        Ok(())
    }

    fn texture_unit_unbind(&mut self, unit: TextureUnit) {
        if let Some(slot) = self.units.get_mut(unit.0 as usize) {
            *slot = None;
        }
    }

    fn texture_is_live(&self, texture: TextureHandle) -> bool {
        self.textures.contains_key(&texture)
    }

    fn texture_2d_regenerate_mipmaps(&mut self, unit: TextureUnit) -> RenderResult<()> {
        let texture = self.unit_binding(unit).ok_or_else(|| {
            RenderError::UnknownObject(format!("nothing bound to unit {}", unit.0))
        })?;
        self.mipmap_regenerations.push(texture);
        Ok(())
    }

    fn texture_delete(&mut self, texture: TextureHandle) -> RenderResult<()> {
        if self.textures.remove(&texture).is_none() {
            return Err(RenderError::UnknownObject(format!("texture {}", texture.0)));
        }
        for slot in &mut self.units {
            if *slot == Some(texture) {
                *slot = None;
            }
        }
        Ok(())
    }

    fn framebuffer_allocate(
        &mut self,
        description: &FramebufferDescription,
    ) -> RenderResult<FramebufferHandle> {
        let attachments = description.color.iter().chain(description.depth.iter());
        for texture in attachments {
            if !self.textures.contains_key(texture) {
                return Err(RenderError::UnknownObject(format!("texture {}", texture.0)));
            }
        }
        let framebuffer = FramebufferHandle(self.fresh());
        self.framebuffers.insert(framebuffer, description.clone());
        Ok(framebuffer)
    }

    fn framebuffer_delete(&mut self, framebuffer: FramebufferHandle) -> RenderResult<()> {
        if self.framebuffers.remove(&framebuffer).is_none() {
            return Err(RenderError::UnknownObject(format!("framebuffer {}", framebuffer.0)));
        }
        if self.bound == Some(framebuffer) {
            self.bound = None;
        }
        Ok(())
    }

    fn framebuffer_draw_bind(&mut self, framebuffer: FramebufferHandle) -> RenderResult<()> {
        if !self.framebuffers.contains_key(&framebuffer) {
            return Err(RenderError::UnknownObject(format!("framebuffer {}", framebuffer.0)));
        }
        self.bound = Some(framebuffer);
        Ok(())
    }

    fn framebuffer_draw_unbind(&mut self) {
        self.bound = None;
    }

    fn framebuffer_draw_bound(&self) -> Option<FramebufferHandle> {
        self.bound
    }

    fn viewport_set(&mut self, area: AreaSize) {
        self.viewport = Some(area);
    }

    fn face_culling_set(&mut self, culling: FaceCulling) {
        self.culling = culling;
    }

    fn clear(&mut self, clear: &ClearSpecification) -> RenderResult<()> {
        self.clears.push(RecordedClear {
            framebuffer: self.bound,
            clear: *clear,
        });
        Ok(())
    }

    fn array_object_allocate(
        &mut self,
        positions: &[[f32; 3]],
        indices: &[u32],
    ) -> RenderResult<ArrayObjectHandle> {
        if let Some(bad) = indices.iter().find(|&&i| i as usize >= positions.len()) {
            return Err(RenderError::UnknownObject(format!("vertex index {bad}")));
        }
        let array_object = ArrayObjectHandle(self.fresh());
        self.array_objects.insert(array_object, indices.len());
        Ok(array_object)
    }

    fn array_object_delete(&mut self, array_object: ArrayObjectHandle) -> RenderResult<()> {
        self.array_objects
            .remove(&array_object)
            .map(|_| ())
            .ok_or_else(|| RenderError::UnknownObject(format!("array object {}", array_object.0)))
    }

    fn draw_depth_variance(
        &mut self,
        array_object: ArrayObjectHandle,
        uniforms: &DepthInstanceUniforms,
    ) -> RenderResult<()> {
        if !self.array_objects.contains_key(&array_object) {
            return Err(RenderError::UnknownObject(format!("array object {}", array_object.0)));
        }
        self.draws.push(RecordedDraw {
            framebuffer: self.bound,
            array_object,
            viewport: self.viewport,
            culling: self.culling,
            uniforms: *uniforms,
        });
        Ok(())
    }
}
