//! Hierarchical allocation of texture units.
//!
//! The allocator keeps a stack of contexts. A child context starts with a
//! copy of its parent's bindings and allocates units above them; finishing
//! it pops the stack and rebinds the parent's textures on the device.
//! Contexts borrow their parent mutably, so only the innermost context can
//! be used at any time.

use crate::{
    RenderDevice, RenderError, RenderResult, Texture2DDescription, TextureHandle, TextureUnit,
};

#[derive(Debug, Clone)]
struct Frame {
    bindings: Vec<Option<TextureHandle>>,
    next: u32,
}

/// A stack of texture unit contexts.
#[derive(Debug)]
pub struct TextureUnitAllocator {
    units: u32,
    max_depth: usize,
    frames: Vec<Frame>,
}

impl TextureUnitAllocator {
    /// Creates an allocator for `units` texture units whose context stack,
    /// including the root context, holds at most `max_depth` contexts.
    #[must_use]
    pub fn new(units: u32, max_depth: usize) -> Self {
        let root = Frame {
            bindings: vec![None; units as usize],
            next: 0,
        };
        Self {
            units,
            max_depth: max_depth.max(1),
            frames: vec![root],
        }
    }

    /// Creates an allocator sized to the device's texture units.
    #[must_use]
    pub fn for_device(device: &dyn RenderDevice, max_depth: usize) -> Self {
        Self::new(device.texture_unit_count(), max_depth)
    }

    /// The root context.
    pub fn root_context(&mut self) -> TextureUnitContext<'_> {
        self.frames.truncate(1);
        TextureUnitContext {
            allocator: self,
            depth: 0,
            finished: false,
        }
    }

    /// Number of texture units managed.
    #[must_use]
    pub fn unit_count(&self) -> u32 {
        self.units
    }

    /// Number of contexts currently on the stack.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    fn current(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }
}

/// A context on the texture unit stack.
#[derive(Debug)]
pub struct TextureUnitContext<'a> {
    allocator: &'a mut TextureUnitAllocator,
    depth: usize,
    finished: bool,
}

impl TextureUnitContext<'_> {
    /// Pushes a child context.
    ///
    /// Fails with [`RenderError::TextureUnitContextLimitReached`] if the
    /// stack is full.
    pub fn child(&mut self) -> RenderResult<TextureUnitContext<'_>> {
        let allocator = &mut *self.allocator;
        let depth = allocator.frames.len();
        if depth >= allocator.max_depth {
            return Err(RenderError::TextureUnitContextLimitReached(depth));
        }

        log::trace!("new texture unit context at depth {depth}");
        let frame = allocator.current().clone();
        allocator.frames.push(frame);
        Ok(TextureUnitContext {
            allocator,
            depth,
            finished: false,
        })
    }

    /// Pushes a child context, first checking that `reserved` more units
    /// are available.
    pub fn child_with_reserved(&mut self, reserved: u32) -> RenderResult<TextureUnitContext<'_>> {
        self.check_units_required(reserved)?;
        self.child()
    }

    /// Number of units still free in this context.
    #[must_use]
    pub fn units_free(&self) -> u32 {
        self.allocator.units - self.frame().next
    }

    fn frame(&self) -> &Frame {
        &self.allocator.frames[self.depth]
    }

    fn check_units_required(&self, count: u32) -> RenderResult<()> {
        let required = self.frame().next.saturating_add(count);
        if required > self.allocator.units {
            return Err(RenderError::TextureUnitExhausted {
                required,
                available: self.allocator.units,
            });
        }
        Ok(())
    }

    fn claim(&mut self, texture: TextureHandle) -> TextureUnit {
        debug_assert_eq!(self.depth + 1, self.allocator.frames.len());
        let frame = self.allocator.current();
        let unit = TextureUnit(frame.next);
        frame.bindings[frame.next as usize] = Some(texture);
        frame.next += 1;
        unit
    }

    /// Binds `texture` to the next free unit.
    pub fn bind_texture_2d(
        &mut self,
        device: &mut dyn RenderDevice,
        texture: TextureHandle,
    ) -> RenderResult<TextureUnit> {
        self.check_units_required(1)?;
        let unit = TextureUnit(self.frame().next);
        device.texture_2d_bind(unit, texture)?;
        log::trace!("bind texture {} to unit {}", texture.0, unit.0);
        Ok(self.claim(texture))
    }

    /// Allocates a texture on the next free unit.
    pub fn allocate_texture_2d(
        &mut self,
        device: &mut dyn RenderDevice,
        description: &Texture2DDescription,
    ) -> RenderResult<(TextureUnit, TextureHandle)> {
        self.check_units_required(1)?;
        let unit = TextureUnit(self.frame().next);
        let texture = device.texture_2d_allocate(unit, description)?;
        log::trace!("allocate texture {} on unit {}", texture.0, unit.0);
        Ok((self.claim(texture), texture))
    }

    /// Pops this context and restores the parent's bindings on `device`.
    /// Finishing the root context has no effect.
    pub fn finish(mut self, device: &mut dyn RenderDevice) -> RenderResult<()> {
        self.finished = true;
        if self.depth == 0 {
            return Ok(());
        }

        self.allocator.frames.truncate(self.depth);
        log::trace!("finish texture unit context at depth {}", self.depth);

        let parent = self.allocator.current();
        for (index, binding) in parent.bindings.iter_mut().enumerate() {
            let unit = TextureUnit(u32::try_from(index).unwrap_or(u32::MAX));
            match *binding {
                Some(texture) if device.texture_is_live(texture) => {
                    device.texture_2d_bind(unit, texture)?;
                }
                Some(_) => {
                    device.texture_unit_unbind(unit);
                    *binding = None;
                }
                None => device.texture_unit_unbind(unit),
            }
        }
        Ok(())
    }
}

impl Drop for TextureUnitContext<'_> {
    fn drop(&mut self) {
        if !self.finished && self.depth > 0 {
            log::warn!(
                "texture unit context at depth {} dropped without finish",
                self.depth
            );
            self.allocator.frames.truncate(self.depth);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AreaSize, HeadlessDevice, TextureFormat};

    fn description() -> Texture2DDescription {
        Texture2DDescription::new(AreaSize::new(2, 2), TextureFormat::R8)
    }

    #[test]
    fn test_child_allocates_above_parent() {
        let mut device = HeadlessDevice::new(4);
        let mut allocator = TextureUnitAllocator::for_device(&device, 4);
        let mut root = allocator.root_context();

        let (u0, t0) = root.allocate_texture_2d(&mut device, &description()).unwrap();
        assert_eq!(u0, TextureUnit(0));

        let mut child = root.child().unwrap();
        let (u1, t1) = child.allocate_texture_2d(&mut device, &description()).unwrap();
        assert_eq!(u1, TextureUnit(1));
        assert_eq!(child.units_free(), 2);
        child.finish(&mut device).unwrap();

        assert_eq!(device.unit_binding(TextureUnit(0)), Some(t0));
        assert_eq!(device.unit_binding(TextureUnit(1)), None);
        assert!(device.texture_is_live(t1));

        let mut again = root.child().unwrap();
        let u = again.bind_texture_2d(&mut device, t1).unwrap();
        assert_eq!(u, TextureUnit(1));
        again.finish(&mut device).unwrap();
    }

    #[test]
    fn test_exhausted() {
        let mut device = HeadlessDevice::new(2);
        let mut allocator = TextureUnitAllocator::for_device(&device, 4);
        let mut root = allocator.root_context();
        root.allocate_texture_2d(&mut device, &description()).unwrap();
        root.allocate_texture_2d(&mut device, &description()).unwrap();
        let result = root.allocate_texture_2d(&mut device, &description());
        assert!(matches!(
            result,
            Err(RenderError::TextureUnitExhausted {
                required: 3,
                available: 2
            })
        ));
        assert_eq!(device.texture_count(), 2);
    }

    #[test]
    fn test_reserved_checks_before_push() {
        let mut device = HeadlessDevice::new(3);
        let mut allocator = TextureUnitAllocator::for_device(&device, 4);
        let mut root = allocator.root_context();
        root.allocate_texture_2d(&mut device, &description()).unwrap();
        assert!(root.child_with_reserved(2).is_ok());
        assert!(matches!(
            root.child_with_reserved(3),
            Err(RenderError::TextureUnitExhausted { .. })
        ));
    }

    #[test]
    fn test_stack_limit() {
        let device = HeadlessDevice::new(8);
        let mut allocator = TextureUnitAllocator::for_device(&device, 2);
        let mut root = allocator.root_context();
        let mut child = root.child().unwrap();
        assert!(matches!(
            child.child(),
            Err(RenderError::TextureUnitContextLimitReached(2))
        ));
    }

    #[test]
    fn test_drop_without_finish_pops() {
        let mut device = HeadlessDevice::new(4);
        let mut allocator = TextureUnitAllocator::for_device(&device, 3);
        {
            let mut root = allocator.root_context();
            let mut child = root.child().unwrap();
            child.allocate_texture_2d(&mut device, &description()).unwrap();
        }
        assert_eq!(allocator.depth(), 1);
        let mut root = allocator.root_context();
        let (unit, _) = root.allocate_texture_2d(&mut device, &description()).unwrap();
        assert_eq!(unit, TextureUnit(0));
    }

    #[test]
    fn test_finish_forgets_deleted_textures() {
        let mut device = HeadlessDevice::new(4);
        let mut allocator = TextureUnitAllocator::for_device(&device, 3);
        let mut root = allocator.root_context();
        let (_, t0) = root.allocate_texture_2d(&mut device, &description()).unwrap();
        device.texture_delete(t0).unwrap();
        let child = root.child().unwrap();
        child.finish(&mut device).unwrap();
        assert_eq!(device.unit_binding(TextureUnit(0)), None);
    }
}
