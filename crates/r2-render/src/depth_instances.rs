//! The set of instances that cast shadows.

use glam::Mat3;
use r2_core::Transform;

use crate::{ArrayObjectHandle, FaceCulling, RenderError, RenderResult};

/// An instance drawn into depth-variance buffers.
#[derive(Debug)]
pub struct DepthInstance {
    pub instance_id: u64,
    pub transform: Box<dyn Transform>,
    pub uv: Mat3,
    pub array_object: ArrayObjectHandle,
}

impl DepthInstance {
    #[must_use]
    pub fn new(
        instance_id: u64,
        transform: Box<dyn Transform>,
        array_object: ArrayObjectHandle,
    ) -> Self {
        Self {
            instance_id,
            transform,
            uv: Mat3::IDENTITY,
            array_object,
        }
    }
}

/// An ordered set of depth instances, keyed by instance id.
#[derive(Debug, Default)]
pub struct DepthInstances {
    instances: Vec<DepthInstance>,
    face_culling: FaceCulling,
}

impl DepthInstances {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an instance.
    ///
    /// Fails with [`RenderError::InstanceAlreadyVisible`] if an instance with
    /// the same id is already in the set.
    pub fn add(&mut self, instance: DepthInstance) -> RenderResult<()> {
        if self
            .instances
            .iter()
            .any(|existing| existing.instance_id == instance.instance_id)
        {
            return Err(RenderError::InstanceAlreadyVisible(instance.instance_id));
        }
        self.instances.push(instance);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.instances.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Instances in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &DepthInstance> {
        self.instances.iter()
    }

    #[must_use]
    pub fn face_culling(&self) -> FaceCulling {
        self.face_culling
    }

    pub fn set_face_culling(&mut self, culling: FaceCulling) {
        self.face_culling = culling;
    }
}
