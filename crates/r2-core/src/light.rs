//! Light abstractions consumed by the matrix scope stack.

use crate::{Projection, Transform, TransformView};

/// A light whose illumination is defined by its own projection.
pub trait ProjectiveLight {
    /// The light's identifier.
    fn light_id(&self) -> u64;

    /// The light's origin and orientation.
    fn transform(&self) -> &dyn TransformView;

    /// The light's projection.
    fn projection(&self) -> &dyn Projection;
}

/// A light rendered as a bounding volume.
pub trait VolumeLight {
    /// The light's identifier.
    fn light_id(&self) -> u64;

    /// The transform placing the light's volume in the world.
    fn transform(&self) -> &dyn Transform;
}
