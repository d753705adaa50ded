//! Core abstractions for r2-rs.
//!
//! This crate provides the renderer-independent parts of r2:
//! - [`IdPool`] for process-wide identifiers
//! - Transforms, projections and [`ViewRays`]
//! - The [`Matrices`] observer / instance / light scope stack
//! - Configuration [`Options`]

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
// Projection parameters mirror the GL call signatures
#![allow(clippy::too_many_arguments)]
#![allow(clippy::similar_names)]

pub mod error;
pub mod id_pool;
pub mod light;
pub mod matrices;
pub mod options;
pub mod projection;
pub mod transform;
pub mod transform_context;
pub mod view_rays;

pub use error::{R2Error, Result};
pub use id_pool::{IdPool, ID_MAX};
pub use light::{ProjectiveLight, VolumeLight};
pub use matrices::{
    Matrices, MatricesInstance, MatricesObserver, MatricesProjectiveLight, MatricesVolumeLight,
};
pub use options::{Options, PoolLimits};
pub use projection::{
    frustum_matrix, Projection, ProjectionFov, ProjectionFrustum, ProjectionOrthographic,
};
pub use transform::{
    Transform, TransformIdentity, TransformMatrix, TransformOST, TransformOT, TransformSOT,
    TransformT, TransformView,
};
pub use transform_context::TransformContext;
pub use view_rays::ViewRays;

// Re-export glam types for convenience
pub use glam::{Mat3, Mat4, Quat, Vec3, Vec4};
