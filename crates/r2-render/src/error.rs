//! Rendering error types.

use r2_core::R2Error;
use thiserror::Error;

/// Errors that can occur during rendering operations.
#[derive(Error, Debug)]
pub enum RenderError {
    /// An error raised by the core crate, such as a scope nesting violation.
    #[error(transparent)]
    Core(#[from] R2Error),

    /// Allocating a render target would take the pool past its hard limit.
    #[error(
        "pool hard limit exceeded: requested {requested} bytes with {current} allocated, \
         hard limit {hard}"
    )]
    PoolHardLimitExceeded { requested: u64, current: u64, hard: u64 },

    /// A render target was returned to a pool that does not have it checked out.
    #[error("invalid pool return: {0}")]
    PoolObjectReturn(String),

    /// The pool has been deleted.
    #[error("pool has been deleted")]
    PoolDeleted,

    /// A shadow map execution is already open on this renderer.
    #[error("shadow map execution already active")]
    ShadowExecutionAlreadyActive,

    /// The execution's shadow map context is already open.
    #[error("shadow map context already active")]
    ShadowMapContextAlreadyActive,

    /// The execution has already been finished.
    #[error("shadow map execution not active")]
    ShadowExecutionNotActive,

    /// No shadow map was rendered for the light in this execution.
    #[error("no shadow map rendered for light {light} (shadow {shadow})")]
    ShadowNotRendered { light: u64, shadow: u64 },

    /// The shadow map renderer has been deleted.
    #[error("shadow map renderer has been deleted")]
    ShadowRendererDeleted,

    /// Not enough texture units remain.
    #[error("out of texture units: required {required}, available {available}")]
    TextureUnitExhausted { required: u32, available: u32 },

    /// The texture unit context stack is full.
    #[error("texture unit context limit reached at depth {0}")]
    TextureUnitContextLimitReached(usize),

    /// A target's framebuffer must be bound for drawing first.
    #[error("framebuffer not bound for drawing")]
    FramebufferNotBound,

    /// An instance was added to a depth instance set twice.
    #[error("instance {0} already visible")]
    InstanceAlreadyVisible(u64),

    /// A handle does not name a live device object.
    #[error("unknown device object: {0}")]
    UnknownObject(String),

    /// Failed to create wgpu adapter.
    #[error("failed to create graphics adapter")]
    AdapterCreationFailed,

    /// Failed to create wgpu device.
    #[error("failed to create graphics device: {0}")]
    DeviceCreationFailed(#[from] wgpu::RequestDeviceError),
}

impl RenderError {
    /// Returns `true` for errors a caller may recover from by lowering
    /// quality settings or raising limits.
    #[must_use]
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(
            self,
            Self::PoolHardLimitExceeded { .. } | Self::TextureUnitExhausted { .. }
        )
    }
}

/// A specialized Result type for rendering operations.
pub type RenderResult<T> = std::result::Result<T, RenderError>;
