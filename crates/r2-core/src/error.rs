//! Error types for r2-rs core.

use thiserror::Error;

/// The main error type for r2-rs core operations.
#[derive(Error, Debug)]
pub enum R2Error {
    /// An observer scope is already open on this matrix stack.
    #[error("observer already active")]
    ObserverAlreadyActive,

    /// An instance transform scope is already open within the current observer.
    #[error("instance already active")]
    InstanceAlreadyActive,

    /// A projective light scope is already open within the current observer.
    #[error("projective light already active")]
    ProjectiveAlreadyActive,

    /// A volume light scope is already open within the current observer.
    #[error("volume light already active")]
    VolumeLightAlreadyActive,

    /// The identifier counter cannot advance without leaving the signed 64-bit range.
    #[error("identifier pool exhausted")]
    IdPoolExhausted,

    /// Configuration values are inconsistent.
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl R2Error {
    /// Returns `true` for errors caused by opening a scope while an
    /// incompatible one is active.
    #[must_use]
    pub fn is_nesting_violation(&self) -> bool {
        matches!(
            self,
            Self::ObserverAlreadyActive
                | Self::InstanceAlreadyActive
                | Self::ProjectiveAlreadyActive
                | Self::VolumeLightAlreadyActive
        )
    }
}

/// A specialized Result type for r2-rs core operations.
pub type Result<T> = std::result::Result<T, R2Error>;
