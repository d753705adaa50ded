//! Configuration options for r2.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{R2Error, Result};

/// Global configuration options for r2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Limits for the depth-variance (shadow map) buffer pool.
    pub depth_variance_pool: PoolLimits,

    /// Limits for the ambient occlusion buffer pool.
    pub ambient_occlusion_pool: PoolLimits,

    /// Number of texture units the device exposes to the allocator.
    pub texture_units: u32,

    /// Maximum depth of nested texture unit contexts.
    pub texture_unit_stack_depth: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            depth_variance_pool: PoolLimits::new(64 * MIB, 256 * MIB),
            ambient_occlusion_pool: PoolLimits::new(16 * MIB, 64 * MIB),
            texture_units: 16,
            texture_unit_stack_depth: 8,
        }
    }
}

const MIB: u64 = 1024 * 1024;

/// Soft and hard byte limits for a render target pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolLimits {
    /// Idle targets are evicted while the pool holds more than this.
    pub soft: u64,
    /// Allocations that would take the pool past this fail.
    pub hard: u64,
}

impl PoolLimits {
    #[must_use]
    pub fn new(soft: u64, hard: u64) -> Self {
        Self { soft, hard }
    }
}

impl Options {
    /// Parses options from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Reads options from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Serializes options to pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks that the options are consistent.
    pub fn validate(&self) -> Result<()> {
        for (name, limits) in [
            ("depth_variance_pool", self.depth_variance_pool),
            ("ambient_occlusion_pool", self.ambient_occlusion_pool),
        ] {
            if limits.soft > limits.hard {
                return Err(R2Error::InvalidOptions(format!(
                    "{name}: soft limit {} exceeds hard limit {}",
                    limits.soft, limits.hard
                )));
            }
        }
        if self.texture_units == 0 {
            return Err(R2Error::InvalidOptions("texture_units must be positive".into()));
        }
        if self.texture_unit_stack_depth < 2 {
            return Err(R2Error::InvalidOptions(
                "texture_unit_stack_depth must be at least 2".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        Options::default().validate().unwrap();
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let options =
            Options::from_json_str(r#"{ "depth_variance_pool": { "soft": 100, "hard": 1000 } }"#)
                .unwrap();
        assert_eq!(options.depth_variance_pool, PoolLimits::new(100, 1000));
        assert_eq!(options.texture_units, Options::default().texture_units);
    }

    #[test]
    fn test_json_round_trip() {
        let options = Options {
            texture_units: 32,
            ..Options::default()
        };
        let json = options.to_json_string().unwrap();
        assert_eq!(Options::from_json_str(&json).unwrap(), options);
    }

    #[test]
    fn test_soft_above_hard_rejected() {
        let result =
            Options::from_json_str(r#"{ "ambient_occlusion_pool": { "soft": 10, "hard": 5 } }"#);
        assert!(matches!(result, Err(R2Error::InvalidOptions(_))));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            Options::from_json_str("{ not json"),
            Err(R2Error::JsonError(_))
        ));
    }
}
