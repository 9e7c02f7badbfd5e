// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

use crate::api::error::{Result, StrandError};
use serde::{Deserialize, Serialize};

/// Configuration shared by projection loading and algorithm execution.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlgorithmConfig {
    /// Maximum memory for a single projection (bytes)
    pub max_projection_memory: usize,
    /// Maximum vertices per projection
    pub max_vertices: usize,
    /// Worker threads used when a run does not set its own (default: available cores)
    pub default_concurrency: usize,
    /// Lower bound on nodes per work batch (default: 10_000)
    pub min_batch_size: usize,
}

impl Default for AlgorithmConfig {
    fn default() -> Self {
        Self {
            max_projection_memory: 1 << 30, // 1 GB
            max_vertices: 100_000_000,      // 100M
            default_concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            min_batch_size: 10_000,
        }
    }
}

impl AlgorithmConfig {
    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_concurrency == 0 {
            return Err(StrandError::invalid_argument(
                "default_concurrency",
                "must be at least 1",
            ));
        }
        if self.min_batch_size == 0 {
            return Err(StrandError::invalid_argument(
                "min_batch_size",
                "must be at least 1",
            ));
        }
        if self.max_vertices > u32::MAX as usize {
            return Err(StrandError::invalid_argument(
                "max_vertices",
                format!("cannot exceed {}", u32::MAX),
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
        AlgorithmConfig::default().validate().unwrap();
    }

    #[test]
    fn test_from_json_partial() {
        let config = AlgorithmConfig::from_json(r#"{"default_concurrency": 3}"#).unwrap();
        assert_eq!(config.default_concurrency, 3);
        assert_eq!(config.min_batch_size, 10_000);
    }

    #[test]
    fn test_from_json_rejects_zero_concurrency() {
        let err = AlgorithmConfig::from_json(r#"{"default_concurrency": 0}"#).unwrap_err();
        assert!(matches!(err, StrandError::InvalidArgument { .. }));
    }

    #[test]
    fn test_from_json_malformed() {
        let err = AlgorithmConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, StrandError::Config(_)));
    }
}
