//! Mock provider configuration with sensible defaults.
//!
//! [`MockConfig`] controls the simulated latency of every mock provider
//! call and the tiles the mock search returns. The defaults reproduce a
//! slow downstream: one second per call, tiles `1`, `2` and `3`.

use crate::error::ProviderError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration shared by the mock search, reviews and image providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockConfig {
    /// Fixed simulated latency of each provider call, in milliseconds.
    pub latency_ms: u64,
    /// Extra random latency range `(min, max)` in milliseconds added to
    /// every call. `(0, 0)` keeps calls deterministic.
    pub jitter_ms: (u64, u64),
    /// Tile identifiers returned by the mock search, in emission order.
    pub tile_ids: Vec<u32>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            latency_ms: 1000,
            jitter_ms: (0, 0),
            tile_ids: vec![1, 2, 3],
        }
    }
}

impl MockConfig {
    /// Validates this configuration.
    ///
    /// `jitter_ms.0` must be <= `jitter_ms.1`. An empty `tile_ids` list is
    /// valid and models a query with no results.
    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.jitter_ms.0 > self.jitter_ms.1 {
            return Err(ProviderError::Config(
                "jitter_ms min must be <= max".into(),
            ));
        }
        Ok(())
    }

    /// The fixed part of the simulated latency.
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}
