//! Configuration types for the fan-out pipeline and its harness.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tile_search::MockConfig;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FanoutConfig {
    /// Where the harness writes its JSON latency report (None = stdout only).
    pub report_path: Option<PathBuf>,
    /// Worker pool sizing.
    pub pools: PoolsConfig,
    /// Harness query batch.
    pub batch: BatchConfig,
    /// Optional per-stage timeouts.
    pub timeouts: TimeoutConfig,
    /// Mock provider behaviour.
    pub mock: MockConfig,
}

/// Sizing of the downstream-call and dispatch pools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolsConfig {
    /// Maximum concurrent provider calls (search, reviews, image).
    pub downstream_concurrency: usize,
    /// Maximum concurrently running query pipelines.
    pub dispatch_concurrency: usize,
    /// Worker threads for a dedicated downstream runtime.
    ///
    /// `None` runs downstream calls on the ambient tokio runtime.
    pub downstream_threads: Option<usize>,
    /// Worker threads for a dedicated dispatch runtime.
    pub dispatch_threads: Option<usize>,
}

impl Default for PoolsConfig {
    fn default() -> Self {
        Self {
            downstream_concurrency: 100,
            dispatch_concurrency: 50,
            downstream_threads: None,
            dispatch_threads: None,
        }
    }
}

/// The batch of queries the harness dispatches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Number of queries dispatched together.
    pub size: usize,
    /// Query text used for every query in the batch.
    pub query: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            size: 50,
            query: "search term".to_owned(),
        }
    }
}

impl BatchConfig {
    /// The query list for one batch.
    pub fn queries(&self) -> Vec<String> {
        vec![self.query.clone(); self.size]
    }
}

/// Stage timeouts. Unset timeouts wait forever.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upper bound on one tile's reviews + image join, in milliseconds.
    pub join_timeout_ms: Option<u64>,
    /// Upper bound on the search stream from subscription to its end.
    pub search_timeout_ms: Option<u64>,
}

impl TimeoutConfig {
    /// Join timeout as a [`Duration`].
    pub fn join_timeout(&self) -> Option<Duration> {
        self.join_timeout_ms.map(Duration::from_millis)
    }

    /// Search timeout as a [`Duration`].
    pub fn search_timeout(&self) -> Option<Duration> {
        self.search_timeout_ms.map(Duration::from_millis)
    }
}

impl FanoutConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| PipelineError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| PipelineError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Per-user config location, `<config dir>/tile-fanout/config.toml`.
    ///
    /// The config dir is `$XDG_CONFIG_HOME`, then `$HOME/.config`, then the
    /// system temp dir.
    pub fn default_config_path() -> PathBuf {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
            .unwrap_or_else(std::env::temp_dir);
        base.join("tile-fanout").join("config.toml")
    }

    /// Resolve the harness configuration.
    ///
    /// An explicit path must load. Without one, the per-user file from
    /// [`FanoutConfig::default_config_path`] is used when it exists, and
    /// the built-in defaults otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the chosen file cannot be read or parsed.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::load_from(explicit, &Self::default_config_path())
    }

    fn load_from(explicit: Option<&Path>, fallback: &Path) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None if fallback.is_file() => {
                tracing::debug!(path = %fallback.display(), "using per-user config");
                Self::from_file(fallback)
            }
            None => Ok(Self::default()),
        }
    }

    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - both pool concurrency limits are greater than 0
    /// - dedicated thread counts, when set, are greater than 0
    /// - `batch.size` is greater than 0
    /// - timeouts, when set, are greater than 0
    /// - the mock provider settings are valid
    pub fn validate(&self) -> Result<()> {
        if self.pools.downstream_concurrency == 0 {
            return Err(PipelineError::Config(
                "downstream_concurrency must be greater than 0".into(),
            ));
        }
        if self.pools.dispatch_concurrency == 0 {
            return Err(PipelineError::Config(
                "dispatch_concurrency must be greater than 0".into(),
            ));
        }
        if self.pools.downstream_threads == Some(0) || self.pools.dispatch_threads == Some(0) {
            return Err(PipelineError::Config(
                "dedicated pool threads must be greater than 0".into(),
            ));
        }
        if self.batch.size == 0 {
            return Err(PipelineError::Config(
                "batch size must be greater than 0".into(),
            ));
        }
        if self.timeouts.join_timeout_ms == Some(0) || self.timeouts.search_timeout_ms == Some(0) {
            return Err(PipelineError::Config(
                "timeouts must be greater than 0 when set".into(),
            ));
        }
        self.mock.validate()?;
        Ok(())
    }
}
