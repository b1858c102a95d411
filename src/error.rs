//! Error types for the tile fan-out pipeline.

use tile_search::ProviderError;

/// Top-level error type for query pipelines and the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A search, reviews or image provider reported a failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// A join or search stage did not resolve within its configured timeout.
    #[error("timeout: {0}")]
    Timeout(String),

    /// A worker pool rejected or lost a task (shut down, panicked, cancelled).
    #[error("pool error: {0}")]
    Pool(String),

    /// A dispatched query ended without reporting an outcome.
    #[error("dispatch error: {0}")]
    Dispatch(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, PipelineError>;
