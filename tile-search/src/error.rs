//! Error types for the tile-search crate.
//!
//! Each provider has its own variant so a failure can be traced back to
//! the downstream call that produced it.

/// Errors that a search, reviews or image provider can report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The search provider failed to produce tiles.
    #[error("search provider error: {0}")]
    Search(String),

    /// The reviews provider failed for a seller.
    #[error("reviews provider error: {0}")]
    Reviews(String),

    /// The image provider failed for a product.
    #[error("image provider error: {0}")]
    Image(String),

    /// Invalid provider configuration.
    #[error("config error: {0}")]
    Config(String),
}

/// Convenience type alias for provider results.
pub type Result<T> = std::result::Result<T, ProviderError>;
