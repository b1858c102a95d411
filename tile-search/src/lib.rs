//! # tile-search
//!
//! Data model and downstream contracts for the tile fan-out pipeline.
//!
//! A search for a query yields [`Tile`]s; each tile is enriched with seller
//! [`Reviews`] and a product [`ImageReference`] into an [`EnrichedTile`].
//! The three backends involved are reached only through the
//! [`SearchProvider`], [`ReviewsProvider`] and [`ImageProvider`] traits.
//!
//! ## Mocks
//!
//! [`mock`] holds providers that answer after a simulated latency, which is
//! enough to exercise every concurrency property of the pipeline without
//! network I/O.

pub mod config;
pub mod error;
pub mod mock;
pub mod provider;
pub mod types;

pub use config::MockConfig;
pub use error::{ProviderError, Result};
pub use mock::{Latency, MockImageProvider, MockReviewsProvider, MockSearchProvider};
pub use provider::{ImageProvider, ReviewsProvider, SearchProvider, TileStream};
pub use types::{EnrichedTile, ImageReference, Reviews, Tile};

/// Build the three mock providers from one configuration.
///
/// # Errors
///
/// Returns [`ProviderError::Config`] if `config` fails validation.
///
/// # Examples
///
/// ```
/// let (search, reviews, images) = tile_search::mock_providers(&tile_search::MockConfig::default())?;
/// # let _ = (search, reviews, images);
/// # Ok::<(), tile_search::ProviderError>(())
/// ```
pub fn mock_providers(
    config: &MockConfig,
) -> Result<(MockSearchProvider, MockReviewsProvider, MockImageProvider)> {
    config.validate()?;
    Ok((
        MockSearchProvider::from_config(config),
        MockReviewsProvider::from_config(config),
        MockImageProvider::from_config(config),
    ))
}
