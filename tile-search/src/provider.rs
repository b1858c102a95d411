//! Trait definitions for the three downstream collaborators.
//!
//! The pipeline only ever talks to search, reviews and image backends
//! through these traits, so mock and real implementations are
//! interchangeable.

use crate::error::ProviderError;
use crate::types::{ImageReference, Reviews, Tile};
use futures::stream::BoxStream;
use std::future::Future;

/// A lazy, finite, single-use sequence of search results.
pub type TileStream = BoxStream<'static, Result<Tile, ProviderError>>;

/// Produces the tiles matching a query.
///
/// The returned stream is consumed exactly once; it must end after the
/// last tile (or after yielding an error).
pub trait SearchProvider: Send + Sync {
    /// Start a search for `query`.
    ///
    /// Nothing is fetched until the stream is polled.
    fn search(&self, query: &str) -> TileStream;
}

/// Fetches seller reviews for a tile.
pub trait ReviewsProvider: Send + Sync {
    /// Resolve to exactly one [`Reviews`] value for `seller_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Reviews`] if the reviews cannot be fetched.
    fn fetch_reviews(
        &self,
        seller_id: u32,
    ) -> impl Future<Output = Result<Reviews, ProviderError>> + Send;
}

/// Fetches the product image for a tile.
pub trait ImageProvider: Send + Sync {
    /// Resolve to exactly one [`ImageReference`] for `product_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Image`] if the image cannot be fetched.
    fn fetch_image(
        &self,
        product_id: u32,
    ) -> impl Future<Output = Result<ImageReference, ProviderError>> + Send;
}
