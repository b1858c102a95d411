//! Mock search provider: a fixed tile list behind a simulated delay.

use super::Latency;
use crate::config::MockConfig;
use crate::provider::{SearchProvider, TileStream};
use crate::types::Tile;
use futures::StreamExt;

/// Search backend that answers every query with the same tiles.
///
/// The whole result list arrives at once after one latency period, the
/// way a single paged search response would.
#[derive(Debug, Clone)]
pub struct MockSearchProvider {
    tiles: Vec<Tile>,
    latency: Latency,
}

impl MockSearchProvider {
    /// Create a provider returning `tile_ids` after `latency`.
    pub fn new(tile_ids: impl IntoIterator<Item = u32>, latency: Latency) -> Self {
        Self {
            tiles: tile_ids.into_iter().map(Tile::new).collect(),
            latency,
        }
    }

    /// Create a provider from the shared mock configuration.
    pub fn from_config(config: &MockConfig) -> Self {
        Self::new(config.tile_ids.iter().copied(), Latency::from_config(config))
    }
}

impl SearchProvider for MockSearchProvider {
    fn search(&self, query: &str) -> TileStream {
        tracing::trace!(query, tiles = self.tiles.len(), "mock search");
        let tiles = self.tiles.clone();
        let latency = self.latency;
        futures::stream::once(async move {
            latency.wait().await;
            futures::stream::iter(tiles.into_iter().map(Ok))
        })
        .flatten()
        .boxed()
    }
}
