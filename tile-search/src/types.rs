//! Core types for search tiles and their enrichment payloads.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single search result item.
///
/// In this model the identifier doubles as both the seller ID and the
/// product ID used to enrich the tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tile {
    /// Identifier of the result item.
    pub id: u32,
}

impl Tile {
    /// Create a tile with the given identifier.
    pub fn new(id: u32) -> Self {
        Self { id }
    }

    /// Seller whose reviews enrich this tile.
    pub fn seller_id(&self) -> u32 {
        self.id
    }

    /// Product whose image enriches this tile.
    pub fn product_id(&self) -> u32 {
        self.id
    }
}

/// Seller review data for one tile. Opaque placeholder payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reviews;

/// Identifier of a fetched product image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageReference(String);

impl ImageReference {
    /// Wrap an image identifier.
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// The deterministic reference used for `product_id`: `image_<id>`.
    pub fn for_product(product_id: u32) -> Self {
        Self(format!("image_{product_id}"))
    }

    /// Borrow the reference as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A tile joined with its reviews and image once both fetches complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedTile {
    /// The search result this record was built from.
    pub tile: Tile,
    /// Seller reviews for the tile.
    pub reviews: Reviews,
    /// Product image for the tile.
    pub image: ImageReference,
}

impl EnrichedTile {
    /// Join a tile with its two sub-fetch results.
    pub fn new(tile: Tile, reviews: Reviews, image: ImageReference) -> Self {
        Self {
            tile,
            reviews,
            image,
        }
    }
}
