//! Mock image provider.

use super::Latency;
use crate::config::MockConfig;
use crate::error::ProviderError;
use crate::provider::ImageProvider;
use crate::types::ImageReference;

/// Image backend that derives `image_<id>` from the product ID.
#[derive(Debug, Clone)]
pub struct MockImageProvider {
    latency: Latency,
}

impl MockImageProvider {
    /// Create a provider answering after `latency`.
    pub fn new(latency: Latency) -> Self {
        Self { latency }
    }

    /// Create a provider from the shared mock configuration.
    pub fn from_config(config: &MockConfig) -> Self {
        Self::new(Latency::from_config(config))
    }
}

impl ImageProvider for MockImageProvider {
    async fn fetch_image(&self, product_id: u32) -> Result<ImageReference, ProviderError> {
        tracing::trace!(product_id, "mock image fetch");
        self.latency.wait().await;
        Ok(ImageReference::for_product(product_id))
    }
}
