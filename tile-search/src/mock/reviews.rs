//! Mock reviews provider.

use super::Latency;
use crate::config::MockConfig;
use crate::error::ProviderError;
use crate::provider::ReviewsProvider;
use crate::types::Reviews;

/// Reviews backend that returns an empty [`Reviews`] payload after a delay.
#[derive(Debug, Clone)]
pub struct MockReviewsProvider {
    latency: Latency,
}

impl MockReviewsProvider {
    /// Create a provider answering after `latency`.
    pub fn new(latency: Latency) -> Self {
        Self { latency }
    }

    /// Create a provider from the shared mock configuration.
    pub fn from_config(config: &MockConfig) -> Self {
        Self::new(Latency::from_config(config))
    }
}

impl ReviewsProvider for MockReviewsProvider {
    async fn fetch_reviews(&self, seller_id: u32) -> Result<Reviews, ProviderError> {
        tracing::trace!(seller_id, "mock reviews fetch");
        self.latency.wait().await;
        Ok(Reviews)
    }
}
