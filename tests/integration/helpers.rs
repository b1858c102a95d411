//! Shared providers and builders for integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::StreamExt;
use tile_fanout::{EventHub, Pipeline, PipelineEvent, Providers, TimeoutConfig, WorkerPool};
use tile_search::{
    ImageProvider, ImageReference, Latency, MockImageProvider, MockReviewsProvider,
    MockSearchProvider, ProviderError, Reviews, ReviewsProvider, SearchProvider, Tile, TileStream,
};
use tokio::sync::watch;

pub(crate) type MockProviders = Providers<MockSearchProvider, MockReviewsProvider, MockImageProvider>;

/// Mock providers with a fixed latency on every call.
pub(crate) fn mock_providers(tile_ids: Vec<u32>, latency_ms: u64) -> MockProviders {
    let latency = Latency::fixed(Duration::from_millis(latency_ms));
    Providers::new(
        MockSearchProvider::new(tile_ids, latency),
        MockReviewsProvider::new(latency),
        MockImageProvider::new(latency),
    )
}

/// A pipeline on a fresh downstream pool of `downstream_limit` slots.
pub(crate) fn pipeline<S, R, I>(
    providers: Providers<S, R, I>,
    downstream_limit: usize,
    timeouts: TimeoutConfig,
    events: EventHub,
) -> Pipeline<S, R, I>
where
    S: SearchProvider + 'static,
    R: ReviewsProvider + 'static,
    I: ImageProvider + 'static,
{
    let downstream = WorkerPool::new("downstream", downstream_limit).expect("downstream pool");
    Pipeline::new(providers, Arc::new(downstream), timeouts, events)
}

/// An event hub that records every event it sees.
pub(crate) fn recording_hub() -> (EventHub, Arc<Mutex<Vec<PipelineEvent>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = Arc::clone(&seen);
    let hub = EventHub::with_sink(Arc::new(move |event: &PipelineEvent| {
        sink_seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
    }));
    (hub, seen)
}

/// Search returning different tiles per query text.
pub(crate) struct QuerySearch {
    by_query: HashMap<String, Vec<u32>>,
    fallback: Vec<u32>,
    latency: Latency,
}

impl QuerySearch {
    pub(crate) fn new(fallback: Vec<u32>, latency_ms: u64) -> Self {
        Self {
            by_query: HashMap::new(),
            fallback,
            latency: Latency::fixed(Duration::from_millis(latency_ms)),
        }
    }

    pub(crate) fn with_query(mut self, query: &str, tile_ids: Vec<u32>) -> Self {
        self.by_query.insert(query.to_owned(), tile_ids);
        self
    }
}

impl SearchProvider for QuerySearch {
    fn search(&self, query: &str) -> TileStream {
        let ids = self
            .by_query
            .get(query)
            .unwrap_or(&self.fallback)
            .clone();
        let latency = self.latency;
        futures_util::stream::once(async move {
            latency.wait().await;
            futures_util::stream::iter(ids.into_iter().map(|id| Ok(Tile::new(id))))
        })
        .flatten()
        .boxed()
    }
}

/// Images that fail for one product and answer normally otherwise.
pub(crate) struct FailingImages {
    pub(crate) failing_product: u32,
    pub(crate) latency: Latency,
}

impl ImageProvider for FailingImages {
    async fn fetch_image(&self, product_id: u32) -> Result<ImageReference, ProviderError> {
        self.latency.wait().await;
        if product_id == self.failing_product {
            return Err(ProviderError::Image(format!("product {product_id} has no image")));
        }
        Ok(ImageReference::for_product(product_id))
    }
}

/// Images that never answer for one product.
pub(crate) struct HangingImages {
    pub(crate) hung_product: u32,
}

impl ImageProvider for HangingImages {
    async fn fetch_image(&self, product_id: u32) -> Result<ImageReference, ProviderError> {
        if product_id == self.hung_product {
            std::future::pending::<()>().await;
        }
        Ok(ImageReference::for_product(product_id))
    }
}

/// Images that hold one product back until the gate opens.
pub(crate) struct GatedImages {
    pub(crate) gated_product: u32,
    pub(crate) gate: watch::Receiver<bool>,
}

impl ImageProvider for GatedImages {
    async fn fetch_image(&self, product_id: u32) -> Result<ImageReference, ProviderError> {
        if product_id == self.gated_product {
            let mut gate = self.gate.clone();
            gate.wait_for(|open| *open)
                .await
                .map_err(|_| ProviderError::Image("gate closed".into()))?;
        }
        Ok(ImageReference::for_product(product_id))
    }
}

/// Latency per tile id, for reordering completions.
pub(crate) fn per_tile_latency(id: u32, slow_ids_odd: bool) -> Duration {
    let slow = (id % 2 == 1) == slow_ids_odd;
    Duration::from_millis(if slow { 60 } else { 5 })
}

/// Reviews that are slow for odd tiles.
pub(crate) struct SkewedReviews;

impl ReviewsProvider for SkewedReviews {
    async fn fetch_reviews(&self, seller_id: u32) -> Result<Reviews, ProviderError> {
        tokio::time::sleep(per_tile_latency(seller_id, true)).await;
        Ok(Reviews)
    }
}

/// Images that are slow for even tiles.
pub(crate) struct SkewedImages;

impl ImageProvider for SkewedImages {
    async fn fetch_image(&self, product_id: u32) -> Result<ImageReference, ProviderError> {
        tokio::time::sleep(per_tile_latency(product_id, false)).await;
        Ok(ImageReference::for_product(product_id))
    }
}

/// Tracks how many calls run at once across reviews and images.
#[derive(Clone, Default)]
pub(crate) struct ConcurrencyGauge {
    running: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    latency: Duration,
}

impl ConcurrencyGauge {
    pub(crate) fn new(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn observe(&self) {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        self.running.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ReviewsProvider for ConcurrencyGauge {
    async fn fetch_reviews(&self, _seller_id: u32) -> Result<Reviews, ProviderError> {
        self.observe().await;
        Ok(Reviews)
    }
}

impl ImageProvider for ConcurrencyGauge {
    async fn fetch_image(&self, product_id: u32) -> Result<ImageReference, ProviderError> {
        self.observe().await;
        Ok(ImageReference::for_product(product_id))
    }
}
