//! Mock provider implementations.
//!
//! Each provider waits a simulated latency before answering, which is
//! all a slow downstream service looks like from the pipeline's side.

pub mod image;
pub mod reviews;
pub mod search;

pub use image::MockImageProvider;
pub use reviews::MockReviewsProvider;
pub use search::MockSearchProvider;

use crate::config::MockConfig;
use rand::Rng;
use std::time::Duration;

/// Simulated latency of one downstream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Latency {
    base: Duration,
    jitter_ms: (u64, u64),
}

impl Latency {
    /// A fixed latency with no jitter.
    pub fn fixed(base: Duration) -> Self {
        Self {
            base,
            jitter_ms: (0, 0),
        }
    }

    /// Latency as described by a [`MockConfig`].
    pub fn from_config(config: &MockConfig) -> Self {
        Self {
            base: config.latency(),
            jitter_ms: config.jitter_ms,
        }
    }

    /// Pick the delay for a single call.
    pub fn sample(&self) -> Duration {
        let (min, max) = self.jitter_ms;
        if max == 0 || min > max {
            return self.base;
        }
        let jitter = rand::thread_rng().gen_range(min..=max);
        self.base + Duration::from_millis(jitter)
    }

    /// Sleep for one sampled delay.
    pub async fn wait(&self) {
        tokio::time::sleep(self.sample()).await;
    }
}
