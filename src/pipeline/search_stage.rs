//! Search stage: drives a provider's tile stream on the downstream pool.
//!
//! The stream is polled by a forwarding task holding one downstream slot,
//! so the search call competes for workers like every other provider call.
//! Tiles are handed to the collector through an unbounded channel as soon
//! as they are produced.

use std::sync::Arc;

use futures_util::StreamExt;
use tile_search::{ProviderError, SearchProvider, Tile};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

use crate::events::{EventHub, EventKind};
use crate::pool::{PoolTask, WorkerPool};

/// Live view of one search.
pub(crate) struct SearchSubscription {
    /// Tiles in arrival order. Ends after the last tile or the first error.
    pub tiles: UnboundedReceiverStream<Result<Tile, ProviderError>>,
    /// The forwarding task. Resolves to a pool error if it never ran.
    pub forwarder: PoolTask<()>,
}

/// Subscribe to `provider`'s results for `query`.
pub(crate) fn subscribe<S>(
    provider: &Arc<S>,
    query_id: Uuid,
    query: &str,
    pool: &WorkerPool,
    events: &EventHub,
) -> SearchSubscription
where
    S: SearchProvider + 'static,
{
    events.emit(
        query_id,
        EventKind::SearchStarted {
            query: query.to_owned(),
        },
    );

    let (tx, rx) = mpsc::unbounded_channel();
    let provider = Arc::clone(provider);
    let query = query.to_owned();
    let events = events.clone();
    let forwarder = pool.spawn(async move {
        let mut stream = provider.search(&query);
        let mut tiles = 0usize;
        while let Some(item) = stream.next().await {
            let failed = item.is_err();
            if !failed {
                tiles += 1;
            }
            if tx.send(item).is_err() || failed {
                return;
            }
        }
        events.emit(query_id, EventKind::SearchCompleted { query, tiles });
    });

    SearchSubscription {
        tiles: UnboundedReceiverStream::new(rx),
        forwarder,
    }
}
