//! One query's pipeline: search, per-tile enrichment, collection.
//!
//! ```text
//! search ──▶ tile ──▶ ┌ reviews ┐
//!                     │         ├─▶ join ──▶ collector ──▶ ResultSet
//!                     └ image   ┘
//! ```
//!
//! Every provider call runs on the downstream [`WorkerPool`]. The pipeline
//! itself (consuming the tile stream and fanning joins back in) runs
//! wherever [`Pipeline::run_query`] is awaited, normally a dispatch worker.

mod collect;
mod enrich;
mod search_stage;

pub use collect::Collector;
pub use enrich::JoinedTile;

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use serde::Serialize;
use tile_search::{EnrichedTile, ImageProvider, ReviewsProvider, SearchProvider};
use uuid::Uuid;

use crate::config::TimeoutConfig;
use crate::error::{PipelineError, Result};
use crate::events::{EventHub, EventKind};
use crate::pool::WorkerPool;

use enrich::JoinContext;
use search_stage::SearchSubscription;

/// The three downstream collaborators, shared by every query.
#[derive(Debug)]
pub struct Providers<S, R, I> {
    pub search: Arc<S>,
    pub reviews: Arc<R>,
    pub images: Arc<I>,
}

impl<S, R, I> Providers<S, R, I> {
    pub fn new(search: S, reviews: R, images: I) -> Self {
        Self {
            search: Arc::new(search),
            reviews: Arc::new(reviews),
            images: Arc::new(images),
        }
    }
}

impl<S, R, I> Clone for Providers<S, R, I> {
    fn clone(&self) -> Self {
        Self {
            search: Arc::clone(&self.search),
            reviews: Arc::clone(&self.reviews),
            images: Arc::clone(&self.images),
        }
    }
}

/// Where one query's time went, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryTimings {
    /// Subscription to end of the search stream.
    pub search_ms: u64,
    /// Tile arrival to join completion, one entry per tile in completion order.
    pub join_ms: Vec<u64>,
    /// Subscription to collection.
    pub total_ms: u64,
}

/// Every enriched tile of one query.
///
/// Items are in join-completion order, which need not match search order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultSet {
    pub query_id: Uuid,
    pub query: String,
    pub items: Vec<EnrichedTile>,
    pub timings: QueryTimings,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Tile ids, sorted, for order-insensitive comparison.
    pub fn tile_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.items.iter().map(|item| item.tile.id).collect();
        ids.sort_unstable();
        ids
    }
}

/// Runs queries against a set of providers on a downstream pool.
#[derive(Debug)]
pub struct Pipeline<S, R, I> {
    providers: Providers<S, R, I>,
    downstream: Arc<WorkerPool>,
    timeouts: TimeoutConfig,
    events: EventHub,
}

impl<S, R, I> Pipeline<S, R, I>
where
    S: SearchProvider + 'static,
    R: ReviewsProvider + 'static,
    I: ImageProvider + 'static,
{
    pub fn new(
        providers: Providers<S, R, I>,
        downstream: Arc<WorkerPool>,
        timeouts: TimeoutConfig,
        events: EventHub,
    ) -> Self {
        Self {
            providers,
            downstream,
            timeouts,
            events,
        }
    }

    /// The pool provider calls run on.
    pub fn downstream(&self) -> &Arc<WorkerPool> {
        &self.downstream
    }

    /// Run `query` to completion.
    ///
    /// Resolves once the search stream has ended and every tile it yielded
    /// has been enriched. With zero tiles that happens as soon as the
    /// stream ends.
    ///
    /// # Errors
    ///
    /// The first provider failure, timeout or pool error ends the query;
    /// joins still in flight are abandoned and a
    /// [`EventKind::QueryFailed`] event is emitted.
    pub async fn run_query(&self, query: &str) -> Result<ResultSet> {
        let query_id = Uuid::new_v4();
        let outcome = self.execute(query_id, query).await;
        if let Err(e) = &outcome {
            self.events.emit(
                query_id,
                EventKind::QueryFailed {
                    query: query.to_owned(),
                    error: e.to_string(),
                },
            );
        }
        outcome
    }

    async fn execute(&self, query_id: Uuid, query: &str) -> Result<ResultSet> {
        let started = Instant::now();
        let SearchSubscription { mut tiles, forwarder } = search_stage::subscribe(
            &self.providers.search,
            query_id,
            query,
            &self.downstream,
            &self.events,
        );
        let mut forwarder = Some(forwarder);

        let search_limit = self.timeouts.search_timeout();
        let search_timer = expire_after(search_limit);
        tokio::pin!(search_timer);

        let join_ctx = JoinContext {
            query_id,
            reviews: &self.providers.reviews,
            images: &self.providers.images,
            pool: &self.downstream,
            events: &self.events,
            timeout: self.timeouts.join_timeout(),
        };
        let mut joins = FuturesUnordered::new();
        let mut collector = Collector::new();
        let mut search_ms = 0;

        while !collector.is_complete() {
            tokio::select! {
                next = tiles.next(), if !collector.upstream_done() => match next {
                    Some(Ok(tile)) => {
                        collector.tile_arrived();
                        joins.push(enrich::start_join(tile, &join_ctx));
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        if let Some(task) = forwarder.take() {
                            task.await?;
                        }
                        search_ms = elapsed_ms(started);
                        collector.upstream_finished();
                    }
                },
                Some(joined) = joins.next(), if !joins.is_empty() => {
                    collector.join_resolved(joined?);
                }
                () = &mut search_timer, if !collector.upstream_done() => {
                    return Err(PipelineError::Timeout(format!(
                        "search for {query:?} exceeded {}ms",
                        search_limit.map_or(0, |limit| limit.as_millis())
                    )));
                }
            }
        }

        let (items, join_ms) = collector.finish();
        self.events.emit(
            query_id,
            EventKind::CollectionCompleted {
                query: query.to_owned(),
                items: items.len(),
            },
        );
        Ok(ResultSet {
            query_id,
            query: query.to_owned(),
            items,
            timings: QueryTimings {
                search_ms,
                join_ms,
                total_ms: elapsed_ms(started),
            },
        })
    }
}

/// Completes after `limit`, or never without one.
async fn expire_after(limit: Option<Duration>) {
    match limit {
        Some(limit) => tokio::time::sleep(limit).await,
        None => std::future::pending().await,
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}
