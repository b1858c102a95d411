//! Batch dispatch: N queries in parallel behind a countdown barrier.
//!
//! A [`QueryDispatcher`] owns the dispatch pool and the shared pipeline
//! (which owns the downstream pool). [`QueryDispatcher::dispatch`] submits
//! one pipeline run per query, waits until every run has ended, shuts both
//! pools down and hands back one outcome per query.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tile_search::{ImageProvider, ReviewsProvider, SearchProvider};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::FanoutConfig;
use crate::error::{PipelineError, Result};
use crate::events::EventHub;
use crate::latch::CountdownLatch;
use crate::pipeline::{Pipeline, Providers, ResultSet};
use crate::pool::WorkerPool;

/// Lifecycle of a dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DispatchState {
    /// Created; no batch dispatched yet.
    Init,
    /// Queries submitted; `remaining` have not reported yet.
    Running { remaining: usize },
    /// Every query ended and both pools are shut down.
    Done,
}

/// Outcome of one query in a batch.
#[derive(Debug)]
pub struct QueryResult {
    /// Position of the query in the dispatched list.
    pub index: usize,
    pub query: String,
    pub outcome: Result<ResultSet>,
}

/// Everything a batch produced, in query order.
#[derive(Debug)]
pub struct BatchOutcome {
    pub batch_id: Uuid,
    /// Dispatch to release of the barrier.
    pub wall_ms: u64,
    pub results: Vec<QueryResult>,
}

impl BatchOutcome {
    /// Result sets of the queries that succeeded.
    pub fn result_sets(&self) -> impl Iterator<Item = &ResultSet> {
        self.results.iter().filter_map(|r| r.outcome.as_ref().ok())
    }

    /// Errors of the queries that failed, with their index.
    pub fn failures(&self) -> impl Iterator<Item = (usize, &PipelineError)> {
        self.results
            .iter()
            .filter_map(|r| r.outcome.as_ref().err().map(|e| (r.index, e)))
    }

    pub fn succeeded(&self) -> usize {
        self.result_sets().count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

/// Runs a batch of queries on a bounded dispatch pool.
#[derive(Debug)]
pub struct QueryDispatcher<S, R, I> {
    pipeline: Arc<Pipeline<S, R, I>>,
    dispatch: WorkerPool,
    state: watch::Sender<DispatchState>,
}

impl<S, R, I> QueryDispatcher<S, R, I>
where
    S: SearchProvider + 'static,
    R: ReviewsProvider + 'static,
    I: ImageProvider + 'static,
{
    /// Build both pools from `config` and wire them to `providers`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Pool`] if a pool cannot be created.
    pub fn from_config(
        config: &FanoutConfig,
        providers: Providers<S, R, I>,
        events: EventHub,
    ) -> Result<Self> {
        let pools = &config.pools;
        let downstream = WorkerPool::with_threads(
            "downstream",
            pools.downstream_concurrency,
            pools.downstream_threads,
        )?;
        let dispatch = WorkerPool::with_threads(
            "dispatch",
            pools.dispatch_concurrency,
            pools.dispatch_threads,
        )?;
        let pipeline = Pipeline::new(
            providers,
            Arc::new(downstream),
            config.timeouts.clone(),
            events,
        );
        Ok(Self::new(pipeline, dispatch))
    }

    /// Dispatch queries through `pipeline` on `dispatch`.
    pub fn new(pipeline: Pipeline<S, R, I>, dispatch: WorkerPool) -> Self {
        let (state, _) = watch::channel(DispatchState::Init);
        Self {
            pipeline: Arc::new(pipeline),
            dispatch,
            state,
        }
    }

    /// Subscribe to state transitions.
    pub fn state(&self) -> watch::Receiver<DispatchState> {
        self.state.subscribe()
    }

    pub fn dispatch_pool(&self) -> &WorkerPool {
        &self.dispatch
    }

    pub fn downstream_pool(&self) -> &Arc<WorkerPool> {
        self.pipeline.downstream()
    }

    /// Run every query and wait for all of them to end.
    ///
    /// Every query runs concurrently up to the dispatch pool's limit;
    /// beyond it queries queue. A failing query never affects the others.
    /// Both pools are shut down before this returns.
    ///
    /// # Errors
    ///
    /// Per-query failures are reported in [`BatchOutcome::results`]; this
    /// only fails if the batch cannot be dispatched at all.
    pub async fn dispatch<Q>(self, queries: impl IntoIterator<Item = Q>) -> Result<BatchOutcome>
    where
        Q: Into<String>,
    {
        let queries: Vec<String> = queries.into_iter().map(Into::into).collect();
        let total = queries.len();
        let batch_id = Uuid::new_v4();
        let started = Instant::now();
        if self.dispatch.is_shut_down() {
            return Err(PipelineError::Dispatch(format!(
                "batch {batch_id}: dispatch pool is shut down"
            )));
        }

        info!(
            %batch_id,
            queries = total,
            pool = self.dispatch.name(),
            limit = self.dispatch.limit(),
            "dispatching batch"
        );

        let latch = Arc::new(CountdownLatch::new(total));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tasks = Vec::with_capacity(total);
        for (index, query) in queries.iter().enumerate() {
            let done = latch.guard();
            let pipeline = Arc::clone(&self.pipeline);
            let tx = tx.clone();
            let query = query.clone();
            tasks.push(self.dispatch.spawn(async move {
                let _done = done;
                let outcome = pipeline.run_query(&query).await;
                let _ = tx.send(QueryResult {
                    index,
                    query,
                    outcome,
                });
            }));
        }
        drop(tx);
        self.state.send_replace(DispatchState::Running { remaining: total });

        let mut slots: Vec<Option<QueryResult>> = (0..total).map(|_| None).collect();
        let mut reported = 0;
        let released = latch.wait();
        tokio::pin!(released);
        loop {
            tokio::select! {
                biased;
                Some(result) = rx.recv() => {
                    let index = result.index;
                    slots[index] = Some(result);
                    reported += 1;
                    self.state.send_replace(DispatchState::Running {
                        remaining: total - reported,
                    });
                }
                () = &mut released => break,
            }
        }
        while let Ok(result) = rx.try_recv() {
            let index = result.index;
            slots[index] = Some(result);
        }

        // Queries that never reported panicked or never got to run.
        let mut results = Vec::with_capacity(total);
        for ((index, slot), (task, query)) in slots
            .into_iter()
            .enumerate()
            .zip(tasks.into_iter().zip(queries))
        {
            let result = match slot {
                Some(result) => result,
                None => {
                    let reason = match task.await {
                        Err(e) => e.to_string(),
                        Ok(()) => "no outcome reported".to_owned(),
                    };
                    warn!(%batch_id, index, %reason, "query ended without an outcome");
                    QueryResult {
                        index,
                        query,
                        outcome: Err(PipelineError::Dispatch(format!(
                            "query {index} ended abnormally: {reason}"
                        ))),
                    }
                }
            };
            results.push(result);
        }

        let wall_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.dispatch.shutdown().await;
        self.pipeline.downstream().shutdown().await;
        self.state.send_replace(DispatchState::Done);

        let outcome = BatchOutcome {
            batch_id,
            wall_ms,
            results,
        };
        info!(
            %batch_id,
            wall_ms,
            succeeded = outcome.succeeded(),
            failed = outcome.failed(),
            "batch complete"
        );
        Ok(outcome)
    }
}
