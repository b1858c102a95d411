//! Tile fan-out: a search-and-enrich pipeline over slow downstream services.
//!
//! A query is searched; every tile it yields is enriched with seller
//! reviews and a product image, fetched in parallel and joined; once every
//! tile is joined the query's [`ResultSet`] is collected. A
//! [`QueryDispatcher`] runs a batch of queries concurrently and returns
//! when all of them have ended.
//!
//! # Architecture
//!
//! - **Downstream pool**: a bounded [`WorkerPool`] running every provider
//!   call (search, reviews, image).
//! - **Dispatch pool**: a second bounded pool running one query pipeline
//!   per slot.
//! - **Pipeline**: search stage, per-tile join, collector
//!   ([`pipeline`]).
//! - **Barrier**: a [`CountdownLatch`] released when every query of the
//!   batch has ended.
//!
//! Providers are reached through the [`tile_search`] traits, so the mock
//! providers used by the harness can be swapped for real backends.

pub mod config;
pub mod diagnostics;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod latch;
pub mod pipeline;
pub mod pool;
pub mod report;

pub use config::{BatchConfig, FanoutConfig, PoolsConfig, TimeoutConfig};
pub use dispatcher::{BatchOutcome, DispatchState, QueryDispatcher, QueryResult};
pub use error::{PipelineError, Result};
pub use events::{EventHub, EventKind, EventSink, PipelineEvent};
pub use latch::{CountdownLatch, LatchGuard};
pub use pipeline::{Pipeline, Providers, QueryTimings, ResultSet};
pub use pool::{PoolTask, WorkerPool};
pub use report::{BatchReport, LatencySummary, write_report};
