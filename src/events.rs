//! Pipeline events for observability.
//!
//! Every stage reports what it just finished together with the elapsed
//! time since the batch started and the worker it ran on. Events are
//! always logged through `tracing`; an optional [`EventSink`] receives
//! them too, decoupling observers (tests, reports, UIs) from the pipeline.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// The search stream was subscribed to.
    SearchStarted { query: String },
    /// The search stream ended after yielding `tiles` tiles.
    SearchCompleted { query: String, tiles: usize },
    /// Reviews for a tile resolved.
    ReviewsCompleted { tile_id: u32 },
    /// The image for a tile resolved.
    ImageCompleted { tile_id: u32 },
    /// Both sub-fetches for a tile resolved and were joined.
    JoinCompleted { tile_id: u32 },
    /// Every tile of the query was enriched and collected.
    CollectionCompleted { query: String, items: usize },
    /// The query failed; its collection will never complete.
    QueryFailed { query: String, error: String },
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SearchStarted { query } => write!(f, "search started for {query:?}"),
            Self::SearchCompleted { query, tiles } => {
                write!(f, "search completed for {query:?} with {tiles} tiles")
            }
            Self::ReviewsCompleted { tile_id } => write!(f, "reviews for tile {tile_id} completed"),
            Self::ImageCompleted { tile_id } => write!(f, "image for tile {tile_id} completed"),
            Self::JoinCompleted { tile_id } => write!(f, "join for tile {tile_id} completed"),
            Self::CollectionCompleted { query, items } => {
                write!(f, "all {items} tiles collected for {query:?}")
            }
            Self::QueryFailed { query, error } => write!(f, "query {query:?} failed: {error}"),
        }
    }
}

/// A timestamped event from one query run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineEvent {
    /// The query run this event belongs to.
    pub query_id: Uuid,
    /// What happened.
    pub kind: EventKind,
    /// Milliseconds since the owning [`EventHub`] was created.
    pub elapsed_ms: u64,
    /// Worker the event was emitted from, see [`current_worker`].
    pub worker: String,
}

/// Callback receiving every pipeline event.
///
/// Shared across pool threads, so it must be cheap and non-blocking.
pub type EventSink = Arc<dyn Fn(&PipelineEvent) + Send + Sync>;

/// Identify the worker thread the caller runs on: `<thread name>#<thread id>`.
pub fn current_worker() -> String {
    let thread = std::thread::current();
    let id = format!("{:?}", thread.id());
    let id = id
        .strip_prefix("ThreadId(")
        .and_then(|rest| rest.strip_suffix(')'))
        .unwrap_or(&id)
        .to_owned();
    format!("{}#{id}", thread.name().unwrap_or("unnamed"))
}

/// Clock and fan-out point for events of one batch.
#[derive(Clone)]
pub struct EventHub {
    started: Instant,
    sink: Option<EventSink>,
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHub")
            .field("started", &self.started)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHub {
    /// A hub that only logs.
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            sink: None,
        }
    }

    /// A hub that logs and forwards every event to `sink`.
    pub fn with_sink(sink: EventSink) -> Self {
        Self {
            started: Instant::now(),
            sink: Some(sink),
        }
    }

    /// Milliseconds since this hub was created.
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Record an event for `query_id`, stamped with the time and current worker.
    pub fn emit(&self, query_id: Uuid, kind: EventKind) {
        let event = PipelineEvent {
            query_id,
            elapsed_ms: self.elapsed_ms(),
            worker: current_worker(),
            kind,
        };
        log_event(&event);
        if let Some(sink) = &self.sink {
            sink(&event);
        }
    }
}

fn log_event(event: &PipelineEvent) {
    let PipelineEvent {
        query_id,
        kind,
        elapsed_ms,
        worker,
    } = event;
    match kind {
        EventKind::QueryFailed { .. } => {
            warn!(%query_id, elapsed_ms, worker = %worker, "{kind}");
        }
        EventKind::SearchStarted { .. } | EventKind::CollectionCompleted { .. } => {
            info!(%query_id, elapsed_ms, worker = %worker, "{kind}");
        }
        _ => debug!(%query_id, elapsed_ms, worker = %worker, "{kind}"),
    }
}
