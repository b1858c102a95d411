//! Fan-in bookkeeping for one query.
//!
//! The collector counts tiles as they arrive from the search stage and
//! joins as they resolve. It is complete only once the search stream has
//! ended and every started join has resolved.

use tile_search::EnrichedTile;

use super::enrich::JoinedTile;

/// Accumulates enriched tiles in join-completion order.
#[derive(Debug, Default)]
pub struct Collector {
    started: usize,
    items: Vec<EnrichedTile>,
    join_ms: Vec<u64>,
    upstream_done: bool,
}

impl Collector {
    /// An empty collector waiting for the search stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// A tile arrived and its join was started.
    pub fn tile_arrived(&mut self) {
        self.started += 1;
    }

    /// A join resolved.
    pub fn join_resolved(&mut self, joined: JoinedTile) {
        self.items.push(joined.enriched);
        self.join_ms.push(joined.join_ms);
    }

    /// The search stream ended; no more tiles will arrive.
    pub fn upstream_finished(&mut self) {
        self.upstream_done = true;
    }

    /// Whether the search stream has ended.
    pub fn upstream_done(&self) -> bool {
        self.upstream_done
    }

    /// Joins started but not yet resolved.
    pub fn pending(&self) -> usize {
        self.started - self.items.len()
    }

    /// True once the stream ended and every started join resolved.
    pub fn is_complete(&self) -> bool {
        self.upstream_done && self.pending() == 0
    }

    /// Consume the collector, returning items and per-tile join latencies.
    pub fn finish(self) -> (Vec<EnrichedTile>, Vec<u64>) {
        (self.items, self.join_ms)
    }
}
