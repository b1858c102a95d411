//! Latency report for a dispatched batch.

use crate::dispatcher::BatchOutcome;
use crate::error::{PipelineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Percentile summary of a set of millisecond samples.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub samples: usize,
    pub p50_ms: u64,
    pub p95_ms: u64,
    pub p99_ms: u64,
    pub max_ms: u64,
}

impl LatencySummary {
    /// Summarise `samples_ms`. An empty set summarises to all zeros.
    pub fn from_samples(mut samples_ms: Vec<u64>) -> Self {
        samples_ms.sort_unstable();
        Self {
            samples: samples_ms.len(),
            p50_ms: percentile(&samples_ms, 50),
            p95_ms: percentile(&samples_ms, 95),
            p99_ms: percentile(&samples_ms, 99),
            max_ms: samples_ms.last().copied().unwrap_or(0),
        }
    }
}

/// Summary of one batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Enriched tiles across every successful query.
    pub tiles: usize,
    pub wall_ms: u64,
    pub query_total: LatencySummary,
    pub search: LatencySummary,
    pub join: LatencySummary,
    /// `index: error` for each failed query.
    pub errors: Vec<String>,
}

impl BatchReport {
    pub fn from_outcome(outcome: &BatchOutcome) -> Self {
        let mut totals = Vec::new();
        let mut searches = Vec::new();
        let mut joins = Vec::new();
        let mut tiles = 0;
        for set in outcome.result_sets() {
            totals.push(set.timings.total_ms);
            searches.push(set.timings.search_ms);
            joins.extend_from_slice(&set.timings.join_ms);
            tiles += set.len();
        }
        let errors: Vec<String> = outcome
            .failures()
            .map(|(index, e)| format!("{index}: {e}"))
            .collect();

        Self {
            batch_id: outcome.batch_id,
            generated_at: Utc::now(),
            dispatched: outcome.results.len(),
            succeeded: totals.len(),
            failed: errors.len(),
            tiles,
            wall_ms: outcome.wall_ms,
            query_total: LatencySummary::from_samples(totals),
            search: LatencySummary::from_samples(searches),
            join: LatencySummary::from_samples(joins),
            errors,
        }
    }

    /// Pretty JSON rendering.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| PipelineError::Config(format!("failed to serialize batch report: {e}")))
    }
}

/// Write a report as pretty JSON, creating parent directories.
///
/// # Errors
///
/// Returns an error if the report cannot be serialized or written.
pub fn write_report(report: &BatchReport, output: &std::path::Path) -> Result<()> {
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output, report.to_json()?)?;
    Ok(())
}

fn percentile(sorted: &[u64], pct: usize) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let idx = (sorted.len().saturating_sub(1) * pct) / 100;
    sorted[idx]
}
