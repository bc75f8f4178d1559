//! Session-bounded scan loop.
//!
//! Lifecycle: `Initializing → Running → Finished{Normal | NoTargets}`.
//! Each cycle shuffles the targets, collects prices token by token, runs
//! detection once on the full snapshot and publishes the result. Every
//! fetch and pause inside a cycle is bounded by the session deadline, so a
//! cool-down or retry chain cannot outlive the session; a cycle cut short
//! by the deadline is discarded without detection.

use chrono::Utc;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{error, info, warn};

use super::aggregator::PriceAggregator;
use super::detector::ArbitrageDetector;
use super::state::SharedState;
use crate::config::SessionSettings;
use crate::storage::OpportunityArchive;
use crate::types::{normalize_symbol, FinishReason, PriceSet};

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub session_duration: Duration,
    /// Target time between cycle starts.
    pub scan_interval: Duration,
    /// Pause after each token, inside a cycle.
    pub token_pause: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            session_duration: Duration::from_secs(15 * 60),
            scan_interval: Duration::from_secs(90),
            token_pause: Duration::from_millis(500),
        }
    }
}

impl From<&SessionSettings> for SchedulerConfig {
    fn from(s: &SessionSettings) -> Self {
        Self {
            session_duration: s.duration(),
            scan_interval: Duration::from_secs(s.scan_interval_secs),
            token_pause: Duration::from_millis(s.token_pause_ms),
        }
    }
}

/// Merge known and candidate symbols: trimmed, upper-cased, first
/// occurrence wins, empties dropped.
pub fn resolve_targets(known: &[String], candidates: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    known
        .iter()
        .chain(candidates)
        .map(|s| normalize_symbol(s))
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

pub struct ScanScheduler {
    aggregator: PriceAggregator,
    detector: ArbitrageDetector,
    state: Arc<SharedState>,
    archive: Option<Box<dyn OpportunityArchive>>,
    config: SchedulerConfig,
}

impl ScanScheduler {
    pub fn new(
        aggregator: PriceAggregator,
        detector: ArbitrageDetector,
        state: Arc<SharedState>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            aggregator,
            detector,
            state,
            archive: None,
            config,
        }
    }

    pub fn with_archive(mut self, archive: Box<dyn OpportunityArchive>) -> Self {
        self.archive = Some(archive);
        self
    }

    /// Run the session on a dedicated background task.
    pub fn spawn(self, known: Vec<String>, candidates: Vec<String>) -> JoinHandle<FinishReason> {
        tokio::spawn(async move { self.run(&known, &candidates).await })
    }

    /// Run one full session to completion.
    pub async fn run(&self, known: &[String], candidates: &[String]) -> FinishReason {
        let targets = resolve_targets(known, candidates);
        info!(count = targets.len(), tokens = ?targets, "Resolved target tokens (known + candidates)");

        if targets.is_empty() {
            error!("No target tokens defined (known or identified). Nothing to scan.");
            self.state.finish(FinishReason::NoTargets).await;
            return FinishReason::NoTargets;
        }

        let start = Utc::now();
        let end = start + chrono::Duration::milliseconds(self.config.session_duration.as_millis() as i64);
        let deadline = Instant::now() + self.config.session_duration;
        self.state.begin(start, end, targets.clone()).await;

        info!(
            start = %start.to_rfc3339(),
            end = %end.to_rfc3339(),
            providers = ?self.aggregator.provider_names(),
            "Scan session started"
        );

        let mut cycle = 0u64;
        while Instant::now() < deadline {
            cycle += 1;
            let cycle_start = Instant::now();

            let Some(prices) = self.collect_cycle(&targets, deadline).await else {
                info!(cycle, "Deadline passed mid-cycle, discarding partial results");
                self.state.record_discarded().await;
                break;
            };

            let opportunities = self.detector.detect(&prices);
            self.state.publish(&opportunities, Utc::now()).await;

            if !opportunities.is_empty() {
                if let Some(archive) = &self.archive {
                    if let Err(e) = archive.archive(&opportunities) {
                        error!(error = %e, "Failed to archive opportunities");
                    }
                }
            }

            let elapsed = cycle_start.elapsed();
            let wait = self.config.scan_interval.saturating_sub(elapsed);
            let remaining = deadline.saturating_duration_since(Instant::now());
            let actual_wait = wait.min(remaining);

            info!(
                cycle,
                tokens_priced = prices.len(),
                opportunities = opportunities.len(),
                elapsed_secs = format!("{:.1}", elapsed.as_secs_f64()),
                wait_secs = format!("{:.1}", actual_wait.as_secs_f64()),
                "Scan cycle done"
            );

            if !actual_wait.is_zero() {
                tokio::time::sleep(actual_wait).await;
            }
        }

        self.state.finish(FinishReason::Normal).await;
        let session = self.state.session().await;
        info!(session = %session, "Scan session finished");
        FinishReason::Normal
    }

    /// Collect prices for every target in random order. Returns `None`
    /// as soon as the deadline passes, dropping any in-flight fetch.
    async fn collect_cycle(&self, targets: &[String], deadline: Instant) -> Option<PriceSet> {
        let mut order = targets.to_vec();
        order.shuffle(&mut rand::thread_rng());

        let mut prices = PriceSet::new();
        for token in &order {
            let Ok(quotes) = timeout_at(deadline, self.aggregator.collect(token)).await else {
                warn!(token = %token, "Deadline reached while fetching, aborting cycle");
                return None;
            };
            if quotes.len() < 2 {
                warn!(token = %token, sources = quotes.len(), "Not enough sources to compare");
            }
            prices.insert(token.clone(), quotes);

            let paused = timeout_at(deadline, tokio::time::sleep(self.config.token_pause)).await;
            if paused.is_err() || Instant::now() >= deadline {
                return None;
            }
        }

        Some(prices)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
