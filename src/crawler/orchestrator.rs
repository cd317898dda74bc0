//! Detail collection orchestration
//!
//! This module contains the per-URL unit of work and the orchestrator that hands
//! the URL list to a dispatch policy, including:
//! - Fetching and assembling one record per URL
//! - Classifying each unit as processed, skipped, or error
//! - Containing panics so one bad page cannot stop the run
//! - Progress reporting and the final collection summary

use crate::crawler::fetcher::{FetchResult, PageFetcher};
use crate::crawler::policy::DispatchPolicy;
use crate::crawler::stats::{CollectionStats, StatsSnapshot};
use crate::extract::{Record, RecordAssembler};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// How a single URL ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitVerdict {
    /// Fetched and kept
    Processed,
    /// Fetched but rejected by the validity predicate
    Skipped,
    /// Fetch failed or the unit panicked
    Error,
}

/// Everything a dispatch policy needs to process one URL
///
/// Shared by all workers; the record list is the only mutable state and is
/// guarded by a mutex that is never held across an await.
pub struct UnitOfWork {
    fetcher: PageFetcher,
    assembler: RecordAssembler,
    records: Mutex<Vec<Record>>,
    stats: CollectionStats,
    progress_every: u64,
    started: Instant,
}

impl UnitOfWork {
    pub fn new(fetcher: PageFetcher, assembler: RecordAssembler, progress_every: u64) -> Self {
        Self {
            fetcher,
            assembler,
            records: Mutex::new(Vec::new()),
            stats: CollectionStats::new(),
            progress_every: progress_every.max(1),
            started: Instant::now(),
        }
    }

    pub fn stats(&self) -> &CollectionStats {
        &self.stats
    }

    /// Processes one URL and updates the counters
    ///
    /// A panic while fetching or extracting is counted as an error.
    pub async fn process(&self, url: &str) -> UnitVerdict {
        let verdict = match AssertUnwindSafe(self.run_unit(url)).catch_unwind().await {
            Ok(verdict) => verdict,
            Err(_) => {
                tracing::error!("Unit for {} panicked", url);
                UnitVerdict::Error
            }
        };

        match verdict {
            UnitVerdict::Processed => {
                let processed = self.stats.record_processed();
                if processed % self.progress_every == 0 {
                    self.log_progress(processed);
                }
            }
            UnitVerdict::Skipped => {
                self.stats.record_skipped();
            }
            UnitVerdict::Error => {
                self.stats.record_error();
            }
        }

        verdict
    }

    async fn run_unit(&self, url: &str) -> UnitVerdict {
        let body = match self.fetcher.fetch(url).await {
            FetchResult::Fetched { body, .. } => body,
            FetchResult::Failed {
                kind,
                attempts,
                detail,
            } => {
                tracing::debug!("Failed {} after {} attempts ({}): {}", url, attempts, kind, detail);
                return UnitVerdict::Error;
            }
        };

        let assembled = self.assembler.assemble_body(&body, url);
        if !assembled.valid {
            tracing::debug!("Skipping {}: record rejected", url);
            return UnitVerdict::Skipped;
        }

        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(assembled.record);
        UnitVerdict::Processed
    }

    fn log_progress(&self, processed: u64) {
        let snapshot = self.stats.snapshot();
        let elapsed = self.started.elapsed();
        let rate = processed as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
        tracing::info!(
            "Progress: {} processed, {} errors, {} skipped ({:.1}% success, {:.2} records/sec)",
            snapshot.processed,
            snapshot.errors,
            snapshot.skipped,
            snapshot.success_rate(),
            rate
        );
    }

    fn take_records(&self) -> Vec<Record> {
        std::mem::take(&mut *self.records.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Result of the detail collection phase
#[derive(Debug, Clone)]
pub struct Collection {
    /// Kept records, in completion order
    pub records: Vec<Record>,
    pub stats: StatsSnapshot,
    pub elapsed: Duration,
    /// True if the run was cancelled before every URL was processed
    pub interrupted: bool,
}

/// Runs the unit of work over a URL list under a dispatch policy
pub struct Orchestrator {
    unit: Arc<UnitOfWork>,
    policy: Box<dyn DispatchPolicy>,
}

impl Orchestrator {
    pub fn new(unit: UnitOfWork, policy: Box<dyn DispatchPolicy>) -> Self {
        Self {
            unit: Arc::new(unit),
            policy,
        }
    }

    /// Processes every URL and returns the kept records with the counters
    ///
    /// Cancellation stops dispatch; units already finished are kept.
    pub async fn run(&self, urls: Vec<String>, cancel: &CancellationToken) -> Collection {
        let start = Instant::now();
        let total = urls.len();

        tracing::info!(
            "Collecting {} detail pages ({} policy)",
            total,
            self.policy.name()
        );

        self.policy
            .dispatch(urls, Arc::clone(&self.unit), cancel.clone())
            .await;

        let stats = self.unit.stats().snapshot();
        let interrupted = cancel.is_cancelled() && (stats.total() as usize) < total;
        let elapsed = start.elapsed();

        if interrupted {
            tracing::warn!(
                "Collection interrupted after {} of {} URLs",
                stats.total(),
                total
            );
        }
        tracing::info!(
            "Collection finished in {:.1}s: {} processed, {} errors, {} skipped ({:.1}% success)",
            elapsed.as_secs_f64(),
            stats.processed,
            stats.errors,
            stats.skipped,
            stats.success_rate()
        );

        Collection {
            records: self.unit.take_records(),
            stats,
            elapsed,
            interrupted,
        }
    }
}
