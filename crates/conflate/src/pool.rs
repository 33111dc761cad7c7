//! Locality worker pool.
//!
//! A fixed number of scoped worker threads pull locality ids from a shared
//! queue. Each pass is independent; workers share only the read-only
//! registry, the finding sink, and the run counters. Cancellation is
//! checked between localities, so a pass in flight always finishes.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::Serialize;

use crate::config::ConflateConfig;
use crate::engine::{run_locality, LocalityReport};
use crate::evidence::{Counters, Tally};
use crate::finding::FindingSink;
use crate::model::LocalityId;
use crate::registry::{Lookups, Registry};

/// Cooperative stop flag shared with the caller.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: String,
    pub finished_at: String,
    /// One report per locality that was picked up, ordered by locality.
    pub reports: Vec<LocalityReport>,
    /// Localities never started because the run was cancelled.
    pub skipped: Vec<LocalityId>,
    /// Counters over complete localities only.
    pub counters: Tally,
    pub engine_version: String,
}

impl RunSummary {
    pub fn complete(&self) -> usize {
        self.reports.iter().filter(|r| r.is_complete()).count()
    }

    pub fn incomplete(&self) -> usize {
        self.reports.len() - self.complete()
    }

    pub fn finding_total(&self) -> usize {
        self.reports.iter().map(|r| r.findings.len()).sum()
    }
}

/// Process every locality on the configured number of workers.
///
/// Findings are handed to `sink` when their locality finishes. Incomplete
/// localities report no findings and contribute no counters.
pub fn run_localities(
    localities: &[LocalityId],
    registry: &dyn Registry,
    lookups: &dyn Lookups,
    sink: &dyn FindingSink,
    config: &ConflateConfig,
    cancel: &CancelToken,
) -> RunSummary {
    let started_at = Utc::now().to_rfc3339();
    let queue: Mutex<VecDeque<LocalityId>> = Mutex::new(localities.iter().copied().collect());
    let reports: Mutex<Vec<LocalityReport>> = Mutex::new(Vec::with_capacity(localities.len()));
    let counters = Counters::new();
    let workers = config.workers.min(localities.len()).max(1);

    info!(
        "run started: {} localities, {} workers",
        localities.len(),
        workers
    );

    std::thread::scope(|scope| {
        for worker in 0..workers {
            let queue = &queue;
            let reports = &reports;
            let counters = &counters;
            scope.spawn(move || loop {
                if cancel.is_cancelled() {
                    debug!("worker {worker}: cancelled");
                    break;
                }
                let Some(locality) = queue.lock().pop_front() else {
                    break;
                };
                if cancel.is_cancelled() {
                    queue.lock().push_front(locality);
                    break;
                }

                let report = run_guarded(locality, registry, lookups, config);
                if report.is_complete() {
                    for finding in &report.findings {
                        sink.report(finding);
                    }
                    counters.merge(&report.tally);
                }
                reports.lock().push(report);
            });
        }
    });

    let mut reports = reports.into_inner();
    reports.sort_by_key(|r| r.locality);
    let skipped: Vec<LocalityId> = queue.into_inner().into_iter().collect();
    if !skipped.is_empty() {
        warn!("run cancelled: {} localities skipped", skipped.len());
    }

    let summary = RunSummary {
        started_at,
        finished_at: Utc::now().to_rfc3339(),
        reports,
        skipped,
        counters: counters.snapshot(),
        engine_version: env!("CARGO_PKG_VERSION").to_string(),
    };
    info!(
        "run finished: {} complete, {} incomplete, {} findings",
        summary.complete(),
        summary.incomplete(),
        summary.finding_total()
    );
    summary
}

/// A panicking pass must not take the worker down with it.
fn run_guarded(
    locality: LocalityId,
    registry: &dyn Registry,
    lookups: &dyn Lookups,
    config: &ConflateConfig,
) -> LocalityReport {
    let started_at = Utc::now().to_rfc3339();
    catch_unwind(AssertUnwindSafe(|| {
        run_locality(locality, registry, lookups, config)
    }))
    .unwrap_or_else(|_| {
        warn!("{locality}: pass panicked");
        LocalityReport::incomplete(locality, "pass panicked".to_string(), started_at)
    })
}
