//! Object scanner.
//!
//! Lists a job's objects in the bucket, keeps those inside the recency
//! window, and groups descriptors and junit results into one
//! [`BucketJobRun`] per run id. Runs without a descriptor are dropped.

use crate::jobrun::{BucketJobRun, JobRun};
use crate::layout::{self, ObjectKind};
use crate::watermark::compare_run_ids;
use chrono::{DateTime, TimeDelta, Utc};
use futures::StreamExt;
use jobrun_core::{Error, ListQuery, ObjectStore, cancellable};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default maximum object age considered by a scan, in hours.
pub const DEFAULT_RECENCY_WINDOW_HOURS: i64 = 24;

/// Scans slower than this log their phase timings.
const SLOW_SCAN_THRESHOLD: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Objects created longer ago than this are skipped.
    pub recency_window: TimeDelta,
    /// Listing starts at this object name (inclusive).
    pub start_offset: Option<String>,
    /// Runs whose id orders before this one are skipped. Compared with
    /// [`compare_run_ids`], so numeric ids keep their numeric order.
    pub min_run_id: Option<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            recency_window: TimeDelta::hours(DEFAULT_RECENCY_WINDOW_HOURS),
            start_offset: None,
            min_run_id: None,
        }
    }
}

/// A listing that broke part-way. `partial` holds the complete runs seen
/// before the failure.
#[derive(Debug, thiserror::Error)]
#[error("scan of {job_name} failed after {} complete runs: {source}", .partial.len())]
pub struct ScanError {
    pub job_name: String,
    pub partial: Vec<BucketJobRun>,
    #[source]
    pub source: Error,
}

/// Phase timings of one scan, reported only when the scan ran long.
struct ScanTrace<'a> {
    job_name: &'a str,
    started: Instant,
    steps: Vec<(&'static str, Duration)>,
}

impl<'a> ScanTrace<'a> {
    fn new(job_name: &'a str) -> Self {
        Self {
            job_name,
            started: Instant::now(),
            steps: vec![],
        }
    }

    fn step(&mut self, name: &'static str) {
        self.steps.push((name, self.started.elapsed()));
    }

    fn log_if_long(&self, threshold: Duration) {
        let total = self.started.elapsed();
        if total > threshold {
            let steps: Vec<String> = self
                .steps
                .iter()
                .map(|(name, at)| format!("{} at {}ms", name, at.as_millis()))
                .collect();
            warn!(
                job = %self.job_name,
                total_ms = total.as_millis() as u64,
                steps = %steps.join(", "),
                "Scan was slow"
            );
        }
    }
}

pub struct Scanner {
    store: Arc<dyn ObjectStore>,
    options: ScanOptions,
}

impl Scanner {
    pub fn new(store: Arc<dyn ObjectStore>, options: ScanOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Scan `job_name` against the current time.
    pub async fn scan(
        &self,
        job_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<BucketJobRun>, ScanError> {
        self.scan_at(job_name, Utc::now(), cancel).await
    }

    /// Scan `job_name`, measuring object age from `now`.
    pub async fn scan_at(
        &self,
        job_name: &str,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Vec<BucketJobRun>, ScanError> {
        let mut trace = ScanTrace::new(job_name);
        let query = ListQuery::new(layout::job_prefix(job_name))
            .with_start_offset(self.options.start_offset.clone());
        trace.step("query configured");

        let mut runs: Vec<BucketJobRun> = vec![];
        let mut by_run_id: HashMap<String, usize> = HashMap::new();

        let mut objects = match cancellable(cancel, self.store.list(&query)).await {
            Ok(objects) => objects,
            Err(source) => return Err(self.failed(job_name, runs, source)),
        };
        trace.step("iterator retrieved");

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => Some(Err(Error::Cancelled)),
                next = objects.next() => next,
            };
            let attrs = match next {
                None => break,
                Some(Ok(attrs)) => attrs,
                Some(Err(source)) => return Err(self.failed(job_name, runs, source)),
            };

            if now.signed_duration_since(attrs.created) > self.options.recency_window {
                continue;
            }

            let kind = layout::classify(&attrs.name);
            if let ObjectKind::ProwJob { run_id } | ObjectKind::Junit { run_id } = &kind
                && self.below_min_run_id(run_id)
            {
                continue;
            }

            match kind {
                ObjectKind::ProwJob { run_id } => {
                    debug!(job = %job_name, path = %attrs.name, "Found prowjob");
                    let run = self.run_for(&mut runs, &mut by_run_id, job_name, run_id);
                    if run.prow_job_path().is_none() {
                        run.set_prow_job_path(attrs.name);
                    } else {
                        debug!(path = %attrs.name, "Ignoring additional prowjob for run");
                    }
                }
                ObjectKind::Junit { run_id } => {
                    debug!(job = %job_name, path = %attrs.name, "Found junit");
                    self.run_for(&mut runs, &mut by_run_id, job_name, run_id)
                        .add_junit_path(attrs.name);
                }
                ObjectKind::Other => {}
            }
        }
        trace.step("list filtered");

        let complete = retain_complete(runs);
        trace.step("incomplete runs removed");
        trace.log_if_long(SLOW_SCAN_THRESHOLD);

        info!(job = %job_name, runs = complete.len(), "Scan complete");
        Ok(complete)
    }

    fn below_min_run_id(&self, run_id: &str) -> bool {
        self.options
            .min_run_id
            .as_deref()
            .is_some_and(|min| compare_run_ids(run_id, min) == Ordering::Less)
    }

    fn run_for<'r>(
        &self,
        runs: &'r mut Vec<BucketJobRun>,
        by_run_id: &mut HashMap<String, usize>,
        job_name: &str,
        run_id: String,
    ) -> &'r mut BucketJobRun {
        let idx = *by_run_id.entry(run_id).or_insert_with_key(|run_id| {
            runs.push(BucketJobRun::new(self.store.clone(), job_name, run_id.clone()));
            runs.len() - 1
        });
        &mut runs[idx]
    }

    fn failed(&self, job_name: &str, runs: Vec<BucketJobRun>, source: Error) -> ScanError {
        warn!(job = %job_name, error = %source, "Listing failed, returning partial scan");
        ScanError {
            job_name: job_name.to_string(),
            partial: retain_complete(runs),
            source,
        }
    }
}

/// Drop runs that never saw a descriptor.
fn retain_complete(runs: Vec<BucketJobRun>) -> Vec<BucketJobRun> {
    runs.into_iter()
        .filter(|run| {
            if run.prow_job_path().is_none() {
                info!(run_id = %run.job_run_id(), "Removing run because it doesn't have a prowjob.json");
                return false;
            }
            true
        })
        .collect()
}
