//! One caching pass for a job: scan the bucket, then write every complete
//! run into the working directory.

use crate::jobrun::{BucketJobRun, JobRun};
use crate::scanner::{ScanError, ScanOptions, Scanner};
use crate::watermark;
use jobrun_core::{ObjectStore, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct CacheBuilderOptions {
    pub job_name: String,
    pub working_dir: PathBuf,
    pub scan: ScanOptions,
    /// Skip runs older than the newest run already cached.
    pub resume_from_cache: bool,
}

impl CacheBuilderOptions {
    pub fn new(job_name: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            job_name: job_name.into(),
            working_dir: working_dir.into(),
            scan: ScanOptions::default(),
            resume_from_cache: false,
        }
    }
}

/// Outcome of a caching pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheSummary {
    /// Complete runs found by the scan.
    pub discovered: usize,
    /// Runs written to the cache.
    pub cached: usize,
    /// By-name index entries written.
    pub indexed: usize,
}

pub struct CacheBuilder {
    store: Arc<dyn ObjectStore>,
    options: CacheBuilderOptions,
}

impl CacheBuilder {
    pub fn new(store: Arc<dyn ObjectStore>, options: CacheBuilderOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &CacheBuilderOptions {
        &self.options
    }

    /// Scan the job and cache every complete run.
    ///
    /// A listing failure still caches the runs completed before it and then
    /// returns the listing error. The first write failure ends the pass.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<CacheSummary> {
        let job_name = &self.options.job_name;
        info!(job = %job_name, working_dir = %self.options.working_dir.display(), "Caching job runs");

        let mut scan = self.options.scan.clone();
        if self.options.resume_from_cache && scan.min_run_id.is_none() {
            scan.min_run_id = watermark::high_water_mark(&self.options.working_dir, job_name)?;
            if let Some(run_id) = &scan.min_run_id {
                info!(job = %job_name, run_id = %run_id, "Resuming from newest cached run");
            }
        }

        let scanner = Scanner::new(self.store.clone(), scan);
        let (runs, listing_err) = match scanner.scan(job_name, cancel).await {
            Ok(runs) => (runs, None),
            Err(ScanError { source, .. }) if source.is_cancelled() => return Err(source),
            Err(ScanError { partial, source, .. }) => (partial, Some(source)),
        };

        let summary = self.cache_runs(runs, cancel).await?;

        if let Some(err) = listing_err {
            warn!(job = %job_name, cached = summary.cached, "Cached partial listing");
            return Err(err);
        }

        info!(
            job = %job_name,
            discovered = summary.discovered,
            cached = summary.cached,
            indexed = summary.indexed,
            "Caching pass complete"
        );
        Ok(summary)
    }

    async fn cache_runs(
        &self,
        runs: Vec<BucketJobRun>,
        cancel: &CancellationToken,
    ) -> Result<CacheSummary> {
        let mut summary = CacheSummary {
            discovered: runs.len(),
            ..CacheSummary::default()
        };
        for mut run in runs {
            let written = run.write_cache(cancel, &self.options.working_dir).await?;
            summary.cached += 1;
            if written.by_name.is_some() {
                summary.indexed += 1;
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, Utc};
    use jobrun_core::Error;
    use jobrun_store::MemoryStore;
    use pretty_assertions::assert_eq;

    fn prowjob(name: &str, analysis: Option<&str>) -> String {
        match analysis {
            Some(a) => format!(
                r#"{{"metadata":{{"name":"{name}","labels":{{"release.openshift.io/analysis":"{a}"}}}}}}"#
            ),
            None => format!(r#"{{"metadata":{{"name":"{name}"}}}}"#),
        }
    }

    fn populated() -> MemoryStore {
        let now = Utc::now();
        let store = MemoryStore::new();
        store.insert("logs/job-a/100/prowjob.json", prowjob("run-100", Some("4.9")), now);
        store.insert("logs/job-a/100/artifacts/junit/junit.xml", "<a/>", now);
        store.insert("logs/job-a/101/prowjob.json", prowjob("run-101", None), now);
        store.insert("logs/job-a/102/artifacts/junit/junit.xml", "<c/>", now);
        store
    }

    fn builder(store: &MemoryStore, dir: &std::path::Path) -> CacheBuilder {
        CacheBuilder::new(
            Arc::new(store.clone()),
            CacheBuilderOptions::new("job-a", dir),
        )
    }

    #[tokio::test]
    async fn test_caches_complete_runs() {
        let dir = tempfile::tempdir().unwrap();
        let store = populated();

        let summary = builder(&store, dir.path())
            .run(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            summary,
            CacheSummary {
                discovered: 2,
                cached: 2,
                indexed: 1,
            }
        );
        let root = dir.path();
        assert!(root.join("logs/job-a/100/artifacts/junit/junit.xml").is_file());
        assert!(root.join("logs/job-a/101/prowjob.yaml").is_file());
        assert!(!root.join("logs/job-a/102").exists());
        assert!(root.join("by-name/job-a/4.9/run-100/prowjob.yaml").is_file());
    }

    #[tokio::test]
    async fn test_resume_picks_up_run_id_with_more_digits() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();
        let store = MemoryStore::new();
        store.insert("logs/job-a/998/prowjob.json", prowjob("run-998", None), now);
        store.insert("logs/job-a/999/prowjob.json", prowjob("run-999", None), now);
        let first = builder(&store, dir.path())
            .run(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(first.cached, 2);
        std::fs::remove_dir_all(dir.path().join("logs/job-a/998")).unwrap();
        store.insert("logs/job-a/997/prowjob.json", prowjob("run-997", None), now);
        store.insert("logs/job-a/1000/prowjob.json", prowjob("run-1000", None), now);
        store.insert("logs/job-a/1000/artifacts/junit/junit.xml", "<d/>", now);

        let mut options = CacheBuilderOptions::new("job-a", dir.path());
        options.resume_from_cache = true;
        let summary = CacheBuilder::new(Arc::new(store.clone()), options)
            .run(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            summary,
            CacheSummary {
                discovered: 2,
                cached: 2,
                indexed: 0,
            }
        );
        let root = dir.path();
        assert!(root.join("logs/job-a/1000/prowjob.yaml").is_file());
        assert!(root.join("logs/job-a/1000/artifacts/junit/junit.xml").is_file());
        assert!(!root.join("logs/job-a/997").exists());
        assert!(!root.join("logs/job-a/998").exists());
        let queries = store.queries();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[1].start_offset, None);
    }

    #[tokio::test]
    async fn test_listing_failure_caches_partial_set() {
        let dir = tempfile::tempdir().unwrap();
        let store = populated();
        store.fail_listing_after(2);

        let err = builder(&store, dir.path())
            .run(&CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Listing { .. }));
        assert!(dir.path().join("logs/job-a/100/prowjob.json").is_file());
        assert!(!dir.path().join("logs/job-a/101").exists());
    }

    #[tokio::test]
    async fn test_first_write_failure_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let store = populated();
        store.fail_reads_of("logs/job-a/100/artifacts/junit/junit.xml");

        let err = builder(&store, dir.path())
            .run(&CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::FetchAggregate(_)));
        // Run 101 sorts after the failing run and is never fetched.
        assert_eq!(store.read_count("logs/job-a/101/prowjob.json"), 0);
    }

    #[tokio::test]
    async fn test_stale_runs_are_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        store.insert(
            "logs/job-a/1/prowjob.json",
            prowjob("old", None),
            Utc::now() - TimeDelta::hours(48),
        );

        let summary = builder(&store, dir.path())
            .run(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary, CacheSummary::default());
        assert_eq!(store.total_reads(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_pass_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = populated();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = builder(&store, dir.path()).run(&cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(!dir.path().join("logs").exists());
    }
}
