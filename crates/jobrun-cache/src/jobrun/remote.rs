use super::JobRun;
use async_trait::async_trait;
use jobrun_core::{Error, ObjectStore, Result, cancellable};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A job run read from the bucket.
///
/// Fetched content is memoized per path: each object is read from the
/// store at most once over the record's lifetime.
pub struct BucketJobRun {
    store: Arc<dyn ObjectStore>,

    job_name: String,
    job_run_id: String,
    prow_job_path: Option<String>,
    junit_paths: Vec<String>,

    content: HashMap<String, Vec<u8>>,
}

impl BucketJobRun {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        job_name: impl Into<String>,
        job_run_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            job_name: job_name.into(),
            job_run_id: job_run_id.into(),
            prow_job_path: None,
            junit_paths: vec![],
            content: HashMap::new(),
        }
    }

    /// Whether `path` has already been fetched.
    pub fn is_cached(&self, path: &str) -> bool {
        self.content.contains_key(path)
    }
}

impl fmt::Debug for BucketJobRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BucketJobRun")
            .field("job_name", &self.job_name)
            .field("job_run_id", &self.job_run_id)
            .field("prow_job_path", &self.prow_job_path)
            .field("junit_paths", &self.junit_paths)
            .field("cached_paths", &self.content.len())
            .finish()
    }
}

#[async_trait]
impl JobRun for BucketJobRun {
    fn job_name(&self) -> &str {
        &self.job_name
    }

    fn job_run_id(&self) -> &str {
        &self.job_run_id
    }

    fn prow_job_path(&self) -> Option<&str> {
        self.prow_job_path.as_deref()
    }

    fn junit_paths(&self) -> &[String] {
        &self.junit_paths
    }

    fn set_prow_job_path(&mut self, path: String) {
        self.prow_job_path = Some(path);
    }

    fn add_junit_path(&mut self, path: String) {
        self.junit_paths.push(path);
    }

    async fn get_content(&mut self, cancel: &CancellationToken, path: &str) -> Result<Vec<u8>> {
        if path.is_empty() {
            return Err(Error::MissingPath);
        }
        if let Some(content) = self.content.get(path) {
            return Ok(content.clone());
        }

        let content = cancellable(cancel, self.store.read(path)).await?;
        debug!(run_id = %self.job_run_id, path, bytes = content.len(), "Fetched object");
        self.content.insert(path.to_string(), content.clone());
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jobrun_store::MemoryStore;
    use std::time::Duration;

    const PROWJOB: &str = "logs/job-a/1/prowjob.json";
    const JUNIT_A: &str = "logs/job-a/1/artifacts/junit/junit_a.xml";
    const JUNIT_B: &str = "logs/job-a/1/artifacts/junit/junit_b.xml";

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.insert(PROWJOB, r#"{"metadata":{"name":"run-1"}}"#, now);
        store.insert(JUNIT_A, "<testsuite name=\"a\"/>", now);
        store.insert(JUNIT_B, "<testsuite name=\"b\"/>", now);
        store
    }

    fn run(store: &MemoryStore) -> BucketJobRun {
        let mut run = BucketJobRun::new(Arc::new(store.clone()), "job-a", "1");
        run.set_prow_job_path(PROWJOB.to_string());
        run.add_junit_path(JUNIT_A.to_string());
        run.add_junit_path(JUNIT_B.to_string());
        run
    }

    #[tokio::test]
    async fn test_get_content_is_memoized() {
        let store = store();
        let mut run = run(&store);
        let cancel = CancellationToken::new();

        let first = run.get_content(&cancel, JUNIT_A).await.unwrap();
        let second = run.get_content(&cancel, JUNIT_A).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.read_count(JUNIT_A), 1);
        assert!(run.is_cached(JUNIT_A));
    }

    #[tokio::test]
    async fn test_get_content_rejects_empty_path() {
        let store = store();
        let mut run = run(&store);
        let res = run.get_content(&CancellationToken::new(), "").await;
        assert!(matches!(res, Err(Error::MissingPath)));
        assert_eq!(store.total_reads(), 0);
    }

    #[tokio::test]
    async fn test_get_all_content() {
        let store = store();
        let mut run = run(&store);
        let cancel = CancellationToken::new();

        let content = run.get_all_content(&cancel).await.unwrap();
        assert_eq!(content.len(), 3);
        assert_eq!(content[JUNIT_B], b"<testsuite name=\"b\"/>");

        // A second sweep is served from the memo.
        run.get_all_content(&cancel).await.unwrap();
        assert_eq!(store.total_reads(), 3);
    }

    #[tokio::test]
    async fn test_get_all_content_aggregates_failures() {
        let store = store();
        store.fail_reads_of(JUNIT_A);
        store.fail_reads_of(JUNIT_B);
        let mut run = run(&store);

        let err = run
            .get_all_content(&CancellationToken::new())
            .await
            .unwrap_err();
        let errs = match err {
            Error::FetchAggregate(errs) => errs,
            other => panic!("expected aggregate error, got {other:?}"),
        };
        assert_eq!(errs.paths(), vec![JUNIT_A, JUNIT_B]);
        // Every path was attempted.
        assert_eq!(store.read_count(PROWJOB), 1);
        assert_eq!(store.read_count(JUNIT_B), 1);
    }

    #[tokio::test]
    async fn test_get_all_content_without_prowjob() {
        let store = store();
        let mut run = BucketJobRun::new(Arc::new(store.clone()), "job-a", "1");
        run.add_junit_path(JUNIT_A.to_string());

        let res = run.get_all_content(&CancellationToken::new()).await;
        assert!(matches!(res, Err(Error::MissingDescriptorPath(id)) if id == "1"));
    }

    #[tokio::test]
    async fn test_get_prow_job() {
        let store = store();
        let mut run = run(&store);
        let prow_job = run.get_prow_job(&CancellationToken::new()).await.unwrap();
        assert_eq!(prow_job.name(), "run-1");
    }

    #[tokio::test]
    async fn test_get_prow_job_parse_failure_is_distinct() {
        let store = MemoryStore::new();
        store.insert(PROWJOB, "{ definitely not json", Utc::now());
        let mut run = BucketJobRun::new(Arc::new(store), "job-a", "1");
        run.set_prow_job_path(PROWJOB.to_string());

        let res = run.get_prow_job(&CancellationToken::new()).await;
        assert!(matches!(res, Err(Error::Parse(_))));
    }

    #[tokio::test]
    async fn test_in_flight_fetch_is_cancelled() {
        let store = store();
        store.set_read_delay(Duration::from_secs(30));
        let mut run = run(&store);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let res = run.get_all_content(&cancel).await;
        assert!(matches!(res, Err(Error::Cancelled)));
        assert!(!run.is_cached(PROWJOB));
    }
}
