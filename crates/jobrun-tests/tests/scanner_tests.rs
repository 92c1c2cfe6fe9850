//! Scanner behavior against whole listings.
//!
//! Run with: `cargo test -p jobrun-tests --test scanner_tests`

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use futures::stream;
use jobrun_cache::{JobRun, ScanOptions, Scanner};
use jobrun_core::{Error, ListQuery, ObjectAttrs, ObjectStore, ObjectStream, Result};
use jobrun_tests::{BucketFixture, RunFixture, init_test_logging};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Store that lists its objects in exactly the order given.
struct OrderedListing {
    objects: Vec<ObjectAttrs>,
}

#[async_trait]
impl ObjectStore for OrderedListing {
    async fn list(&self, query: &ListQuery) -> Result<ObjectStream> {
        let matching: Vec<Result<ObjectAttrs>> = self
            .objects
            .iter()
            .filter(|o| query.matches(&o.name))
            .cloned()
            .map(Ok)
            .collect();
        Ok(Box::pin(stream::iter(matching)))
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        Err(Error::ObjectNotFound(path.to_string()))
    }
}

/// Run id to (descriptor path, sorted junit paths).
fn grouped(runs: &[jobrun_cache::BucketJobRun]) -> BTreeMap<String, (Option<String>, Vec<String>)> {
    runs.iter()
        .map(|run| {
            let mut junit = run.junit_paths().to_vec();
            junit.sort();
            (
                run.job_run_id().to_string(),
                (run.prow_job_path().map(str::to_string), junit),
            )
        })
        .collect()
}

fn fixture() -> BucketFixture {
    BucketFixture::new("jobA")
        .with_run(
            RunFixture::new("1001")
                .with_junit("artifacts/e2e/junit/junit_e2e.xml")
                .with_junit("artifacts/junit_install.xml"),
        )
        .with_run(RunFixture::new("1002"))
        .with_run(RunFixture::new("1003").with_junit("artifacts/junit/junit_upgrade.xml"))
        .with_run(
            RunFixture::new("1004")
                .without_prow_job()
                .with_junit("artifacts/junit/junit.xml"),
        )
}

async fn scan_in_order(objects: Vec<ObjectAttrs>, now: DateTime<Utc>) -> Vec<jobrun_cache::BucketJobRun> {
    Scanner::new(Arc::new(OrderedListing { objects }), ScanOptions::default())
        .scan_at("jobA", now, &CancellationToken::new())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_recency_window_scenario() {
    init_test_logging();
    let now = Utc::now();
    let objects = vec![
        ObjectAttrs {
            name: "logs/jobA/run1/prowjob.json".to_string(),
            created: now - TimeDelta::hours(1),
        },
        ObjectAttrs {
            name: "logs/jobA/run1/artifacts/junit_x.xml".to_string(),
            created: now - TimeDelta::hours(1),
        },
        ObjectAttrs {
            name: "logs/jobA/run2/prowjob.json".to_string(),
            created: now - TimeDelta::hours(48),
        },
    ];

    let runs = scan_in_order(objects, now).await;

    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].job_run_id(), "run1");
    assert_eq!(runs[0].prow_job_path(), Some("logs/jobA/run1/prowjob.json"));
    assert_eq!(
        runs[0].junit_paths(),
        &["logs/jobA/run1/artifacts/junit_x.xml".to_string()]
    );
}

#[tokio::test]
async fn test_grouping_is_independent_of_listing_order() {
    init_test_logging();
    let now = Utc::now();
    let objects: Vec<ObjectAttrs> = fixture()
        .objects(now)
        .into_iter()
        .map(|(name, _, created)| ObjectAttrs { name, created })
        .collect();

    let forward = grouped(&scan_in_order(objects.clone(), now).await);

    let mut reversed = objects.clone();
    reversed.reverse();
    let backward = grouped(&scan_in_order(reversed, now).await);

    // Descriptors last: every run is first seen through a junit path.
    let mut descriptors_last = objects;
    descriptors_last.sort_by_key(|o| o.name.ends_with("prowjob.json"));
    let late = grouped(&scan_in_order(descriptors_last, now).await);

    assert_eq!(forward, backward);
    assert_eq!(forward, late);
    assert_eq!(
        forward.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["1001", "1002", "1003"]
    );
    assert_eq!(
        forward["1001"].1,
        vec![
            "logs/jobA/1001/artifacts/e2e/junit/junit_e2e.xml".to_string(),
            "logs/jobA/1001/artifacts/junit_install.xml".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_job_name_prefix_does_not_leak() {
    let now = Utc::now();
    let store = BucketFixture::new("jobA").with_run(RunFixture::new("1")).store();
    BucketFixture::new("jobA-upgrade")
        .with_run(RunFixture::new("2"))
        .populate(&store, now);

    let runs = Scanner::new(Arc::new(store.clone()), ScanOptions::default())
        .scan("jobA", &CancellationToken::new())
        .await
        .unwrap();

    let ids: Vec<&str> = runs.iter().map(|r| r.job_run_id()).collect();
    assert_eq!(ids, vec!["1"]);
}
