//! Test fixtures for creating sample buckets.

use chrono::{DateTime, TimeDelta, Utc};
use jobrun_cache::layout;
use jobrun_core::prowjob::ANALYSIS_LABEL;
use jobrun_store::MemoryStore;
use serde_json::json;

/// Factory for prow descriptors as prow writes them.
pub struct ProwJobFixture;

impl ProwJobFixture {
    /// A finished descriptor, with the vendor bookkeeping field set.
    pub fn json(name: &str, analysis: Option<&str>) -> String {
        let mut labels = serde_json::Map::new();
        labels.insert("prow.k8s.io/type".to_string(), json!("periodic"));
        if let Some(analysis) = analysis {
            labels.insert(ANALYSIS_LABEL.to_string(), json!(analysis));
        }
        json!({
            "apiVersion": "prow.k8s.io/v1",
            "kind": "ProwJob",
            "metadata": {
                "name": name,
                "namespace": "ci",
                "labels": labels,
                "annotations": {"prow.k8s.io/job": name},
                "managedFields": [{"manager": "prow-controller-manager", "operation": "Update"}]
            },
            "spec": {"type": "periodic", "job": name},
            "status": {"state": "success", "startTime": "2021-09-01T10:00:00Z"}
        })
        .to_string()
    }
}

/// One run to place in a [`BucketFixture`].
#[derive(Debug, Clone)]
pub struct RunFixture {
    pub run_id: String,
    pub age: TimeDelta,
    /// Descriptor name, `None` for a run whose descriptor is missing.
    pub prow_job: Option<String>,
    pub analysis: Option<String>,
    /// Run-relative junit paths.
    pub junit: Vec<String>,
    /// Run-relative paths of objects that are neither descriptor nor junit.
    pub other: Vec<String>,
}

impl RunFixture {
    pub fn new(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            age: TimeDelta::hours(1),
            prow_job: Some(format!("run-{run_id}")),
            analysis: None,
            junit: vec![],
            other: vec!["build-log.txt".to_string()],
        }
    }

    pub fn aged(mut self, age: TimeDelta) -> Self {
        self.age = age;
        self
    }

    pub fn named(mut self, name: &str) -> Self {
        self.prow_job = Some(name.to_string());
        self
    }

    pub fn without_prow_job(mut self) -> Self {
        self.prow_job = None;
        self
    }

    pub fn with_analysis(mut self, analysis: &str) -> Self {
        self.analysis = Some(analysis.to_string());
        self
    }

    pub fn with_junit(mut self, relative: &str) -> Self {
        self.junit.push(relative.to_string());
        self
    }
}

/// A job's objects in an in-memory bucket.
pub struct BucketFixture {
    job_name: String,
    runs: Vec<RunFixture>,
}

impl BucketFixture {
    pub fn new(job_name: &str) -> Self {
        Self {
            job_name: job_name.to_string(),
            runs: vec![],
        }
    }

    pub fn with_run(mut self, run: RunFixture) -> Self {
        self.runs.push(run);
        self
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    /// Every object of the fixture as (name, body, created), relative to `now`.
    pub fn objects(&self, now: DateTime<Utc>) -> Vec<(String, String, DateTime<Utc>)> {
        let mut objects = vec![];
        for run in &self.runs {
            let created = now - run.age;
            let base = layout::run_prefix(&self.job_name, &run.run_id);
            if let Some(name) = &run.prow_job {
                objects.push((
                    layout::prow_job_path(&self.job_name, &run.run_id),
                    ProwJobFixture::json(name, run.analysis.as_deref()),
                    created,
                ));
            }
            for junit in &run.junit {
                objects.push((
                    format!("{base}/{junit}"),
                    format!("<testsuite name=\"{junit}\"/>"),
                    created,
                ));
            }
            for other in &run.other {
                objects.push((format!("{base}/{other}"), "log".to_string(), created));
            }
        }
        objects
    }

    /// Load the fixture into `store`, ages measured from `now`.
    pub fn populate(&self, store: &MemoryStore, now: DateTime<Utc>) {
        for (name, body, created) in self.objects(now) {
            store.insert(name, body, created);
        }
    }

    /// A fresh store holding the fixture, ages measured from the current time.
    pub fn store(&self) -> MemoryStore {
        let store = MemoryStore::new();
        self.populate(&store, Utc::now());
        store
    }
}
