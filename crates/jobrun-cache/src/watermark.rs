//! High-water mark of an existing local cache.
//!
//! Prow run ids grow over time, so the newest cached run bounds which runs
//! a fresh scan still has to consider. Run ids are numbers of varying
//! width, so the bound is applied per run id rather than as a listing
//! offset: `1000` sorts before `999` as text.

use crate::layout::{self, PROW_JOB_FILENAME};
use jobrun_core::Result;
use std::cmp::Ordering;
use std::path::Path;

/// Order run ids numerically when both are numbers, lexically otherwise.
pub fn compare_run_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

/// Ids of the runs cached for a job that have a descriptor, oldest first.
pub(crate) fn cached_run_ids(working_dir: &Path, job_name: &str) -> Result<Vec<String>> {
    let job_dir = layout::local_job_dir(working_dir, job_name);
    if !job_dir.is_dir() {
        return Ok(vec![]);
    }

    let mut run_ids = vec![];
    for entry in std::fs::read_dir(&job_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let Ok(run_id) = entry.file_name().into_string() else {
            continue;
        };
        if entry.path().join(PROW_JOB_FILENAME).is_file() {
            run_ids.push(run_id);
        }
    }
    run_ids.sort_by(|a, b| compare_run_ids(a, b));
    Ok(run_ids)
}

/// Newest run id already cached for `job_name`, if any.
pub fn high_water_mark(working_dir: &Path, job_name: &str) -> Result<Option<String>> {
    Ok(cached_run_ids(working_dir, job_name)?.pop())
}
