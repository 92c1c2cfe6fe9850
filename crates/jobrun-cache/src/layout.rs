//! Bucket path layout and object classification.
//!
//! Runs live at `logs/<job>/<run id>/`. The run's descriptor is
//! `prowjob.json` directly inside that directory; junit results are any
//! `.xml` file below a `junit*` directory.

use std::path::{Path, PathBuf};

/// Top-level directory of job logs in the bucket.
pub const LOGS_ROOT: &str = "logs";

/// Descriptor file name as written by prow.
pub const PROW_JOB_FILENAME: &str = "prowjob.json";

/// Normalized descriptor written next to the raw one in the cache.
pub const NORMALIZED_PROW_JOB_FILENAME: &str = "prowjob.yaml";

pub const JUNIT_EXTENSION: &str = ".xml";

/// Marker a junit result's path must contain.
pub const JUNIT_MARKER: &str = "/junit";

/// Root of the secondary index in the cache.
pub const BY_NAME_DIR: &str = "by-name";

/// Minimum segments of a junit path: `logs/<job>/<run id>/<file>`.
const MIN_JUNIT_SEGMENTS: usize = 4;

/// Segment of a junit path holding the run id.
const RUN_ID_SEGMENT: usize = 2;

/// What a listed object is to the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectKind {
    ProwJob { run_id: String },
    Junit { run_id: String },
    Other,
}

/// Classify a bucket object name.
pub fn classify(name: &str) -> ObjectKind {
    if let Some(dir) = name.strip_suffix(PROW_JOB_FILENAME)
        && let Some(dir) = dir.strip_suffix('/')
    {
        let run_id = dir.rsplit('/').next().unwrap_or(dir);
        if run_id.is_empty() {
            return ObjectKind::Other;
        }
        return ObjectKind::ProwJob {
            run_id: run_id.to_string(),
        };
    }

    if name.ends_with(JUNIT_EXTENSION) && name.contains(JUNIT_MARKER) {
        let parts: Vec<&str> = name.split('/').collect();
        if parts.len() < MIN_JUNIT_SEGMENTS || parts[RUN_ID_SEGMENT].is_empty() {
            return ObjectKind::Other;
        }
        return ObjectKind::Junit {
            run_id: parts[RUN_ID_SEGMENT].to_string(),
        };
    }

    ObjectKind::Other
}

/// Whether a run-relative path names a junit result.
pub fn is_junit_path(path: &str) -> bool {
    path.ends_with(JUNIT_EXTENSION) && path.contains(JUNIT_MARKER)
}

/// Listing prefix for every object of a job: `logs/<job>/`.
pub fn job_prefix(job_name: &str) -> String {
    format!("{}/{}/", LOGS_ROOT, job_name)
}

/// Bucket directory of one run: `logs/<job>/<run id>`.
pub fn run_prefix(job_name: &str, run_id: &str) -> String {
    format!("{}/{}/{}", LOGS_ROOT, job_name, run_id)
}

/// Bucket path of a run's descriptor.
pub fn prow_job_path(job_name: &str, run_id: &str) -> String {
    format!("{}/{}", run_prefix(job_name, run_id), PROW_JOB_FILENAME)
}

/// Local directory holding a job's cached runs.
pub fn local_job_dir(working_dir: &Path, job_name: &str) -> PathBuf {
    working_dir.join(LOGS_ROOT).join(job_name)
}

/// Whether an object name stays inside the cache root when mirrored locally.
pub fn is_safe_object_name(name: &str) -> bool {
    !name.is_empty() && !name.split('/').any(|segment| segment == "." || segment == "..")
}

/// Local file for a bucket object path.
pub fn local_path(root: &Path, object_name: &str) -> PathBuf {
    object_name
        .split('/')
        .filter(|segment| !segment.is_empty())
        .fold(root.to_path_buf(), |path, segment| path.join(segment))
}

/// Secondary index entry: `by-name/<job>/<analysis label>/<prowjob name>/prowjob.yaml`.
pub fn by_name_path(root: &Path, job_name: &str, analysis: &str, prow_job_name: &str) -> PathBuf {
    root.join(BY_NAME_DIR)
        .join(job_name)
        .join(analysis)
        .join(prow_job_name)
        .join(NORMALIZED_PROW_JOB_FILENAME)
}
