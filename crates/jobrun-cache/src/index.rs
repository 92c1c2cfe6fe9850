//! Rebuild of the by-name index from an existing local cache.

use crate::jobrun::{FilesystemJobRun, JobRun};
use crate::watermark;
use crate::writer;
use jobrun_core::{Error, Result};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Rewrite the by-name entry of every cached run of `job_name` whose
/// descriptor carries the analysis label. Returns the entries written.
pub async fn rebuild_index(
    working_dir: &Path,
    job_name: &str,
    cancel: &CancellationToken,
) -> Result<usize> {
    let run_ids = watermark::cached_run_ids(working_dir, job_name)?;
    let mut indexed = 0;

    for run_id in run_ids {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut run = FilesystemJobRun::new(working_dir, job_name, &run_id)?;
        let prow_job = match run.get_prow_job(cancel).await {
            Ok(prow_job) => prow_job,
            Err(Error::ObjectNotFound(path)) => {
                warn!(job = %job_name, run_id = %run_id, path = %path, "Skipping cached run without prowjob.json");
                continue;
            }
            Err(e) => return Err(e),
        };

        if writer::write_by_name_index(working_dir, job_name, &prow_job)
            .await?
            .is_some()
        {
            indexed += 1;
        }
    }

    info!(job = %job_name, indexed, "Rebuilt by-name index");
    Ok(indexed)
}
