use super::JobRun;
use crate::layout::{self, LOGS_ROOT};
use async_trait::async_trait;
use jobrun_core::{Error, Result, cancellable};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

/// A job run read back from a local cache directory.
///
/// Paths are kept in bucket form (`logs/<job>/<run id>/...`) so the record
/// is interchangeable with a [`super::BucketJobRun`]. Content is read from
/// disk on every call.
#[derive(Debug, Clone)]
pub struct FilesystemJobRun {
    working_dir: PathBuf,

    job_name: String,
    job_run_id: String,
    prow_job_path: Option<String>,
    junit_paths: Vec<String>,
}

impl FilesystemJobRun {
    /// Open the cached run at `<working_dir>/logs/<job>/<run id>` and
    /// register every junit result below it.
    pub fn new(working_dir: &Path, job_name: &str, job_run_id: &str) -> Result<Self> {
        let job_dir = layout::local_job_dir(working_dir, job_name);
        let run_dir = job_dir.join(job_run_id);

        let mut junit_paths = vec![];
        for entry in WalkDir::new(&run_dir).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let message = e.to_string();
                e.into_io_error()
                    .map(Error::Io)
                    .unwrap_or(Error::Internal(message))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(path) = bucket_path(&job_dir, job_name, entry.path()) else {
                continue;
            };
            if layout::is_junit_path(&path) {
                junit_paths.push(path);
            }
        }

        Ok(Self {
            working_dir: working_dir.to_path_buf(),
            job_name: job_name.to_string(),
            job_run_id: job_run_id.to_string(),
            prow_job_path: Some(layout::prow_job_path(job_name, job_run_id)),
            junit_paths,
        })
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }
}

/// Rebuild the bucket path of a cached file: the part of the local path
/// from the run id segment onwards, under `logs/<job>/`.
fn bucket_path(job_dir: &Path, job_name: &str, local: &Path) -> Option<String> {
    let from_run_id = local.strip_prefix(job_dir).ok()?;
    let mut parts = vec![LOGS_ROOT, job_name];
    for component in from_run_id.components() {
        parts.push(component.as_os_str().to_str()?);
    }
    Some(parts.join("/"))
}

#[async_trait]
impl JobRun for FilesystemJobRun {
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
        if !layout::is_safe_object_name(path) {
            return Err(Error::Fetch {
                path: path.to_string(),
                message: "path escapes the working directory".to_string(),
            });
        }

        let local = layout::local_path(&self.working_dir, path);
        cancellable(cancel, async {
            tokio::fs::read(&local).await.map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => Error::ObjectNotFound(path.to_string()),
                _ => Error::Fetch {
                    path: path.to_string(),
                    message: e.to_string(),
                },
            })
        })
        .await
    }
}
