//! Local cache writer.
//!
//! A run is written as `<root>/<bucket path>` for every fetched object,
//! plus a normalized `prowjob.yaml` next to the raw `prowjob.json`. Runs
//! carrying the analysis label also get a by-name index entry.
//!
//! All content is fetched before the first byte hits the disk. If the write
//! phase fails, directories created by this call are removed again before
//! the error is returned.

use crate::jobrun::JobRun;
use crate::layout::{self, NORMALIZED_PROW_JOB_FILENAME};
use jobrun_core::{Error, ProwJob, Result, serialize_prow_job};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What one cache write produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheWrite {
    /// Files written, normalized descriptors and index entry included.
    pub files_written: usize,
    /// The by-name index entry, when the run carries the analysis label.
    pub by_name: Option<PathBuf>,
}

/// Directories brought into existence by one write, removed on drop unless
/// disarmed. Removal errors are logged and never replace the write error.
struct CreatedDirs {
    created: Vec<PathBuf>,
    armed: bool,
}

impl CreatedDirs {
    fn new() -> Self {
        Self {
            created: vec![],
            armed: true,
        }
    }

    /// Remember the outermost missing ancestor of `dir` before it is created.
    async fn track(&mut self, dir: &Path) -> Result<()> {
        if exists(dir).await? {
            return Ok(());
        }
        let mut outermost = dir;
        while let Some(parent) = outermost.parent() {
            if parent.as_os_str().is_empty() || exists(parent).await? {
                break;
            }
            outermost = parent;
        }
        if !self.created.iter().any(|c| outermost.starts_with(c)) {
            self.created.push(outermost.to_path_buf());
        }
        Ok(())
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CreatedDirs {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        for dir in self.created.iter().rev() {
            match std::fs::remove_dir_all(dir) {
                Ok(()) => debug!(path = %dir.display(), "Removed partially written cache dir"),
                Err(e) => {
                    warn!(path = %dir.display(), error = %e, "Failed to remove partially written cache dir")
                }
            }
        }
    }
}

fn write_error(path: &Path, source: io::Error) -> Error {
    Error::Write {
        path: path.to_path_buf(),
        source,
    }
}

async fn exists(path: &Path) -> Result<bool> {
    fs::try_exists(path).await.map_err(|e| write_error(path, e))
}

async fn write_file(dirs: &mut CreatedDirs, target: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = target.parent() {
        dirs.track(parent).await?;
        fs::create_dir_all(parent)
            .await
            .map_err(|e| write_error(parent, e))?;
    }
    fs::write(target, bytes)
        .await
        .map_err(|e| write_error(target, e))
}

/// A path segment that is safe to use as a directory name.
fn is_plain_segment(segment: &str) -> bool {
    !segment.is_empty() && segment != "." && segment != ".." && !segment.contains(['/', '\\'])
}

/// Index location for a descriptor, if it belongs in the by-name index.
fn index_target(root: &Path, job_name: &str, prow_job: &ProwJob) -> Option<PathBuf> {
    let analysis = prow_job.analysis_label()?;
    if !is_plain_segment(analysis) || !is_plain_segment(prow_job.name()) {
        warn!(
            job = %job_name,
            analysis,
            name = %prow_job.name(),
            "Skipping by-name index entry with unusable label or name"
        );
        return None;
    }
    Some(layout::by_name_path(root, job_name, analysis, prow_job.name()))
}

/// Write the by-name index entry for a descriptor, if it carries the
/// analysis label. Returns the entry written.
pub async fn write_by_name_index(
    root: &Path,
    job_name: &str,
    prow_job: &ProwJob,
) -> Result<Option<PathBuf>> {
    let Some(target) = index_target(root, job_name, prow_job) else {
        return Ok(None);
    };
    let normalized = serialize_prow_job(prow_job)?;

    let mut dirs = CreatedDirs::new();
    write_file(&mut dirs, &target, &normalized).await?;
    dirs.disarm();
    Ok(Some(target))
}

/// Persist every path of `run` under `parent_dir`.
pub async fn write_cache<R: JobRun + ?Sized>(
    run: &mut R,
    cancel: &CancellationToken,
    parent_dir: &Path,
) -> Result<CacheWrite> {
    let prow_job = run.get_prow_job(cancel).await?;
    let normalized = serialize_prow_job(&prow_job)?;
    let content = run.get_all_content(cancel).await?;

    if let Some(name) = content.keys().find(|name| !layout::is_safe_object_name(name)) {
        return Err(write_error(
            &layout::local_path(parent_dir, name),
            io::Error::new(io::ErrorKind::InvalidInput, "object name escapes the cache root"),
        ));
    }

    let descriptor_path = run.prow_job_path().unwrap_or_default().to_string();
    let mut dirs = CreatedDirs::new();
    let mut written = CacheWrite::default();

    for (path, bytes) in &content {
        let target = layout::local_path(parent_dir, path);
        write_file(&mut dirs, &target, bytes).await?;
        written.files_written += 1;

        if *path == descriptor_path {
            let normalized_target = target.with_file_name(NORMALIZED_PROW_JOB_FILENAME);
            write_file(&mut dirs, &normalized_target, &normalized).await?;
            written.files_written += 1;
        }
    }

    if let Some(target) = index_target(parent_dir, run.job_name(), &prow_job) {
        write_file(&mut dirs, &target, &normalized).await?;
        written.files_written += 1;
        written.by_name = Some(target);
    }

    dirs.disarm();
    info!(
        job = %run.job_name(),
        run_id = %run.job_run_id(),
        files = written.files_written,
        indexed = written.by_name.is_some(),
        "Cached job run"
    );
    Ok(written)
}
