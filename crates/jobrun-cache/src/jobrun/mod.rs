//! Job run records.
//!
//! A [`JobRun`] is one execution of a job: its identity, the bucket paths of
//! its descriptor and junit results, and access to their content. The
//! content comes from the bucket ([`BucketJobRun`]) or from a local cache
//! that mirrors the bucket ([`FilesystemJobRun`]); callers only see the
//! trait.

mod filesystem;
mod remote;

pub use filesystem::FilesystemJobRun;
pub use remote::BucketJobRun;

use crate::writer::{self, CacheWrite};
use async_trait::async_trait;
use jobrun_core::{Error, FetchErrors, ProwJob, Result, parse_prow_job};
use std::collections::BTreeMap;
use std::path::Path;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait JobRun: Send + Sync {
    fn job_name(&self) -> &str;

    fn job_run_id(&self) -> &str;

    /// Bucket path of the run's `prowjob.json`, once known.
    fn prow_job_path(&self) -> Option<&str>;

    /// Bucket paths of the run's junit results.
    fn junit_paths(&self) -> &[String];

    fn set_prow_job_path(&mut self, path: String);

    fn add_junit_path(&mut self, path: String);

    /// Descriptor path followed by every junit path.
    fn content_paths(&self) -> Vec<String> {
        self.prow_job_path()
            .map(str::to_string)
            .into_iter()
            .chain(self.junit_paths().iter().cloned())
            .collect()
    }

    /// Raw bytes of one bucket path.
    async fn get_content(&mut self, cancel: &CancellationToken, path: &str) -> Result<Vec<u8>>;

    /// The run's descriptor, with vendor metadata stripped.
    async fn get_prow_job(&mut self, cancel: &CancellationToken) -> Result<ProwJob> {
        let path = self
            .prow_job_path()
            .map(str::to_string)
            .ok_or_else(|| Error::MissingDescriptorPath(self.job_run_id().to_string()))?;
        let bytes = self.get_content(cancel, &path).await?;
        parse_prow_job(&bytes)
    }

    /// Content of every path of the run, keyed by bucket path.
    ///
    /// Every path is attempted; when any fail, the error names all of the
    /// failing paths and no content is returned.
    async fn get_all_content(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<String, Vec<u8>>> {
        if self.prow_job_path().is_none() {
            return Err(Error::MissingDescriptorPath(self.job_run_id().to_string()));
        }

        let mut errs = FetchErrors::new();
        let mut content = BTreeMap::new();
        for path in self.content_paths() {
            errs.attempt();
            match self.get_content(cancel, &path).await {
                Ok(bytes) => {
                    content.insert(path, bytes);
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => errs.push(path, e),
            }
        }
        errs.into_result()?;
        Ok(content)
    }

    /// Persist the run under `parent_dir`, mirroring the bucket layout.
    async fn write_cache(
        &mut self,
        cancel: &CancellationToken,
        parent_dir: &Path,
    ) -> Result<CacheWrite> {
        writer::write_cache(self, cancel, parent_dir).await
    }
}
