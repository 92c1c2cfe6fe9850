//! CLI configuration management.

use anyhow::Context;
use chrono::TimeDelta;
use clap::ValueEnum;
use jobrun_cache::{CacheBuilderOptions, DEFAULT_RECENCY_WINDOW_HOURS, ScanOptions};
use jobrun_core::{Error, ObjectStore};
use jobrun_store::{LocalMirrorStore, S3Store, S3StoreConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const REDACTED: &str = "***";

/// Aggregator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Job whose runs are cached.
    pub job_name: String,
    /// Root of the local cache.
    pub working_dir: PathBuf,
    pub store: StoreKind,
    pub bucket: String,
    pub endpoint_url: String,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Root of the bucket mirror when `store` is `local`.
    pub mirror_dir: Option<PathBuf>,
    pub recency_window_hours: u32,
    pub resume_from_cache: bool,
    /// Cancel the command after this many seconds.
    pub timeout_secs: Option<u64>,
    pub log_format: LogFormat,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            job_name: String::new(),
            working_dir: PathBuf::from("job-aggregator-working-dir"),
            store: StoreKind::default(),
            bucket: "origin-ci-test".to_string(),
            endpoint_url: "https://storage.googleapis.com".to_string(),
            region: "auto".to_string(),
            access_key_id: None,
            secret_access_key: None,
            mirror_dir: None,
            recency_window_hours: DEFAULT_RECENCY_WINDOW_HOURS as u32,
            resume_from_cache: false,
            timeout_secs: None,
            log_format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// S3-compatible bucket (GCS interoperability endpoint by default).
    #[default]
    S3,
    /// Local directory mirroring the bucket.
    Local,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl AggregatorConfig {
    /// Load configuration from `explicit`, or from the per-user config file
    /// when it exists. Falls back to defaults.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match Self::config_path() {
                Ok(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };
        Self::from_file(&path)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Get the configuration file path.
    pub fn config_path() -> anyhow::Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("io", "openshift", "job-run-aggregator")
            .context("could not determine config directory")?;
        Ok(dirs.config_dir().join("config.yaml"))
    }

    pub fn validate(&self) -> jobrun_core::Result<()> {
        if self.job_name.trim().is_empty() {
            return Err(Error::Config("job name must not be empty".to_string()));
        }
        if self.recency_window_hours == 0 {
            return Err(Error::Config(
                "recency_window_hours must be greater than zero".to_string(),
            ));
        }
        match self.store {
            StoreKind::S3 => {
                if self.access_key_id.is_none() || self.secret_access_key.is_none() {
                    return Err(Error::Config(
                        "s3 store requires access_key_id and secret_access_key".to_string(),
                    ));
                }
            }
            StoreKind::Local => {
                if self.mirror_dir.is_none() {
                    return Err(Error::Config("local store requires mirror_dir".to_string()));
                }
            }
        }
        Ok(())
    }

    /// Copy with secrets masked, for display.
    pub fn redacted(&self) -> Self {
        let mask = |secret: &Option<String>| secret.as_ref().map(|_| REDACTED.to_string());
        Self {
            access_key_id: mask(&self.access_key_id),
            secret_access_key: mask(&self.secret_access_key),
            ..self.clone()
        }
    }

    pub fn object_store(&self) -> jobrun_core::Result<Arc<dyn ObjectStore>> {
        match self.store {
            StoreKind::S3 => {
                let (Some(access_key_id), Some(secret_access_key)) =
                    (&self.access_key_id, &self.secret_access_key)
                else {
                    return Err(Error::Config("missing s3 credentials".to_string()));
                };
                Ok(Arc::new(S3Store::from_config(&S3StoreConfig {
                    bucket: self.bucket.clone(),
                    endpoint_url: Some(self.endpoint_url.clone()),
                    region: self.region.clone(),
                    access_key_id: access_key_id.clone(),
                    secret_access_key: secret_access_key.clone(),
                })))
            }
            StoreKind::Local => {
                let root = self
                    .mirror_dir
                    .clone()
                    .ok_or_else(|| Error::Config("missing mirror_dir".to_string()))?;
                Ok(Arc::new(LocalMirrorStore::new(root)))
            }
        }
    }

    pub fn builder_options(&self) -> CacheBuilderOptions {
        CacheBuilderOptions {
            job_name: self.job_name.clone(),
            working_dir: self.working_dir.clone(),
            scan: ScanOptions {
                recency_window: TimeDelta::hours(i64::from(self.recency_window_hours)),
                ..ScanOptions::default()
            },
            resume_from_cache: self.resume_from_cache,
        }
    }
}
