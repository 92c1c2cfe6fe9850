//! CLI command definitions.

use crate::config::{AggregatorConfig, StoreKind};
use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Cache recent runs of a job from the bucket into the working directory
    Cache {
        #[command(flatten)]
        job: JobArgs,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Rebuild the by-name index from an existing cache
    Index {
        #[command(flatten)]
        job: JobArgs,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Which job and where its cache lives.
#[derive(Args, Debug, Default)]
pub struct JobArgs {
    /// Job name, as it appears under logs/ in the bucket
    #[arg(short, long = "job")]
    pub job_name: Option<String>,

    /// Root of the local cache
    #[arg(short, long)]
    pub working_dir: Option<PathBuf>,
}

/// Where runs are read from and how far back.
#[derive(Args, Debug, Default)]
pub struct SourceArgs {
    /// Object store backend
    #[arg(long, value_enum)]
    pub store: Option<StoreKind>,

    /// Bucket name
    #[arg(long)]
    pub bucket: Option<String>,

    /// S3-compatible endpoint
    #[arg(long)]
    pub endpoint_url: Option<String>,

    /// Local bucket mirror (with --store local)
    #[arg(long)]
    pub mirror_dir: Option<PathBuf>,

    /// Only consider objects created within this many hours
    #[arg(long)]
    pub recency_window_hours: Option<u32>,

    /// Start listing at the newest run already cached
    #[arg(long)]
    pub resume: bool,

    /// Give up after this many seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,
}

impl JobArgs {
    pub fn apply(self, config: &mut AggregatorConfig) {
        if let Some(job_name) = self.job_name {
            config.job_name = job_name;
        }
        if let Some(working_dir) = self.working_dir {
            config.working_dir = working_dir;
        }
    }
}

impl SourceArgs {
    pub fn apply(self, config: &mut AggregatorConfig) {
        if let Some(store) = self.store {
            config.store = store;
        }
        if let Some(bucket) = self.bucket {
            config.bucket = bucket;
        }
        if let Some(endpoint_url) = self.endpoint_url {
            config.endpoint_url = endpoint_url;
        }
        if let Some(mirror_dir) = self.mirror_dir {
            config.mirror_dir = Some(mirror_dir);
        }
        if let Some(hours) = self.recency_window_hours {
            config.recency_window_hours = hours;
        }
        if self.resume {
            config.resume_from_cache = true;
        }
        if let Some(timeout_secs) = self.timeout_secs {
            config.timeout_secs = Some(timeout_secs);
        }
    }
}
