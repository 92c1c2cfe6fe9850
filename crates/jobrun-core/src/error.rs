//! Error types for the job run aggregator.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Listing errors
    #[error("Listing failed under {prefix}: {message}")]
    Listing { prefix: String, message: String },

    // Retrieval errors
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Failed to fetch {path}: {message}")]
    Fetch { path: String, message: String },

    #[error(transparent)]
    FetchAggregate(FetchErrors),

    #[error("Job run {0} has no prowjob path")]
    MissingDescriptorPath(String),

    #[error("Missing content path")]
    MissingPath,

    // Descriptor errors
    #[error("Failed to parse prowjob: {0}")]
    Parse(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // Local cache errors
    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error came from a fired cancellation signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// A single path that could not be fetched.
#[derive(Debug)]
pub struct FetchFailure {
    pub path: String,
    pub error: Error,
}

/// Every fetch failure from one content sweep, in the order the paths were
/// attempted.
#[derive(Debug, Default)]
pub struct FetchErrors {
    failures: Vec<FetchFailure>,
    attempted: usize,
}

impl FetchErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a path was attempted, successfully or not.
    pub fn attempt(&mut self) {
        self.attempted += 1;
    }

    pub fn push(&mut self, path: impl Into<String>, error: Error) {
        self.failures.push(FetchFailure {
            path: path.into(),
            error,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn failures(&self) -> &[FetchFailure] {
        &self.failures
    }

    /// The failing paths, in attempt order.
    pub fn paths(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.path.as_str()).collect()
    }

    /// `Ok(())` when nothing failed, otherwise the collected failures as one error.
    pub fn into_result(self) -> Result<()> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(Error::FetchAggregate(self))
        }
    }
}

impl fmt::Display for FetchErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to fetch {} of {} paths: [",
            self.failures.len(),
            self.attempted.max(self.failures.len())
        )?;
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", failure.path, failure.error)?;
        }
        f.write_str("]")
    }
}

impl std::error::Error for FetchErrors {}
