//! Test infrastructure for the job run aggregator.
//!
//! Fixtures build prow descriptors and populate an in-memory bucket; the
//! helpers inspect the cache a test produced.
//!
//! # Usage
//!
//! ```ignore
//! use jobrun_tests::{BucketFixture, RunFixture};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let bucket = BucketFixture::new("job-a").with_run(RunFixture::new("1"));
//!     let store = bucket.store();
//!     // Scan or cache against `store`.
//! }
//! ```

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;

/// Initialize test logging (call once per test binary).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,jobrun_cache=debug")),
        )
        .with_test_writer()
        .try_init();
}
