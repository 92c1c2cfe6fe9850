//! Job run discovery and local caching.
//!
//! The [`scanner`] groups a job's bucket listing into per-run records, the
//! [`jobrun`] records fetch a run's content from the bucket or from an
//! existing local cache, and the [`writer`] persists that content into a
//! directory tree mirroring the bucket layout.

pub mod builder;
pub mod index;
pub mod jobrun;
pub mod layout;
pub mod scanner;
pub mod watermark;
pub mod writer;

pub use builder::{CacheBuilder, CacheBuilderOptions, CacheSummary};
pub use index::rebuild_index;
pub use jobrun::{BucketJobRun, FilesystemJobRun, JobRun};
pub use layout::{ObjectKind, classify};
pub use scanner::{DEFAULT_RECENCY_WINDOW_HOURS, ScanError, ScanOptions, Scanner};
pub use watermark::{compare_run_ids, high_water_mark};
pub use writer::{CacheWrite, write_by_name_index, write_cache};
