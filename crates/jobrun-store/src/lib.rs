//! Object store adapters for the job run aggregator.
//!
//! Each adapter implements [`jobrun_core::ObjectStore`]: an S3-compatible
//! bucket (GCS through its interoperability endpoint), a local directory
//! mirroring a bucket, and an in-memory store used by tests.

pub mod local;
pub mod memory;
pub mod s3;

pub use local::LocalMirrorStore;
pub use memory::MemoryStore;
pub use s3::{S3Store, S3StoreConfig};
