//! Job Run Aggregator Core
//!
//! Shared vocabulary for the job run aggregator: the error taxonomy, the
//! remote object-store port, and the prow job descriptor codec. Adapters
//! and the caching engine build on these types.

pub mod cancel;
pub mod error;
pub mod ports;
pub mod prowjob;

pub use cancel::cancellable;
pub use error::{Error, FetchErrors, FetchFailure, Result};
pub use ports::{ListQuery, ObjectAttrs, ObjectStore, ObjectStream};
pub use prowjob::{ProwJob, ProwJobMetadata, parse_prow_job, serialize_prow_job};
