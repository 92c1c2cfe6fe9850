//! In-memory object store.
//!
//! Holds objects in a sorted map and records how it is used (listing
//! queries, reads per object) so callers can assert on remote traffic.
//! Failures can be injected per object and part-way through a listing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream;
use jobrun_core::{Error, ListQuery, ObjectAttrs, ObjectStore, ObjectStream, Result};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Default)]
struct Inner {
    objects: BTreeMap<String, (Vec<u8>, DateTime<Utc>)>,
    reads: HashMap<String, usize>,
    failing_reads: HashSet<String>,
    fail_listing_after: Option<usize>,
    read_delay: Option<Duration>,
    queries: Vec<ListQuery>,
}

/// Cloneable handle to a shared in-memory bucket.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store an object created at `created`.
    pub fn insert(&self, name: impl Into<String>, body: impl Into<Vec<u8>>, created: DateTime<Utc>) {
        self.lock().objects.insert(name.into(), (body.into(), created));
    }

    /// Make every read of `name` fail.
    pub fn fail_reads_of(&self, name: impl Into<String>) {
        self.lock().failing_reads.insert(name.into());
    }

    /// Make listings fail after yielding `count` objects.
    pub fn fail_listing_after(&self, count: usize) {
        self.lock().fail_listing_after = Some(count);
    }

    /// Delay every read, so in-flight reads can be cancelled.
    pub fn set_read_delay(&self, delay: Duration) {
        self.lock().read_delay = Some(delay);
    }

    /// Number of reads attempted for `name`.
    pub fn read_count(&self, name: &str) -> usize {
        self.lock().reads.get(name).copied().unwrap_or(0)
    }

    /// Total reads across all objects.
    pub fn total_reads(&self) -> usize {
        self.lock().reads.values().sum()
    }

    /// Every listing query received, oldest first.
    pub fn queries(&self) -> Vec<ListQuery> {
        self.lock().queries.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().objects.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list(&self, query: &ListQuery) -> Result<ObjectStream> {
        let mut inner = self.lock();
        inner.queries.push(query.clone());

        let mut items: Vec<Result<ObjectAttrs>> = inner
            .objects
            .iter()
            .filter(|(name, _)| query.matches(name))
            .map(|(name, (_, created))| {
                Ok(ObjectAttrs {
                    name: name.clone(),
                    created: *created,
                })
            })
            .collect();

        if let Some(count) = inner.fail_listing_after
            && count <= items.len()
        {
            items.truncate(count);
            items.push(Err(Error::Listing {
                prefix: query.prefix.clone(),
                message: "injected listing failure".to_string(),
            }));
        }

        Ok(Box::pin(stream::iter(items)))
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>> {
        let delay = {
            let mut inner = self.lock();
            *inner.reads.entry(name.to_string()).or_insert(0) += 1;
            inner.read_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let inner = self.lock();
        if inner.failing_reads.contains(name) {
            return Err(Error::Fetch {
                path: name.to_string(),
                message: "injected read failure".to_string(),
            });
        }
        inner
            .objects
            .get(name)
            .map(|(body, _)| body.clone())
            .ok_or_else(|| Error::ObjectNotFound(name.to_string()))
    }
}
