//! Port traits (hexagonal architecture).
//!
//! The remote object store is the only external collaborator the caching
//! engine reads from. Adapters live in `jobrun-store`.

use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Stream of listed objects. An `Err` item ends the listing.
pub type ObjectStream = Pin<Box<dyn Stream<Item = Result<ObjectAttrs>> + Send>>;

/// A prefix listing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    /// Only objects whose name starts with this prefix.
    pub prefix: String,
    /// Only objects whose name sorts at or after this offset.
    #[serde(default)]
    pub start_offset: Option<String>,
}

impl ListQuery {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            start_offset: None,
        }
    }

    pub fn with_start_offset(mut self, offset: Option<String>) -> Self {
        self.start_offset = offset;
        self
    }

    /// Whether `name` falls inside this query.
    pub fn matches(&self, name: &str) -> bool {
        name.starts_with(&self.prefix)
            && self
                .start_offset
                .as_deref()
                .is_none_or(|offset| name >= offset)
    }
}

/// Attributes of a listed object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectAttrs {
    /// Full object name, `/`-separated.
    pub name: String,
    pub created: DateTime<Utc>,
}

/// Read-only remote object store (a bucket).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List objects matching the query, in lexicographic name order.
    ///
    /// Only the name and creation time of each object are requested from
    /// the backend. Owner, ACL and body are never fetched by a listing.
    async fn list(&self, query: &ListQuery) -> Result<ObjectStream>;

    /// Read an object's full body.
    async fn read(&self, name: &str) -> Result<Vec<u8>>;
}
