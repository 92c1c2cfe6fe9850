//! S3-compatible bucket store.
//!
//! Works against AWS S3 and against GCS through its interoperability
//! endpoint (`https://storage.googleapis.com`) with HMAC keys.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::types::Object;
use chrono::{DateTime, Utc};
use futures::{StreamExt, stream};
use jobrun_core::{Error, ListQuery, ObjectAttrs, ObjectStore, ObjectStream, Result};
use tracing::debug;

/// Connection settings for an S3-compatible bucket.
#[derive(Debug, Clone)]
pub struct S3StoreConfig {
    pub bucket: String,
    pub endpoint_url: Option<String>,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn from_config(config: &S3StoreConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            "job-run-aggregator",
        );
        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(true);
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint.clone());
        }
        Self::new(Client::from_conf(builder.build()), config.bucket.clone())
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

fn object_attrs(object: &Object) -> Option<ObjectAttrs> {
    let name = object.key()?.to_string();
    let modified = object.last_modified()?;
    let created = DateTime::<Utc>::from_timestamp(modified.secs(), modified.subsec_nanos())?;
    Some(ObjectAttrs { name, created })
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list(&self, query: &ListQuery) -> Result<ObjectStream> {
        // ListObjectsV2 returns key, size, etag and timestamp; owner stays off.
        let mut request = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&query.prefix)
            .fetch_owner(false);
        if let Some(offset) = &query.start_offset {
            // start_after is exclusive; offsets name run directories, never objects.
            request = request.start_after(offset);
        }
        debug!(bucket = %self.bucket, prefix = %query.prefix, "Listing objects");

        let pages = request.into_paginator().send();
        let filter = query.clone();
        let objects = stream::unfold(pages, |mut pages| async move {
            pages.next().await.map(|page| (page, pages))
        })
        .flat_map(move |page| {
            let items: Vec<Result<ObjectAttrs>> = match page {
                Ok(output) => output
                    .contents()
                    .iter()
                    .filter_map(object_attrs)
                    .filter(|attrs| filter.matches(&attrs.name))
                    .map(Ok)
                    .collect(),
                Err(e) => vec![Err(Error::Listing {
                    prefix: filter.prefix.clone(),
                    message: DisplayErrorContext(&e).to_string(),
                })],
            };
            stream::iter(items)
        });

        Ok(Box::pin(objects))
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(name)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    Error::ObjectNotFound(name.to_string())
                } else {
                    Error::Fetch {
                        path: name.to_string(),
                        message: DisplayErrorContext(&e).to_string(),
                    }
                }
            })?;

        let body = output.body.collect().await.map_err(|e| Error::Fetch {
            path: name.to_string(),
            message: e.to_string(),
        })?;
        Ok(body.into_bytes().to_vec())
    }
}
