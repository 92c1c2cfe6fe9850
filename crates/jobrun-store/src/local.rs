//! Local directory mirroring a bucket.
//!
//! Object names are paths relative to the mirror root and an object's
//! creation time is the file's modification time, which is what
//! `gsutil rsync` preserves.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream;
use jobrun_core::{Error, ListQuery, ObjectAttrs, ObjectStore, ObjectStream, Result};
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

pub struct LocalMirrorStore {
    root: PathBuf,
}

impl LocalMirrorStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, name: &str) -> Result<PathBuf> {
        let relative = Path::new(name);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(Error::Fetch {
                path: name.to_string(),
                message: "object name is not a plain relative path".to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

/// Directory holding every object that can match `prefix`.
fn walk_root(root: &Path, prefix: &str) -> PathBuf {
    match prefix.rfind('/') {
        Some(idx) => root.join(&prefix[..idx]),
        None => root.to_path_buf(),
    }
}

fn object_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<&str> = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    Some(parts.join("/"))
}

fn scan_mirror(root: &Path, query: &ListQuery) -> Vec<Result<ObjectAttrs>> {
    let start = walk_root(root, &query.prefix);
    if !start.exists() {
        return vec![];
    }

    let mut items = vec![];
    for entry in WalkDir::new(&start).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                items.push(Err(Error::Listing {
                    prefix: query.prefix.clone(),
                    message: e.to_string(),
                }));
                break;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = object_name(root, entry.path()) else {
            debug!(path = %entry.path().display(), "Skipping non UTF-8 path");
            continue;
        };
        if !query.matches(&name) {
            continue;
        }
        let created = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(Utc::now);
        items.push(Ok(ObjectAttrs { name, created }));
    }

    // Walk order is per directory; listings are ordered by full name.
    items.sort_by(|a, b| match (a, b) {
        (Ok(a), Ok(b)) => a.name.cmp(&b.name),
        (Ok(_), Err(_)) => std::cmp::Ordering::Less,
        (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
        (Err(_), Err(_)) => std::cmp::Ordering::Equal,
    });
    items
}

#[async_trait]
impl ObjectStore for LocalMirrorStore {
    async fn list(&self, query: &ListQuery) -> Result<ObjectStream> {
        let root = self.root.clone();
        let query = query.clone();
        let items = tokio::task::spawn_blocking(move || scan_mirror(&root, &query))
            .await
            .map_err(|e| Error::Internal(format!("Mirror listing task failed: {}", e)))?;
        Ok(Box::pin(stream::iter(items)))
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.object_path(name)?;
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::ObjectNotFound(name.to_string()),
            _ => Error::Fetch {
                path: name.to_string(),
                message: e.to_string(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn write(root: &Path, name: &str, body: &str) {
        let path = root.join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    #[tokio::test]
    async fn test_list_mirror_by_prefix() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "logs/job-a/2/prowjob.json", "{}");
        write(dir.path(), "logs/job-a/1/artifacts/junit/x.xml", "<x/>");
        write(dir.path(), "logs/job-a/1/prowjob.json", "{}");
        write(dir.path(), "logs/job-ab/1/prowjob.json", "{}");

        let store = LocalMirrorStore::new(dir.path());
        let names: Vec<String> = store
            .list(&ListQuery::new("logs/job-a/"))
            .await
            .unwrap()
            .map(|item| item.unwrap().name)
            .collect()
            .await;

        assert_eq!(
            names,
            vec![
                "logs/job-a/1/artifacts/junit/x.xml",
                "logs/job-a/1/prowjob.json",
                "logs/job-a/2/prowjob.json",
            ]
        );
    }

    #[tokio::test]
    async fn test_list_missing_prefix_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMirrorStore::new(dir.path());
        let count = store
            .list(&ListQuery::new("logs/nothing/"))
            .await
            .unwrap()
            .count()
            .await;
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_read_object() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "logs/job-a/1/prowjob.json", "{\"kind\":\"ProwJob\"}");
        let store = LocalMirrorStore::new(dir.path());

        let body = store.read("logs/job-a/1/prowjob.json").await.unwrap();
        assert_eq!(body, b"{\"kind\":\"ProwJob\"}");
        assert!(matches!(
            store.read("logs/job-a/9/prowjob.json").await,
            Err(Error::ObjectNotFound(_))
        ));
        assert!(matches!(
            store.read("../etc/passwd").await,
            Err(Error::Fetch { .. })
        ));
    }
}
