//! Prow job descriptor and its codec.
//!
//! A descriptor is read as either JSON or YAML (the bucket holds
//! `prowjob.json`, the local cache holds `prowjob.yaml`) and is always
//! written back as YAML. Server-side `managedFields` are dropped on every
//! parse and never serialized.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Label whose value places a run in the by-name index.
pub const ANALYSIS_LABEL: &str = "release.openshift.io/analysis";

/// Label carrying the prow build id of a run.
pub const BUILD_ID_LABEL: &str = "prow.k8s.io/build-id";

/// A run's top-level descriptor document.
///
/// Only the metadata the engine routes on is typed; `spec`, `status` and
/// anything else are kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProwJob {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub metadata: ProwJobMetadata,
    #[serde(flatten)]
    pub rest: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProwJobMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// Vendor bookkeeping. Always `None` after [`parse_prow_job`].
    #[serde(default, skip_serializing)]
    pub managed_fields: Option<Value>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ProwJob {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.metadata.labels
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.metadata.labels.get(key).map(String::as_str)
    }

    /// Value of the analysis label, if the run takes part in the by-name index.
    pub fn analysis_label(&self) -> Option<&str> {
        self.label(ANALYSIS_LABEL)
    }

    pub fn build_id(&self) -> Option<&str> {
        self.label(BUILD_ID_LABEL)
    }
}

/// Decode a descriptor from JSON or YAML and strip `managedFields`.
pub fn parse_prow_job(bytes: &[u8]) -> Result<ProwJob> {
    let first = bytes.iter().copied().find(|b| !b.is_ascii_whitespace());
    let mut prow_job: ProwJob = match first {
        None => return Err(Error::Parse("empty document".to_string())),
        Some(b'{') => serde_json::from_slice(bytes).map_err(|e| Error::Parse(e.to_string()))?,
        Some(_) => serde_yaml::from_slice(bytes).map_err(|e| Error::Parse(e.to_string()))?,
    };
    prow_job.metadata.managed_fields = None;
    Ok(prow_job)
}

/// Encode a descriptor in the canonical on-disk form (YAML).
pub fn serialize_prow_job(prow_job: &ProwJob) -> Result<Vec<u8>> {
    Ok(serde_yaml::to_string(prow_job)?.into_bytes())
}
