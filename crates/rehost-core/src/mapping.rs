//! Old → new hostname mapping and its on-disk artifact.
//!
//! The artifact is the JSON document consumed by the control node's
//! rename command:
//!
//! ```text
//! { "<cluster>": { "<old-host>": "<new-host>", ... } }
//! ```
//!
//! A mapping is validated once at construction and is immutable after
//! that. No two entries share an old name or a new name.

use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{RehostError, RehostResult};
use crate::types::{ClusterIdentity, HostRecord};

/// Validated old → new hostname pairs for one cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameMapping {
    cluster_name: String,
    entries: Vec<HostRecord>,
}

impl RenameMapping {
    /// Pair registered and discovered hostnames by position.
    ///
    /// Both lists must have the same length. Positional pairing assumes
    /// the manager and the host table enumerate members in the same
    /// relative order; a length mismatch is the one case where that can
    /// be proven false, so it is refused rather than truncated.
    pub fn positional(
        cluster: &ClusterIdentity,
        registered: &[String],
        discovered: &[String],
    ) -> RehostResult<Self> {
        if registered.len() != discovered.len() {
            return Err(RehostError::MappingLengthMismatch {
                registered: registered.len(),
                discovered: discovered.len(),
            });
        }

        let entries = registered
            .iter()
            .zip(discovered)
            .map(|(old, new)| HostRecord::new(old.clone(), new.clone()))
            .collect();

        Self::from_records(cluster, entries)
    }

    /// Build a mapping from explicit records, rejecting duplicates.
    pub fn from_records(cluster: &ClusterIdentity, entries: Vec<HostRecord>) -> RehostResult<Self> {
        let mut old_seen = HashSet::new();
        let mut new_seen = HashSet::new();
        for record in &entries {
            if !old_seen.insert(record.old_name.as_str()) {
                return Err(RehostError::DuplicateHost(record.old_name.clone()));
            }
            if !new_seen.insert(record.new_name.as_str()) {
                return Err(RehostError::DuplicateHost(record.new_name.clone()));
            }
        }

        Ok(Self {
            cluster_name: cluster.name.clone(),
            entries,
        })
    }

    /// Check an operator-supplied mapping against what the manager reports.
    ///
    /// The mapping must be for the same cluster and must name every
    /// registered member exactly once.
    pub fn ensure_covers(
        &self,
        cluster: &ClusterIdentity,
        registered: &[String],
    ) -> RehostResult<()> {
        if self.cluster_name != cluster.name {
            return Err(RehostError::ClusterMismatch {
                expected: cluster.name.clone(),
                found: self.cluster_name.clone(),
            });
        }

        let known: HashSet<&str> = registered.iter().map(String::as_str).collect();
        if let Some(unknown) = self
            .entries
            .iter()
            .find(|r| !known.contains(r.old_name.as_str()))
        {
            return Err(RehostError::UnknownHost(unknown.old_name.clone()));
        }

        if self.entries.len() != registered.len() {
            return Err(RehostError::MappingLengthMismatch {
                registered: registered.len(),
                discovered: self.entries.len(),
            });
        }

        Ok(())
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    pub fn entries(&self) -> &[HostRecord] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// New hostnames, in mapping order.
    pub fn new_names(&self) -> Vec<String> {
        self.entries.iter().map(|r| r.new_name.clone()).collect()
    }

    /// Number of entries whose old and new names differ.
    pub fn rename_count(&self) -> usize {
        self.entries.iter().filter(|r| r.is_rename()).count()
    }

    /// Render the artifact document.
    pub fn to_artifact(&self) -> Value {
        let hosts: Map<String, Value> = self
            .entries
            .iter()
            .map(|r| (r.old_name.clone(), Value::String(r.new_name.clone())))
            .collect();

        let mut root = Map::new();
        root.insert(self.cluster_name.clone(), Value::Object(hosts));
        Value::Object(root)
    }

    /// Parse an artifact document.
    ///
    /// Exactly one cluster key is accepted. Entry order follows the
    /// document's key order as exposed by `serde_json`.
    pub fn from_artifact(doc: &Value) -> Result<Self, String> {
        let root = doc.as_object().ok_or("top level is not an object")?;
        if root.len() != 1 {
            return Err(format!("expected exactly one cluster, found {}", root.len()));
        }

        let (cluster_name, hosts) = root.iter().next().ok_or("no cluster entry")?;
        let hosts = hosts
            .as_object()
            .ok_or_else(|| format!("hosts for cluster {cluster_name:?} are not an object"))?;

        let mut entries = Vec::with_capacity(hosts.len());
        for (old, new) in hosts {
            let new = new
                .as_str()
                .ok_or_else(|| format!("new hostname for {old:?} is not a string"))?;
            entries.push(HostRecord::new(old.clone(), new));
        }

        Self::from_records(&ClusterIdentity::new(cluster_name.clone()), entries)
            .map_err(|e| e.to_string())
    }

    /// Write the artifact to `path` and flush it to disk.
    pub fn write_artifact(&self, path: &Path) -> RehostResult<()> {
        let artifact_err = |reason: String| RehostError::ArtifactIo {
            path: path.to_path_buf(),
            reason,
        };

        let body = serde_json::to_vec(&self.to_artifact()).map_err(|e| artifact_err(e.to_string()))?;
        let mut file = std::fs::File::create(path).map_err(|e| artifact_err(e.to_string()))?;
        file.write_all(&body).map_err(|e| artifact_err(e.to_string()))?;
        file.sync_all().map_err(|e| artifact_err(e.to_string()))?;

        debug!(path = %path.display(), entries = self.entries.len(), "mapping artifact written");
        Ok(())
    }

    /// Load a previously written or operator-supplied artifact.
    pub fn read_artifact(path: &Path) -> RehostResult<Self> {
        let artifact_err = |reason: String| RehostError::ArtifactIo {
            path: path.to_path_buf(),
            reason,
        };

        let content = std::fs::read_to_string(path).map_err(|e| artifact_err(e.to_string()))?;
        let doc: Value = serde_json::from_str(&content).map_err(|e| artifact_err(e.to_string()))?;
        Self::from_artifact(&doc).map_err(artifact_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn cluster() -> ClusterIdentity {
        ClusterIdentity::new("Ambari")
    }

    #[test]
    fn positional_pairs_in_order() {
        let mapping =
            RenameMapping::positional(&cluster(), &names(&["a", "b", "c"]), &names(&["x", "y", "z"]))
                .unwrap();

        let pairs: Vec<(&str, &str)> = mapping
            .entries()
            .iter()
            .map(|r| (r.old_name.as_str(), r.new_name.as_str()))
            .collect();
        assert_eq!(pairs, vec![("a", "x"), ("b", "y"), ("c", "z")]);
        assert_eq!(mapping.cluster_name(), "Ambari");
    }

    #[test]
    fn positional_refuses_length_mismatch() {
        let err = RenameMapping::positional(&cluster(), &names(&["a", "b", "c"]), &names(&["x", "y"]))
            .unwrap_err();
        assert!(matches!(
            err,
            RehostError::MappingLengthMismatch {
                registered: 3,
                discovered: 2
            }
        ));
    }

    #[test]
    fn duplicate_old_name_rejected() {
        let err = RenameMapping::positional(&cluster(), &names(&["a", "a"]), &names(&["x", "y"]))
            .unwrap_err();
        assert!(matches!(err, RehostError::DuplicateHost(h) if h == "a"));
    }

    #[test]
    fn duplicate_new_name_rejected() {
        let err = RenameMapping::positional(&cluster(), &names(&["a", "b"]), &names(&["x", "x"]))
            .unwrap_err();
        assert!(matches!(err, RehostError::DuplicateHost(h) if h == "x"));
    }

    #[test]
    fn artifact_shape_matches_rename_tool_format() {
        let mapping =
            RenameMapping::positional(&cluster(), &names(&["host-old"]), &names(&["host-new"])).unwrap();
        assert_eq!(
            mapping.to_artifact(),
            serde_json::json!({ "Ambari": { "host-old": "host-new" } })
        );
    }

    #[test]
    fn artifact_written_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts.json");
        let mapping =
            RenameMapping::positional(&cluster(), &names(&["a", "b"]), &names(&["x", "y"])).unwrap();

        mapping.write_artifact(&path).unwrap();
        let loaded = RenameMapping::read_artifact(&path).unwrap();
        assert_eq!(loaded, mapping);
    }

    #[test]
    fn artifact_with_two_clusters_rejected() {
        let doc = serde_json::json!({ "one": {}, "two": {} });
        let err = RenameMapping::from_artifact(&doc).unwrap_err();
        assert!(err.contains("exactly one cluster"));
    }

    #[test]
    fn artifact_with_non_string_host_rejected() {
        let doc = serde_json::json!({ "Ambari": { "a": 1 } });
        assert!(RenameMapping::from_artifact(&doc).is_err());
    }

    #[test]
    fn ensure_covers_accepts_full_mapping() {
        let mapping =
            RenameMapping::positional(&cluster(), &names(&["a", "b"]), &names(&["x", "y"])).unwrap();
        mapping.ensure_covers(&cluster(), &names(&["b", "a"])).unwrap();
    }

    #[test]
    fn ensure_covers_rejects_partial_mapping() {
        let mapping =
            RenameMapping::positional(&cluster(), &names(&["a"]), &names(&["x"])).unwrap();
        let err = mapping.ensure_covers(&cluster(), &names(&["a", "b"])).unwrap_err();
        assert!(matches!(err, RehostError::MappingLengthMismatch { .. }));
    }

    #[test]
    fn ensure_covers_rejects_unknown_host() {
        let mapping =
            RenameMapping::positional(&cluster(), &names(&["ghost"]), &names(&["x"])).unwrap();
        let err = mapping.ensure_covers(&cluster(), &names(&["a"])).unwrap_err();
        assert!(matches!(err, RehostError::UnknownHost(h) if h == "ghost"));
    }

    #[test]
    fn ensure_covers_rejects_other_cluster() {
        let mapping =
            RenameMapping::positional(&ClusterIdentity::new("other"), &names(&["a"]), &names(&["x"]))
                .unwrap();
        let err = mapping.ensure_covers(&cluster(), &names(&["a"])).unwrap_err();
        assert!(matches!(err, RehostError::ClusterMismatch { .. }));
    }

    #[test]
    fn rename_count_skips_unchanged_hosts() {
        let mapping =
            RenameMapping::positional(&cluster(), &names(&["a", "b"]), &names(&["a", "y"])).unwrap();
        assert_eq!(mapping.rename_count(), 1);
        assert_eq!(mapping.new_names(), names(&["a", "y"]));
    }
}
