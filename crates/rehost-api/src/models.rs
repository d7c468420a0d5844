//! Response shapes of the manager REST API.
//!
//! Only the fields the reconciliation reads are modelled; everything
//! else in the payload (`href`, nested links) is ignored.

use serde::Deserialize;

use rehost_core::{ClusterIdentity, RehostError, RehostResult};

#[derive(Debug, Deserialize)]
struct Collection<T> {
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ClusterItem {
    #[serde(rename = "Clusters")]
    clusters: ClusterInfo,
}

#[derive(Debug, Deserialize)]
struct ClusterInfo {
    cluster_name: String,
}

#[derive(Debug, Deserialize)]
struct HostItem {
    #[serde(rename = "Hosts")]
    hosts: HostInfo,
}

#[derive(Debug, Deserialize)]
struct HostInfo {
    host_name: String,
}

/// Parse `GET /api/v1/clusters/` and take the first cluster.
pub fn parse_cluster_name(body: &[u8]) -> RehostResult<ClusterIdentity> {
    let collection: Collection<ClusterItem> = serde_json::from_slice(body)
        .map_err(|e| RehostError::ApiMalformed(format!("clusters collection: {e}")))?;

    collection
        .items
        .into_iter()
        .next()
        .map(|item| ClusterIdentity::new(item.clusters.cluster_name))
        .ok_or_else(|| RehostError::ApiMalformed("no clusters registered".to_string()))
}

/// Parse `GET /api/v1/clusters/{name}/hosts`, keeping response order.
pub fn parse_host_names(body: &[u8]) -> RehostResult<Vec<String>> {
    let collection: Collection<HostItem> = serde_json::from_slice(body)
        .map_err(|e| RehostError::ApiMalformed(format!("hosts collection: {e}")))?;

    Ok(collection
        .items
        .into_iter()
        .map(|item| item.hosts.host_name)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_cluster_taken() {
        let body = br#"{
            "href": "http://localhost:8081/api/v1/clusters/",
            "items": [
                {"href": "...", "Clusters": {"cluster_name": "prod", "version": "HDP-2.6"}},
                {"Clusters": {"cluster_name": "other"}}
            ]
        }"#;
        assert_eq!(parse_cluster_name(body).unwrap(), ClusterIdentity::new("prod"));
    }

    #[test]
    fn empty_cluster_list_is_malformed() {
        let err = parse_cluster_name(br#"{"items": []}"#).unwrap_err();
        assert!(matches!(err, RehostError::ApiMalformed(_)));
    }

    #[test]
    fn non_json_is_malformed() {
        let err = parse_cluster_name(b"<html>Forbidden</html>").unwrap_err();
        assert!(matches!(err, RehostError::ApiMalformed(_)));
    }

    #[test]
    fn host_names_keep_api_order() {
        let body = br#"{"items": [
            {"href": "h3", "Hosts": {"cluster_name": "prod", "host_name": "c.example"}},
            {"Hosts": {"host_name": "a.example"}},
            {"Hosts": {"host_name": "b.example"}}
        ]}"#;
        assert_eq!(
            parse_host_names(body).unwrap(),
            vec!["c.example", "a.example", "b.example"]
        );
    }

    #[test]
    fn host_item_without_name_is_malformed() {
        let err = parse_host_names(br#"{"items": [{"Hosts": {}}]}"#).unwrap_err();
        assert!(matches!(err, RehostError::ApiMalformed(_)));
    }
}
