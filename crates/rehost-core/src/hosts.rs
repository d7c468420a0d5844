//! Host discovery from the local hostname-resolution table.
//!
//! A line counts as a member entry when it is not a comment, contains
//! none of the ignore markers (loopback, IPv6 multicast and internal
//! registration aliases), and has at least two whitespace-separated fields. The
//! second field is the member's canonical hostname.

use std::path::PathBuf;

use tracing::debug;

use crate::error::{RehostError, RehostResult};

/// Markers that exclude a line from discovery.
pub const DEFAULT_IGNORE_MARKERS: &[&str] = &["localhost", "ip6-", "rhn"];

/// Source of the hostnames machines currently answer to.
pub trait HostSource {
    /// Current member hostnames, in table order.
    fn current_hostnames(&self) -> RehostResult<Vec<String>>;

    /// This machine's own hostname.
    fn local_hostname(&self) -> RehostResult<String>;
}

/// Extract member hostnames from host table text.
pub fn parse_hosts_table(content: &str, ignore_markers: &[String]) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.split('#').next().unwrap_or_default();
            if ignore_markers.iter().any(|m| line.contains(m.as_str())) {
                return None;
            }
            let mut fields = line.split_whitespace();
            let _address = fields.next()?;
            fields.next().map(str::to_string)
        })
        .collect()
}

/// The host table on disk, typically `/etc/hosts`.
#[derive(Debug, Clone)]
pub struct HostsFile {
    path: PathBuf,
    ignore_markers: Vec<String>,
}

impl HostsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ignore_markers: DEFAULT_IGNORE_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }

    pub fn with_ignore_markers(mut self, markers: Vec<String>) -> Self {
        self.ignore_markers = markers;
        self
    }
}

impl HostSource for HostsFile {
    fn current_hostnames(&self) -> RehostResult<Vec<String>> {
        let content =
            std::fs::read_to_string(&self.path).map_err(|source| RehostError::HostsUnreadable {
                path: self.path.clone(),
                source,
            })?;
        let hosts = parse_hosts_table(&content, &self.ignore_markers);
        debug!(path = %self.path.display(), count = hosts.len(), "read host table");
        Ok(hosts)
    }

    fn local_hostname(&self) -> RehostResult<String> {
        hostname::get()
            .map_err(|e| RehostError::Command {
                program: "gethostname".to_string(),
                reason: e.to_string(),
            })?
            .into_string()
            .map_err(|raw| RehostError::Command {
                program: "gethostname".to_string(),
                reason: format!("hostname is not valid UTF-8: {raw:?}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markers() -> Vec<String> {
        DEFAULT_IGNORE_MARKERS.iter().map(|m| m.to_string()).collect()
    }

    const TABLE: &str = "\
127.0.0.1   localhost localhost.localdomain
::1         localhost6
10.0.0.5    rhn.internal.example rhn
# 10.0.0.9  commented.example
10.0.0.11   node1.example.com node1
10.0.0.12   node2.example.com   # trailing comment
10.0.0.13
10.0.0.14\tnode3.example.com
";

    #[test]
    fn keeps_member_lines_in_order() {
        let hosts = parse_hosts_table(TABLE, &markers());
        assert_eq!(
            hosts,
            vec!["node1.example.com", "node2.example.com", "node3.example.com"]
        );
    }

    #[test]
    fn debian_ipv6_aliases_skipped() {
        let table = "\
127.0.0.1\tlocalhost
10.0.0.2\tctl.example
10.0.0.3\tnode1.example
::1     localhost ip6-localhost ip6-loopback
ff02::1 ip6-allnodes
ff02::2 ip6-allrouters
";
        assert_eq!(
            parse_hosts_table(table, &markers()),
            vec!["ctl.example", "node1.example"]
        );
    }

    #[test]
    fn single_field_lines_skipped() {
        assert!(parse_hosts_table("10.0.0.13\n", &markers()).is_empty());
    }

    #[test]
    fn custom_markers_apply() {
        let hosts = parse_hosts_table(TABLE, &["node2".to_string()]);
        assert!(!hosts.contains(&"node2.example.com".to_string()));
        assert!(hosts.contains(&"localhost".to_string()));
    }

    #[test]
    fn reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts");
        std::fs::write(&path, TABLE).unwrap();

        let hosts = HostsFile::new(&path).current_hostnames().unwrap();
        assert_eq!(hosts.len(), 3);
    }

    #[test]
    fn missing_file_reported() {
        let err = HostsFile::new("/nonexistent/hosts").current_hostnames().unwrap_err();
        assert!(matches!(err, RehostError::HostsUnreadable { .. }));
    }
}
