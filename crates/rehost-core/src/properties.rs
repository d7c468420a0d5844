//! Control-node configuration reader.
//!
//! Reads the `key=value` properties file of the control-node service to
//! find where its REST API listens. Missing keys fall back to defaults;
//! only an unreadable file or an unparseable port is an error.

use std::path::Path;

use serde::Serialize;

use crate::error::{RehostError, RehostResult};
use crate::types::Protocol;

pub const DEFAULT_API_PORT: u16 = 8081;

const KEY_API_PORT: &str = "client.api.port";
const KEY_SSL_PORT: &str = "client.api.ssl.port";
const KEY_API_SSL: &str = "api.ssl";

/// Where the manager REST API listens, as configured on the control node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServerProperties {
    pub api_port: u16,
    pub ssl_port: Option<u16>,
    pub protocol: Protocol,
}

impl Default for ServerProperties {
    fn default() -> Self {
        Self {
            api_port: DEFAULT_API_PORT,
            ssl_port: None,
            protocol: Protocol::Http,
        }
    }
}

impl ServerProperties {
    /// Port to connect to: the SSL port when TLS is on and one is set.
    pub fn effective_port(&self) -> u16 {
        match (self.protocol, self.ssl_port) {
            (Protocol::Https, Some(port)) => port,
            _ => self.api_port,
        }
    }
}

/// Parse properties text.
pub fn parse_server_properties(content: &str) -> RehostResult<ServerProperties> {
    let mut props = ServerProperties::default();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());

        match key {
            KEY_API_PORT => props.api_port = parse_port(key, value)?,
            KEY_SSL_PORT => props.ssl_port = Some(parse_port(key, value)?),
            KEY_API_SSL => {
                props.protocol = if value == "true" {
                    Protocol::Https
                } else {
                    Protocol::Http
                };
            }
            _ => {}
        }
    }

    Ok(props)
}

/// Read and parse the properties file at `path`.
pub fn read_server_properties(path: &Path) -> RehostResult<ServerProperties> {
    let content = std::fs::read_to_string(path).map_err(|source| RehostError::ConfigUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    parse_server_properties(&content)
}

fn parse_port(key: &str, value: &str) -> RehostResult<u16> {
    value.parse::<u16>().map_err(|_| RehostError::ConfigInvalid {
        key: key.to_string(),
        value: value.to_string(),
    })
}
