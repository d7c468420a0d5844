//! Authenticated reads against the manager REST API.
//!
//! One HTTP/1.1 connection per request, driven by hyper directly over a
//! tokio `TcpStream` (wrapped in rustls for `https`).

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use http_body_util::BodyExt;
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, info};

use rehost_core::{ClusterIdentity, Protocol, RehostError, RehostResult, ServerProperties};

use crate::models::{parse_cluster_name, parse_host_names};
use crate::tls::TlsConfig;

const USER_AGENT: &str = "rehost/0.1";

/// Read operations the reconciliation engine needs from the manager.
#[allow(async_fn_in_trait)]
pub trait ManagerApi {
    /// Name of the (first) cluster the manager administers.
    async fn fetch_cluster_name(&self) -> RehostResult<ClusterIdentity>;

    /// Registered member hostnames, in the order the API lists them.
    async fn fetch_member_hostnames(&self, cluster: &ClusterIdentity) -> RehostResult<Vec<String>>;
}

/// Where the API listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoint {
    pub protocol: Protocol,
    pub host: String,
    pub port: u16,
}

impl ApiEndpoint {
    pub fn from_properties(host: impl Into<String>, props: &ServerProperties) -> Self {
        Self {
            protocol: props.protocol,
            host: host.into(),
            port: props.effective_port(),
        }
    }

    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}://{}{path}", self.protocol, self.authority())
    }
}

/// Username/password for HTTP basic auth.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    fn header_value(&self) -> String {
        let token = STANDARD.encode(format!("{}:{}", self.username, self.password));
        format!("Basic {token}")
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Client for the manager REST API.
#[derive(Debug, Clone)]
pub struct ManagerClient {
    endpoint: ApiEndpoint,
    credentials: Credentials,
    requested_by: String,
    tls: Option<TlsConfig>,
    timeout: Duration,
}

impl ManagerClient {
    pub fn new(endpoint: ApiEndpoint, credentials: Credentials, requested_by: impl Into<String>) -> Self {
        Self {
            endpoint,
            credentials,
            requested_by: requested_by.into(),
            tls: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// TLS settings used when the endpoint protocol is `https`.
    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &ApiEndpoint {
        &self.endpoint
    }

    /// GET `path` and return the body of a 2xx response.
    pub async fn get(&self, path: &str) -> RehostResult<Bytes> {
        let url = self.endpoint.url(path);
        debug!(%url, "manager API request");

        match tokio::time::timeout(self.timeout, self.get_inner(path)).await {
            Ok(result) => result,
            Err(_) => Err(RehostError::ApiUnavailable(format!(
                "GET {url} timed out after {:?}",
                self.timeout
            ))),
        }
    }

    async fn get_inner(&self, path: &str) -> RehostResult<Bytes> {
        let url = self.endpoint.url(path);

        let stream = TcpStream::connect(self.endpoint.authority())
            .await
            .map_err(|e| unavailable(&url, "connect", e))?;

        match self.endpoint.protocol {
            Protocol::Http => self.send(TokioIo::new(stream), path).await,
            Protocol::Https => {
                let tls = match &self.tls {
                    Some(tls) => tls.clone(),
                    None => TlsConfig::with_webpki_roots()?,
                };
                let server_name = ServerName::try_from(self.endpoint.host.clone())
                    .map_err(|e| unavailable(&url, "server name", e))?;
                let stream = TlsConnector::from(tls.client_config)
                    .connect(server_name, stream)
                    .await
                    .map_err(|e| unavailable(&url, "tls handshake", e))?;
                self.send(TokioIo::new(stream), path).await
            }
        }
    }

    async fn send<T>(&self, io: T, path: &str) -> RehostResult<Bytes>
    where
        T: hyper::rt::Read + hyper::rt::Write + Unpin + Send + 'static,
    {
        let url = self.endpoint.url(path);

        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| unavailable(&url, "handshake", e))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = http::Request::builder()
            .method(http::Method::GET)
            .uri(path)
            .header(http::header::HOST, self.endpoint.authority())
            .header(http::header::USER_AGENT, USER_AGENT)
            .header(http::header::ACCEPT, "application/json")
            .header(http::header::AUTHORIZATION, self.credentials.header_value())
            .header("X-Requested-By", &self.requested_by)
            .body(http_body_util::Empty::<Bytes>::new())
            .map_err(|e| unavailable(&url, "request", e))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| unavailable(&url, "request", e))?;

        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| unavailable(&url, "body", e))?
            .to_bytes();

        if !status.is_success() {
            return Err(RehostError::ApiUnavailable(format!("GET {url} returned {status}")));
        }
        Ok(body)
    }
}

fn unavailable(url: &str, stage: &str, e: impl std::fmt::Display) -> RehostError {
    RehostError::ApiUnavailable(format!("GET {url}: {stage}: {e}"))
}

impl ManagerApi for ManagerClient {
    async fn fetch_cluster_name(&self) -> RehostResult<ClusterIdentity> {
        let body = self.get("/api/v1/clusters/").await?;
        let cluster = parse_cluster_name(&body)?;
        info!(cluster = %cluster, "cluster identified");
        Ok(cluster)
    }

    async fn fetch_member_hostnames(&self, cluster: &ClusterIdentity) -> RehostResult<Vec<String>> {
        let body = self
            .get(&format!("/api/v1/clusters/{}/hosts", cluster.name))
            .await?;
        let hosts = parse_host_names(&body)?;
        info!(cluster = %cluster, count = hosts.len(), "registered hosts read");
        Ok(hosts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_uses_effective_port() {
        let props = ServerProperties {
            api_port: 8080,
            ssl_port: Some(8443),
            protocol: Protocol::Https,
        };
        let endpoint = ApiEndpoint::from_properties("localhost", &props);
        assert_eq!(endpoint.url("/api/v1/clusters/"), "https://localhost:8443/api/v1/clusters/");
    }

    #[test]
    fn basic_auth_header() {
        let creds = Credentials::new("admin", "admin");
        assert_eq!(creds.header_value(), "Basic YWRtaW46YWRtaW4=");
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let creds = Credentials::new("admin", "hunter2");
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}
