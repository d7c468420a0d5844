//! rehost-api — read-only client for the cluster manager REST API.
//!
//! Two reads are needed by the reconciliation:
//!
//! - `GET /api/v1/clusters/` → cluster name (first entry)
//! - `GET /api/v1/clusters/{name}/hosts` → registered member hostnames
//!
//! Requests carry HTTP basic auth and an `X-Requested-By` header.

pub mod client;
pub mod models;
pub mod tls;

pub use client::{ApiEndpoint, Credentials, ManagerApi, ManagerClient};
pub use tls::TlsConfig;
