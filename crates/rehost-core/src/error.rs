//! Error kinds shared by every rehost crate.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for rehost operations.
pub type RehostResult<T> = Result<T, RehostError>;

/// Errors that can occur while reconciling hostnames.
#[derive(Debug, Error)]
pub enum RehostError {
    #[error("cannot read control-node config {path}: {source}")]
    ConfigUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value for {key}: {value:?}")]
    ConfigInvalid { key: String, value: String },

    #[error("invalid settings file {path}: {reason}")]
    SettingsInvalid { path: PathBuf, reason: String },

    #[error("cannot read host table {path}: {source}")]
    HostsUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("manager API unavailable: {0}")]
    ApiUnavailable(String),

    #[error("malformed manager API response: {0}")]
    ApiMalformed(String),

    #[error("control-node service could not be started: {0}")]
    ServerStartFailure(String),

    #[error("control-node service could not be restarted after rename: {0}")]
    ServerRestartFailure(String),

    #[error("{target} did not stop after {attempts} status checks")]
    StopFailed { target: String, attempts: u32 },

    #[error("{target} did not start after {attempts} status checks")]
    StartFailed { target: String, attempts: u32 },

    #[error("rename operation failed: {0}")]
    RenameFailed(String),

    #[error("cannot pair {registered} registered hosts with {discovered} discovered hosts")]
    MappingLengthMismatch { registered: usize, discovered: usize },

    #[error("duplicate hostname in mapping: {0}")]
    DuplicateHost(String),

    #[error("mapping names a host the manager does not know: {0}")]
    UnknownHost(String),

    #[error("mapping is for cluster {found:?}, manager reports {expected:?}")]
    ClusterMismatch { expected: String, found: String },

    #[error("mapping artifact {path}: {reason}")]
    ArtifactIo { path: PathBuf, reason: String },

    #[error("local hostname {host} never appeared in the host table")]
    LocalHostMissing { host: String },

    #[error("failed to run {program}: {reason}")]
    Command { program: String, reason: String },
}

impl RehostError {
    /// Whether the error was raised before any destructive action could
    /// have been taken.
    pub fn is_pre_destructive(&self) -> bool {
        matches!(
            self,
            RehostError::ConfigUnreadable { .. }
                | RehostError::ConfigInvalid { .. }
                | RehostError::SettingsInvalid { .. }
                | RehostError::HostsUnreadable { .. }
                | RehostError::ApiUnavailable(_)
                | RehostError::ApiMalformed(_)
                | RehostError::ServerStartFailure(_)
                | RehostError::MappingLengthMismatch { .. }
                | RehostError::DuplicateHost(_)
                | RehostError::UnknownHost(_)
                | RehostError::ClusterMismatch { .. }
                | RehostError::LocalHostMissing { .. }
        )
    }
}
