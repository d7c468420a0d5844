//! rehost-core — shared types and local readers for hostname reconciliation.
//!
//! # Components
//!
//! - **`types`** — cluster identity, host records, service status
//! - **`mapping`** — validated old → new mapping and its JSON artifact
//! - **`properties`** — control-node properties reader (API port, protocol)
//! - **`hosts`** — member discovery from the host table
//! - **`settings`** — `rehost.toml` run settings
//! - **`error`** — error kinds shared by every crate

pub mod error;
pub mod hosts;
pub mod mapping;
pub mod properties;
pub mod settings;
pub mod types;

pub use error::{RehostError, RehostResult};
pub use hosts::{HostSource, HostsFile};
pub use mapping::RenameMapping;
pub use properties::{ServerProperties, read_server_properties};
pub use settings::Settings;
pub use types::*;
