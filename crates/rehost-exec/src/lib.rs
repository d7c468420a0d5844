//! rehost-exec — control of the control-node service and member agents.
//!
//! ```text
//! ProcessController<R: CommandRunner>
//!   ├── status(target)  → run `<cmd> status`, match running marker
//!   ├── stop/start      → request, then poll status (5 × 10s)
//!   ├── reset_agent     → ssh `<agent> reset <server>`
//!   └── rename          → `<server> update-host-names <artifact>`
//! ```
//!
//! Member agents are reached over ssh with host-key checking disabled.

pub mod controller;
pub mod runner;

pub use controller::{ControllerConfig, PollPolicy, ProcessController, ServiceControl, ServiceTarget};
pub use runner::{CommandOutput, CommandRunner, CommandSpec, StdinMode, SystemRunner};
