//! rehost-engine — hostname reconciliation for a single control node.
//!
//! # Architecture
//!
//! ```text
//! Reconciler<S: ServiceControl, A: ManagerApi, H: HostSource>
//!   ├── ensure control-node service is up (start + verify)
//!   ├── read registered hosts (API) and discovered hosts (host table)
//!   ├── build + persist RenameMapping  ── or stop: NoChangeNeeded
//!   ├── stop control node, stop agents (concurrent, best effort)
//!   ├── settle, rename (fatal on failure)
//!   └── reset + start agents (concurrent), restart control node
//! ```
//!
//! Every run returns a `RunReport` with per-member outcomes; only
//! failures before the destructive phase, a failed rename, or a failed
//! control-node restart end the run in `Failed`.

pub mod engine;
pub mod phase;
pub mod report;

pub use engine::{EngineConfig, Pairing, Reconciler, already_reconciled, default_host_table_wait};
pub use phase::ReconcilePhase;
pub use report::{MemberOutcome, RunReport, StepResult};
