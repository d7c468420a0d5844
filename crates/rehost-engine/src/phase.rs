//! Reconciliation phases.

use std::fmt;

/// Where a reconciliation run is.
///
/// ```text
/// Idle → ServerEnsured → HostsRead → MappingComputed ─┬→ NoChangeNeeded
///                                                     └→ Stopping → Renaming → Restarting → Done
/// any phase ──→ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReconcilePhase {
    Idle,
    /// The control-node service is up and its API can be queried.
    ServerEnsured,
    /// Registered and discovered hostnames are both known.
    HostsRead,
    /// The mapping is built and persisted.
    MappingComputed,
    /// Discovered hostnames are already registered.
    NoChangeNeeded,
    Stopping,
    Renaming,
    Restarting,
    Done,
    Failed,
}

impl ReconcilePhase {
    /// Whether a run in this phase may already have changed cluster state.
    pub fn is_destructive(self) -> bool {
        matches!(
            self,
            ReconcilePhase::Stopping
                | ReconcilePhase::Renaming
                | ReconcilePhase::Restarting
                | ReconcilePhase::Done
        )
    }
}

impl fmt::Display for ReconcilePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReconcilePhase::Idle => "idle",
            ReconcilePhase::ServerEnsured => "server-ensured",
            ReconcilePhase::HostsRead => "hosts-read",
            ReconcilePhase::MappingComputed => "mapping-computed",
            ReconcilePhase::NoChangeNeeded => "no-change-needed",
            ReconcilePhase::Stopping => "stopping",
            ReconcilePhase::Renaming => "renaming",
            ReconcilePhase::Restarting => "restarting",
            ReconcilePhase::Done => "done",
            ReconcilePhase::Failed => "failed",
        };
        f.write_str(name)
    }
}
