//! Outcome of a reconciliation run.

use std::fmt;

use rehost_core::{ClusterIdentity, RehostError, RenameMapping};

use crate::phase::ReconcilePhase;

/// Result of one best-effort step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResult {
    Ok,
    Failed(String),
    /// The run never reached this step.
    Skipped,
}

impl StepResult {
    pub fn from_result<T>(result: &Result<T, RehostError>) -> Self {
        match result {
            Ok(_) => StepResult::Ok,
            Err(e) => StepResult::Failed(e.to_string()),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StepResult::Failed(_))
    }
}

impl fmt::Display for StepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepResult::Ok => f.write_str("ok"),
            StepResult::Failed(reason) => write!(f, "failed ({reason})"),
            StepResult::Skipped => f.write_str("skipped"),
        }
    }
}

/// Per-member record of the agent-side steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberOutcome {
    pub host: String,
    pub stop: StepResult,
    pub reset: StepResult,
    pub start: StepResult,
}

impl MemberOutcome {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            stop: StepResult::Skipped,
            reset: StepResult::Skipped,
            start: StepResult::Skipped,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.stop.is_failed() || self.reset.is_failed() || self.start.is_failed()
    }
}

/// Everything a run did, in order.
#[derive(Debug)]
pub struct RunReport {
    pub phase: ReconcilePhase,
    pub history: Vec<ReconcilePhase>,
    pub cluster: Option<ClusterIdentity>,
    pub mapping: Option<RenameMapping>,
    pub server_stop: StepResult,
    pub rename: StepResult,
    pub server_restart: StepResult,
    pub members: Vec<MemberOutcome>,
    pub failure: Option<RehostError>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self {
            phase: ReconcilePhase::Idle,
            history: vec![ReconcilePhase::Idle],
            cluster: None,
            mapping: None,
            server_stop: StepResult::Skipped,
            rename: StepResult::Skipped,
            server_restart: StepResult::Skipped,
            members: Vec::new(),
            failure: None,
        }
    }
}

impl RunReport {
    pub(crate) fn enter(&mut self, phase: ReconcilePhase) {
        self.phase = phase;
        self.history.push(phase);
    }

    pub(crate) fn member_mut(&mut self, host: &str) -> &mut MemberOutcome {
        if let Some(idx) = self.members.iter().position(|m| m.host == host) {
            return &mut self.members[idx];
        }
        self.members.push(MemberOutcome::new(host));
        let last = self.members.len() - 1;
        &mut self.members[last]
    }

    /// Whether the run ended without a fatal error.
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Whether any service, rename, or agent action was attempted.
    pub fn took_action(&self) -> bool {
        self.history.iter().any(|p| p.is_destructive())
    }

    /// Members whose agent steps did not all succeed.
    pub fn failed_members(&self) -> Vec<&MemberOutcome> {
        self.members.iter().filter(|m| m.has_failures()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_report_is_idle_and_successful() {
        let report = RunReport::default();
        assert_eq!(report.phase, ReconcilePhase::Idle);
        assert!(report.is_success());
        assert!(!report.took_action());
    }

    #[test]
    fn member_mut_reuses_existing_entry() {
        let mut report = RunReport::default();
        report.member_mut("a").stop = StepResult::Ok;
        report.member_mut("a").start = StepResult::Failed("boom".into());

        assert_eq!(report.members.len(), 1);
        assert_eq!(report.failed_members().len(), 1);
    }
}
