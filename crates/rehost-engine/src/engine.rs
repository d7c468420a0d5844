//! Reconciliation engine — drives stop → rename → restart.
//!
//! A run is strictly sequential on the control node. Agent operations
//! fan out across members concurrently; each member's own
//! stop → reset → start sequence stays ordered. Nothing destructive
//! happens until the mapping has been validated and written to disk.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use futures_util::future::join_all;
use tracing::{debug, error, info, warn};

use rehost_api::ManagerApi;
use rehost_core::{ClusterIdentity, HostSource, RehostError, RehostResult, RenameMapping};
use rehost_exec::{PollPolicy, ServiceControl, ServiceTarget};

use crate::phase::ReconcilePhase;
use crate::report::{RunReport, StepResult};

/// How old and new hostnames are paired.
#[derive(Debug, Clone)]
pub enum Pairing {
    /// `registered[i] ↔ discovered[i]`.
    Positional,
    /// A mapping supplied by the operator.
    Explicit(RenameMapping),
}

/// Resolved inputs for one run.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub artifact_path: PathBuf,
    /// Pause between stopping services and renaming.
    pub settle: Duration,
    /// Answer the rename command's prompts automatically.
    pub auto_confirm: bool,
    /// Stop after the mapping is written.
    pub dry_run: bool,
    pub pairing: Pairing,
    /// Wait for this machine's hostname to show up in the host table
    /// before reading it.
    pub await_local_host: Option<PollPolicy>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            artifact_path: PathBuf::from("/tmp/newAmbariHosts.json"),
            settle: Duration::from_secs(30),
            auto_confirm: true,
            dry_run: false,
            pairing: Pairing::Positional,
            await_local_host: None,
        }
    }
}

/// Polling used by `await_local_host` when enabled from the CLI.
pub fn default_host_table_wait() -> PollPolicy {
    PollPolicy {
        attempts: 24,
        interval: Duration::from_secs(5),
    }
}

/// Whether every discovered hostname is already registered.
pub fn already_reconciled(registered: &[String], discovered: &[String]) -> bool {
    let registered: HashSet<&str> = registered.iter().map(String::as_str).collect();
    discovered.iter().all(|h| registered.contains(h.as_str()))
}

/// Drives a single reconciliation run.
pub struct Reconciler<S, A, H> {
    control: S,
    api: A,
    hosts: H,
    config: EngineConfig,
    report: RunReport,
}

impl<S, A, H> Reconciler<S, A, H>
where
    S: ServiceControl,
    A: ManagerApi,
    H: HostSource,
{
    pub fn new(control: S, api: A, hosts: H, config: EngineConfig) -> Self {
        Self {
            control,
            api,
            hosts,
            config,
            report: RunReport::default(),
        }
    }

    /// Run to a terminal phase and return what happened.
    pub async fn run(mut self) -> RunReport {
        if let Err(e) = self.drive().await {
            error!(phase = %self.report.phase, error = %e, "reconciliation failed");
            self.report.enter(ReconcilePhase::Failed);
            self.report.failure = Some(e);
        }
        self.report
    }

    fn enter(&mut self, phase: ReconcilePhase) {
        info!(%phase, "entering phase");
        self.report.enter(phase);
    }

    async fn drive(&mut self) -> RehostResult<()> {
        self.await_local_host().await?;
        self.ensure_server().await?;

        let cluster = self.api.fetch_cluster_name().await?;
        self.report.cluster = Some(cluster.clone());
        let registered = self.api.fetch_member_hostnames(&cluster).await?;
        let discovered = self.hosts.current_hostnames()?;
        debug!(?registered, ?discovered, "hostnames read");
        self.enter(ReconcilePhase::HostsRead);

        let Some(mapping) = self.compute_mapping(&cluster, &registered, &discovered)? else {
            info!("no hostname change is needed");
            self.enter(ReconcilePhase::NoChangeNeeded);
            return Ok(());
        };

        mapping.write_artifact(&self.config.artifact_path)?;
        info!(
            artifact = %self.config.artifact_path.display(),
            entries = mapping.len(),
            renames = mapping.rename_count(),
            "mapping persisted"
        );
        self.report.mapping = Some(mapping.clone());
        self.enter(ReconcilePhase::MappingComputed);

        if self.config.dry_run {
            info!("dry run, leaving services untouched");
            return Ok(());
        }

        let members = mapping.new_names();

        self.enter(ReconcilePhase::Stopping);
        self.stop_all(&members).await;

        debug!(settle = ?self.config.settle, "waiting for stops to settle");
        tokio::time::sleep(self.config.settle).await;

        self.enter(ReconcilePhase::Renaming);
        let renamed = self
            .control
            .rename(&self.config.artifact_path, self.config.auto_confirm)
            .await
            .map_err(|e| match e {
                RehostError::RenameFailed(_) => e,
                other => RehostError::RenameFailed(other.to_string()),
            });
        self.report.rename = StepResult::from_result(&renamed);
        renamed?;
        info!(cluster = %cluster, "control node hostnames updated");

        self.enter(ReconcilePhase::Restarting);
        self.restart_all(&members).await?;

        self.enter(ReconcilePhase::Done);
        Ok(())
    }

    async fn await_local_host(&mut self) -> RehostResult<()> {
        let Some(PollPolicy { attempts, interval }) = self.config.await_local_host else {
            return Ok(());
        };
        let local = self.hosts.local_hostname()?;

        for attempt in 1..=attempts {
            if self.hosts.current_hostnames()?.iter().any(|h| *h == local) {
                debug!(host = %local, attempt, "local hostname present in host table");
                return Ok(());
            }
            debug!(host = %local, attempt, attempts, "local hostname not yet in host table");
            if attempt < attempts {
                tokio::time::sleep(interval).await;
            }
        }
        Err(RehostError::LocalHostMissing { host: local })
    }

    async fn ensure_server(&mut self) -> RehostResult<()> {
        let target = ServiceTarget::ControlNode;
        if !self.control.status(&target).await.is_running() {
            info!("control-node service not running, starting it to read hostnames");
            self.control
                .start(&target)
                .await
                .map_err(|e| RehostError::ServerStartFailure(e.to_string()))?;
        }
        self.enter(ReconcilePhase::ServerEnsured);
        Ok(())
    }

    /// Build the mapping, or `None` when nothing needs renaming.
    fn compute_mapping(
        &self,
        cluster: &ClusterIdentity,
        registered: &[String],
        discovered: &[String],
    ) -> RehostResult<Option<RenameMapping>> {
        match &self.config.pairing {
            Pairing::Explicit(mapping) => {
                mapping.ensure_covers(cluster, registered)?;
                if mapping.rename_count() == 0 {
                    return Ok(None);
                }
                Ok(Some(mapping.clone()))
            }
            Pairing::Positional => {
                if already_reconciled(registered, discovered) {
                    return Ok(None);
                }
                if registered.len() != discovered.len() {
                    warn!(
                        registered = registered.len(),
                        discovered = discovered.len(),
                        "host lists differ in length, refusing positional pairing"
                    );
                }
                RenameMapping::positional(cluster, registered, discovered).map(Some)
            }
        }
    }

    /// Stop the control node, then every member agent. Best effort.
    async fn stop_all(&mut self, members: &[String]) {
        let stopped = self.control.stop(&ServiceTarget::ControlNode).await;
        if let Err(e) = &stopped {
            warn!(error = %e, "control-node service did not confirm stop, continuing");
        }
        self.report.server_stop = StepResult::from_result(&stopped);

        let control = &self.control;
        let results = join_all(members.iter().map(|host| async move {
            let result = control.stop(&ServiceTarget::Agent(host.clone())).await;
            (host, result)
        }))
        .await;

        for (host, result) in results {
            if let Err(e) = &result {
                warn!(%host, error = %e, "agent stop failed");
            }
            self.report.member_mut(host).stop = StepResult::from_result(&result);
        }
    }

    /// Repoint and start every agent, then restart the control node.
    async fn restart_all(&mut self, members: &[String]) -> RehostResult<()> {
        let server = self.hosts.local_hostname();
        match &server {
            Ok(name) => info!(server = %name, "pointing agents at control node"),
            Err(e) => warn!(error = %e, "cannot resolve control-node hostname, agents keep their settings"),
        }

        let control = &self.control;
        let server = &server;
        let results = join_all(members.iter().map(|host| async move {
            let reset = match server {
                Ok(name) => control.reset_agent(host, name).await,
                Err(e) => Err(RehostError::Command {
                    program: "gethostname".to_string(),
                    reason: e.to_string(),
                }),
            };
            let start = control.start(&ServiceTarget::Agent(host.clone())).await;
            (host, reset, start)
        }))
        .await;

        for (host, reset, start) in results {
            if let Err(e) = &reset {
                warn!(%host, error = %e, "agent reset failed");
            }
            if let Err(e) = &start {
                warn!(%host, error = %e, "agent start failed");
            }
            let outcome = self.report.member_mut(host);
            outcome.reset = StepResult::from_result(&reset);
            outcome.start = StepResult::from_result(&start);
        }

        let restarted = self
            .control
            .start(&ServiceTarget::ControlNode)
            .await
            .map_err(|e| RehostError::ServerRestartFailure(e.to_string()));
        self.report.server_restart = StepResult::from_result(&restarted);
        restarted.map(|_| ())
    }
}
