//! Service control with verified state transitions.
//!
//! Service managers' `start`/`stop` commands are not guaranteed to be
//! synchronous, so every `start`/`stop` is treated as a request: the
//! controller issues it and then polls `status` a fixed number of times
//! at a fixed spacing until the service reports the wanted state.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, info, warn};

use rehost_core::settings::{CommandsConfig, SshConfig};
use rehost_core::{RehostError, RehostResult, ServiceStatus};

use crate::runner::{CommandOutput, CommandRunner, CommandSpec, StdinMode};

/// Exit code `ssh` uses for its own connection failures.
const SSH_CONNECTION_FAILURE: i32 = 255;

/// Answers fed to the rename command's confirmation prompts.
const AFFIRMATIVE_ANSWERS: usize = 16;

/// Which service an operation applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServiceTarget {
    /// The control-node service on this machine.
    ControlNode,
    /// The agent on a member, reached over ssh.
    Agent(String),
}

impl fmt::Display for ServiceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceTarget::ControlNode => f.write_str("control-node service"),
            ServiceTarget::Agent(host) => write!(f, "agent on {host}"),
        }
    }
}

/// Fixed-count, fixed-spacing status polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            interval: Duration::from_secs(10),
        }
    }
}

/// Operations the reconciliation engine needs from service control.
#[allow(async_fn_in_trait)]
pub trait ServiceControl {
    /// Current state of `target`. Never fails; an unrunnable status
    /// command yields `Unknown`.
    async fn status(&self, target: &ServiceTarget) -> ServiceStatus;

    /// Stop `target` and confirm it stopped. Returns the number of status
    /// checks it took.
    async fn stop(&self, target: &ServiceTarget) -> RehostResult<u32>;

    /// Start `target` and confirm it is running. Returns the number of
    /// status checks it took.
    async fn start(&self, target: &ServiceTarget) -> RehostResult<u32>;

    /// Point the agent on `host` at the control node named `server`.
    async fn reset_agent(&self, host: &str, server: &str) -> RehostResult<()>;

    /// Run the control node's bulk rename with the artifact at `artifact`.
    ///
    /// With `auto_confirm` every confirmation prompt is answered yes;
    /// otherwise the prompts are shown to the operator.
    async fn rename(&self, artifact: &Path, auto_confirm: bool) -> RehostResult<()>;
}

/// How to invoke the managed services.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub server_command: String,
    pub agent_command: String,
    pub server_running_marker: String,
    pub agent_running_marker: String,
    pub ssh_program: String,
    pub ssh_user: Option<String>,
    pub ssh_connect_timeout_secs: u64,
    pub poll: PollPolicy,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::from_settings(&CommandsConfig::default(), &SshConfig::default())
    }
}

impl ControllerConfig {
    pub fn from_settings(commands: &CommandsConfig, ssh: &SshConfig) -> Self {
        Self {
            server_command: commands.server.clone(),
            agent_command: commands.agent.clone(),
            server_running_marker: commands.server_running_marker.clone(),
            agent_running_marker: commands.agent_running_marker.clone(),
            ssh_program: ssh.program.clone(),
            ssh_user: ssh.user.clone(),
            ssh_connect_timeout_secs: ssh.connect_timeout_secs,
            poll: PollPolicy::default(),
        }
    }

    pub fn with_poll(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }
}

/// `ServiceControl` backed by local commands and ssh.
#[derive(Debug, Clone)]
pub struct ProcessController<R> {
    runner: R,
    config: ControllerConfig,
}

impl<R: CommandRunner> ProcessController<R> {
    pub fn new(runner: R, config: ControllerConfig) -> Self {
        Self { runner, config }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Build the command that runs `action` against `target`.
    pub fn service_command(&self, target: &ServiceTarget, action: &str) -> CommandSpec {
        match target {
            ServiceTarget::ControlNode => {
                CommandSpec::new(&self.config.server_command).arg(action)
            }
            ServiceTarget::Agent(host) => {
                self.remote(host, &format!("{} {action}", self.config.agent_command))
            }
        }
    }

    /// Wrap `remote_command` in an ssh invocation against `host`.
    ///
    /// Host keys are not checked: members may have just been re-imaged
    /// or renamed, so their keys are trusted on first use.
    fn remote(&self, host: &str, remote_command: &str) -> CommandSpec {
        let destination = match &self.config.ssh_user {
            Some(user) => format!("{user}@{host}"),
            None => host.to_string(),
        };
        CommandSpec::new(&self.config.ssh_program)
            .args([
                "-o",
                "UserKnownHostsFile=/dev/null",
                "-o",
                "StrictHostKeyChecking=no",
                "-o",
                "BatchMode=yes",
                "-o",
            ])
            .arg(format!("ConnectTimeout={}", self.config.ssh_connect_timeout_secs))
            .arg(destination)
            .arg(remote_command)
    }

    fn running_marker(&self, target: &ServiceTarget) -> &str {
        match target {
            ServiceTarget::ControlNode => &self.config.server_running_marker,
            ServiceTarget::Agent(_) => &self.config.agent_running_marker,
        }
    }

    fn classify(&self, target: &ServiceTarget, output: &CommandOutput) -> ServiceStatus {
        if output.stdout.contains(self.running_marker(target)) {
            return ServiceStatus::Running;
        }
        match target {
            ServiceTarget::Agent(_) if output.code == Some(SSH_CONNECTION_FAILURE) => {
                ServiceStatus::Unknown
            }
            _ => ServiceStatus::Stopped,
        }
    }

    /// Issue `action` and poll until `target` reports `wanted`.
    ///
    /// Returns `Ok(attempts)` on confirmation, `Err(attempts)` once the
    /// poll budget is spent.
    async fn request_and_verify(
        &self,
        target: &ServiceTarget,
        action: &str,
        wanted: ServiceStatus,
    ) -> Result<u32, u32> {
        let spec = self.service_command(target, action);
        match self.runner.run(&spec).await {
            Ok(output) if !output.success => {
                debug!(%target, action, reason = %output.summary(), "service command exited non-zero");
            }
            Ok(_) => {}
            Err(e) => warn!(%target, action, error = %e, "service command could not run"),
        }

        let PollPolicy { attempts, interval } = self.config.poll;
        for attempt in 1..=attempts {
            let status = self.status(target).await;
            if status == wanted {
                return Ok(attempt);
            }
            debug!(%target, attempt, attempts, %status, wanted = %wanted, "waiting for service state");
            if attempt < attempts {
                tokio::time::sleep(interval).await;
            }
        }
        Err(attempts)
    }
}

impl<R: CommandRunner> ServiceControl for ProcessController<R> {
    async fn status(&self, target: &ServiceTarget) -> ServiceStatus {
        let spec = self.service_command(target, "status");
        match self.runner.run(&spec).await {
            Ok(output) => self.classify(target, &output),
            Err(e) => {
                debug!(%target, error = %e, "status command failed");
                ServiceStatus::Unknown
            }
        }
    }

    async fn stop(&self, target: &ServiceTarget) -> RehostResult<u32> {
        info!(%target, "stopping");
        match self.request_and_verify(target, "stop", ServiceStatus::Stopped).await {
            Ok(attempts) => {
                info!(%target, attempts, "stopped");
                Ok(attempts)
            }
            Err(attempts) => {
                warn!(%target, attempts, "failed to stop");
                Err(RehostError::StopFailed {
                    target: target.to_string(),
                    attempts,
                })
            }
        }
    }

    async fn start(&self, target: &ServiceTarget) -> RehostResult<u32> {
        info!(%target, "starting");
        match self.request_and_verify(target, "start", ServiceStatus::Running).await {
            Ok(attempts) => {
                info!(%target, attempts, "started");
                Ok(attempts)
            }
            Err(attempts) => {
                warn!(%target, attempts, "failed to start");
                Err(RehostError::StartFailed {
                    target: target.to_string(),
                    attempts,
                })
            }
        }
    }

    async fn reset_agent(&self, host: &str, server: &str) -> RehostResult<()> {
        let spec = self.remote(host, &format!("{} reset {server}", self.config.agent_command));
        let output = self.runner.run(&spec).await?;
        if !output.success {
            return Err(RehostError::Command {
                program: spec.display(),
                reason: output.summary(),
            });
        }
        info!(%host, %server, "agent reset to new control node");
        Ok(())
    }

    /// The rename is one-way, so it is never subject to the runner's
    /// timeout.
    async fn rename(&self, artifact: &Path, auto_confirm: bool) -> RehostResult<()> {
        let stdin = if auto_confirm {
            StdinMode::Answer("y\n".repeat(AFFIRMATIVE_ANSWERS))
        } else {
            StdinMode::Inherit
        };
        let spec = CommandSpec::new(&self.config.server_command)
            .arg("update-host-names")
            .arg(artifact.display().to_string())
            .stdin(stdin)
            .unbounded();

        info!(artifact = %artifact.display(), auto_confirm, "invoking rename");
        let output = self
            .runner
            .run(&spec)
            .await
            .map_err(|e| RehostError::RenameFailed(e.to_string()))?;
        if !output.success {
            return Err(RehostError::RenameFailed(output.summary()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;
    use crate::runner::SystemRunner;

    /// Runner that records commands and replays scripted outputs.
    ///
    /// Status commands are answered from `statuses` (last one repeats);
    /// every other command succeeds with empty output unless a failure
    /// is scripted.
    #[derive(Default)]
    struct ScriptedRunner {
        calls: Mutex<Vec<CommandSpec>>,
        statuses: Mutex<VecDeque<CommandOutput>>,
        fail_others: Option<CommandOutput>,
    }

    impl ScriptedRunner {
        fn with_statuses(outputs: Vec<CommandOutput>) -> Self {
            Self {
                statuses: Mutex::new(outputs.into()),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<CommandSpec> {
            self.calls.lock().unwrap().clone()
        }

        fn status_calls(&self) -> usize {
            self.calls()
                .iter()
                .filter(|c| c.args.last().is_some_and(|a| a.ends_with("status")))
                .count()
        }
    }

    impl CommandRunner for ScriptedRunner {
        async fn run(&self, spec: &CommandSpec) -> RehostResult<CommandOutput> {
            self.calls.lock().unwrap().push(spec.clone());
            if spec.args.last().is_some_and(|a| a.ends_with("status")) {
                let mut statuses = self.statuses.lock().unwrap();
                let out = if statuses.len() > 1 {
                    statuses.pop_front().unwrap()
                } else {
                    statuses.front().cloned().unwrap_or_default()
                };
                return Ok(out);
            }
            Ok(self.fail_others.clone().unwrap_or(CommandOutput {
                success: true,
                code: Some(0),
                ..Default::default()
            }))
        }
    }

    fn stdout(text: &str) -> CommandOutput {
        CommandOutput {
            success: true,
            code: Some(0),
            stdout: text.to_string(),
            stderr: String::new(),
        }
    }

    fn server_running() -> CommandOutput {
        stdout("Ambari Server running\nFound Ambari Server PID: 1234")
    }

    fn server_stopped() -> CommandOutput {
        stdout("Ambari Server not running. Stale PID File")
    }

    fn controller(runner: ScriptedRunner) -> ProcessController<ScriptedRunner> {
        ProcessController::new(runner, ControllerConfig::default())
    }

    #[tokio::test]
    async fn status_matches_running_marker() {
        let ctl = controller(ScriptedRunner::with_statuses(vec![server_running()]));
        assert_eq!(ctl.status(&ServiceTarget::ControlNode).await, ServiceStatus::Running);

        let ctl = controller(ScriptedRunner::with_statuses(vec![server_stopped()]));
        assert_eq!(ctl.status(&ServiceTarget::ControlNode).await, ServiceStatus::Stopped);
    }

    #[tokio::test]
    async fn unreachable_agent_is_unknown() {
        let unreachable = CommandOutput {
            success: false,
            code: Some(255),
            stdout: String::new(),
            stderr: "ssh: connect to host node1 port 22: No route to host".to_string(),
        };
        let ctl = controller(ScriptedRunner::with_statuses(vec![unreachable]));
        let status = ctl.status(&ServiceTarget::Agent("node1".into())).await;
        assert_eq!(status, ServiceStatus::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_exhausts_exactly_five_checks() {
        let ctl = controller(ScriptedRunner::with_statuses(vec![server_running()]));
        let started = tokio::time::Instant::now();

        let err = ctl.stop(&ServiceTarget::ControlNode).await.unwrap_err();

        assert!(matches!(err, RehostError::StopFailed { attempts: 5, .. }));
        assert_eq!(ctl.runner().status_calls(), 5);
        // Four 10s gaps between five checks.
        assert_eq!(started.elapsed(), Duration::from_secs(40));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_confirms_on_later_check() {
        let ctl = controller(ScriptedRunner::with_statuses(vec![
            server_running(),
            server_running(),
            server_stopped(),
        ]));

        let attempts = ctl.stop(&ServiceTarget::ControlNode).await.unwrap();
        assert_eq!(attempts, 3);

        let calls = ctl.runner().calls();
        assert_eq!(calls[0].display(), "ambari-server stop");
    }

    #[tokio::test(start_paused = true)]
    async fn start_fails_when_never_running() {
        let ctl = controller(ScriptedRunner::with_statuses(vec![server_stopped()]));
        let err = ctl.start(&ServiceTarget::ControlNode).await.unwrap_err();
        assert!(matches!(err, RehostError::StartFailed { attempts: 5, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn custom_poll_policy_respected() {
        let ctl = ProcessController::new(
            ScriptedRunner::with_statuses(vec![server_stopped()]),
            ControllerConfig::default().with_poll(PollPolicy {
                attempts: 2,
                interval: Duration::from_secs(1),
            }),
        );
        let err = ctl.start(&ServiceTarget::ControlNode).await.unwrap_err();
        assert!(matches!(err, RehostError::StartFailed { attempts: 2, .. }));
        assert_eq!(ctl.runner().status_calls(), 2);
    }

    #[tokio::test]
    async fn agent_commands_go_over_ssh() {
        let ctl = controller(ScriptedRunner::with_statuses(vec![stdout("ambari-agent running")]));
        let status = ctl.status(&ServiceTarget::Agent("node1".into())).await;
        assert_eq!(status, ServiceStatus::Running);

        let call = &ctl.runner().calls()[0];
        assert_eq!(call.program, "ssh");
        assert!(call.args.contains(&"StrictHostKeyChecking=no".to_string()));
        assert!(call.args.contains(&"UserKnownHostsFile=/dev/null".to_string()));
        assert_eq!(call.args[call.args.len() - 2], "node1");
        assert_eq!(call.args.last().unwrap(), "ambari-agent status");
    }

    #[tokio::test]
    async fn ssh_user_prefixes_destination() {
        let config = ControllerConfig {
            ssh_user: Some("root".to_string()),
            ..ControllerConfig::default()
        };
        let ctl = ProcessController::new(ScriptedRunner::default(), config);
        ctl.reset_agent("node1", "ctl.example.com").await.unwrap();

        let call = &ctl.runner().calls()[0];
        assert_eq!(call.args[call.args.len() - 2], "root@node1");
        assert_eq!(call.args.last().unwrap(), "ambari-agent reset ctl.example.com");
    }

    #[tokio::test]
    async fn rename_auto_confirms() {
        let ctl = controller(ScriptedRunner::default());
        ctl.rename(Path::new("/tmp/map.json"), true).await.unwrap();

        let call = &ctl.runner().calls()[0];
        assert_eq!(call.display(), "ambari-server update-host-names /tmp/map.json");
        match &call.stdin {
            StdinMode::Answer(answers) => assert!(answers.starts_with("y\ny\ny\n")),
            other => panic!("expected scripted answers, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rename_is_exempt_from_timeout() {
        let ctl = controller(ScriptedRunner::default());
        ctl.rename(Path::new("/tmp/map.json"), true).await.unwrap();
        ctl.status(&ServiceTarget::ControlNode).await;

        let calls = ctl.runner().calls();
        assert!(calls[0].unbounded);
        assert!(!calls[1].unbounded);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_rename_completes_past_runner_timeout() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let finished = dir.path().join("renamed");
        let server = dir.path().join("fake-server");
        std::fs::write(
            &server,
            format!("#!/bin/sh\nsleep 1\ntouch {}\n", finished.display()),
        )
        .unwrap();
        std::fs::set_permissions(&server, std::fs::Permissions::from_mode(0o755)).unwrap();

        let config = ControllerConfig {
            server_command: server.display().to_string(),
            ..ControllerConfig::default()
        };
        let ctl = ProcessController::new(
            SystemRunner::new().with_timeout(Duration::from_millis(100)),
            config,
        );

        ctl.rename(&dir.path().join("map.json"), true).await.unwrap();
        assert!(finished.exists());
    }

    #[tokio::test]
    async fn rename_without_auto_confirm_is_interactive() {
        let ctl = controller(ScriptedRunner::default());
        ctl.rename(Path::new("/tmp/map.json"), false).await.unwrap();
        assert_eq!(ctl.runner().calls()[0].stdin, StdinMode::Inherit);
    }

    #[tokio::test]
    async fn rename_failure_is_fatal_error() {
        let runner = ScriptedRunner {
            fail_others: Some(CommandOutput {
                success: false,
                code: Some(1),
                stdout: String::new(),
                stderr: "ERROR: Exiting with exit code 1.".to_string(),
            }),
            ..Default::default()
        };
        let ctl = controller(runner);
        let err = ctl.rename(Path::new("/tmp/map.json"), true).await.unwrap_err();
        assert!(matches!(err, RehostError::RenameFailed(msg) if msg.contains("exit code 1")));
    }
}
