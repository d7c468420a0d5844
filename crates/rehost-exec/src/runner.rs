//! Process execution.
//!
//! `CommandRunner` is the seam between service control and the
//! operating system. `SystemRunner` spawns real processes with tokio;
//! tests substitute a scripted runner.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use rehost_core::{RehostError, RehostResult};

/// What the child process sees on stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StdinMode {
    /// Closed immediately.
    Null,
    /// Shared with this process; output is shown to the operator as well.
    Inherit,
    /// The given text is written, then stdin is closed.
    Answer(String),
}

/// A command to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: StdinMode,
    /// Exempt from the runner's timeout. Set for commands that must never
    /// be killed partway through.
    pub unbounded: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: StdinMode::Null,
            unbounded: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn stdin(mut self, mode: StdinMode) -> Self {
        self.stdin = mode;
        self
    }

    /// Run to completion regardless of the runner's timeout.
    pub fn unbounded(mut self) -> Self {
        self.unbounded = true;
        self
    }

    /// Shell-like rendering for logs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Last non-empty line of stderr, or of stdout when stderr is empty.
    pub fn summary(&self) -> String {
        let last = |s: &str| s.lines().rev().find(|l| !l.trim().is_empty()).map(str::to_string);
        last(&self.stderr)
            .or_else(|| last(&self.stdout))
            .unwrap_or_else(|| format!("exit code {:?}", self.code))
    }
}

/// Runs commands on behalf of the service controller.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run `spec` to completion.
    ///
    /// Returns `Err` only when the process could not be run at all
    /// (spawn failure or timeout). A non-zero exit is an `Ok` output.
    async fn run(&self, spec: &CommandSpec) -> RehostResult<CommandOutput>;
}

/// Spawns real processes.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    timeout: Option<Duration>,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill commands that run longer than `timeout`, unless they are
    /// marked unbounded.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl CommandRunner for SystemRunner {
    async fn run(&self, spec: &CommandSpec) -> RehostResult<CommandOutput> {
        let command_err = |reason: String| RehostError::Command {
            program: spec.program.clone(),
            reason,
        };

        let mut command = Command::new(&spec.program);
        command.args(&spec.args).kill_on_drop(true);
        match spec.stdin {
            StdinMode::Null => {
                command.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
            }
            StdinMode::Inherit => {
                command.stdin(Stdio::inherit()).stdout(Stdio::inherit()).stderr(Stdio::inherit());
            }
            StdinMode::Answer(_) => {
                command.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::piped());
            }
        }

        debug!(command = %spec.display(), "running command");
        let mut child = command.spawn().map_err(|e| command_err(e.to_string()))?;

        if let StdinMode::Answer(answers) = &spec.stdin
            && let Some(mut stdin) = child.stdin.take()
        {
            let answers = answers.clone();
            tokio::spawn(async move {
                // The child may exit before reading every answer.
                let _ = stdin.write_all(answers.as_bytes()).await;
                let _ = stdin.shutdown().await;
            });
        }

        let wait = child.wait_with_output();
        let limit = self.timeout.filter(|_| !spec.unbounded);
        let output = match limit {
            Some(limit) => match tokio::time::timeout(limit, wait).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(command = %spec.display(), timeout = ?limit, "command timed out");
                    return Err(command_err(format!("timed out after {limit:?}")));
                }
            },
            None => wait.await,
        }
        .map_err(|e| command_err(e.to_string()))?;

        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
