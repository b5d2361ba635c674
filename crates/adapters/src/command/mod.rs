// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! External process execution.
//!
//! [`CommandRunner::output`] runs helper commands (git, role installs, host
//! listing) to completion under a timeout. [`CommandRunner::supervise`] runs
//! the long-lived executor, streaming its output and honouring cancellation.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::subprocess::{run_with_timeout, SubprocessError};

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{CallKind, CommandCall, FakeCommandRunner, FakeGate, FakeResponse};

/// How long a signalled process gets to exit before it is killed outright.
const TERMINATE_GRACE: Duration = Duration::from_secs(10);

/// Stderr lines kept for failure reports.
const STDERR_TAIL_LINES: usize = 20;

/// One invocation: program, arguments, working directory and the variables
/// added on top of the daemon's own environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self { program: program.into(), args: Vec::new(), cwd: cwd.into(), env: Vec::new() }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn envs(mut self, env: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env.extend(env);
        self
    }

    /// Value of an added environment variable; the last assignment wins.
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Program name without its directory, for logs and fakes.
    pub fn program_name(&self) -> &str {
        Path::new(&self.program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(self.program.as_str())
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(&self.cwd)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

/// Captured result of a helper command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// How a supervised process ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessExit {
    pub code: Option<i32>,
    /// The process was signalled because cancellation was requested
    pub cancelled: bool,
    /// Last lines written to stderr
    pub stderr_tail: String,
}

impl ProcessExit {
    pub fn success(&self) -> bool {
        !self.cancelled && self.code == Some(0)
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync + 'static {
    /// Run `spec` to completion, capturing its output.
    async fn output(
        &self,
        spec: &CommandSpec,
        timeout: Duration,
    ) -> Result<CommandOutput, SubprocessError>;

    /// Run `spec` until it exits or `cancel` fires.
    ///
    /// Stdout and stderr lines are forwarded to `lines` as they arrive. On
    /// cancellation the process receives a termination signal and is waited
    /// for; the returned exit has `cancelled` set.
    async fn supervise(
        &self,
        spec: &CommandSpec,
        cancel: CancellationToken,
        lines: mpsc::UnboundedSender<String>,
    ) -> Result<ProcessExit, SubprocessError>;
}

/// [`CommandRunner`] backed by real child processes.
#[derive(Clone, Copy, Debug, Default)]
pub struct RealCommandRunner;

#[async_trait]
impl CommandRunner for RealCommandRunner {
    async fn output(
        &self,
        spec: &CommandSpec,
        timeout: Duration,
    ) -> Result<CommandOutput, SubprocessError> {
        let description = format!("{} {}", spec.program_name(), spec.args.first().map_or("", String::as_str));
        let output = run_with_timeout(spec.command(), timeout, description.trim_end()).await?;
        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn supervise(
        &self,
        spec: &CommandSpec,
        cancel: CancellationToken,
        lines: mpsc::UnboundedSender<String>,
    ) -> Result<ProcessExit, SubprocessError> {
        let mut cmd = spec.command();
        cmd.kill_on_drop(true);
        let mut child = cmd.spawn().map_err(|source| SubprocessError::Spawn {
            program: spec.program.clone(),
            source,
        })?;
        tracing::info!(program = spec.program_name(), pid = child.id(), "process started");

        let tail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));
        let stdout = child.stdout.take().map(|out| forward_lines(out, lines.clone(), None));
        let stderr =
            child.stderr.take().map(|err| forward_lines(err, lines, Some(Arc::clone(&tail))));

        let mut cancelled = false;
        let status = tokio::select! {
            status = child.wait() => status,
            _ = cancel.cancelled() => {
                cancelled = true;
                terminate(&mut child).await
            }
        }
        .map_err(|source| SubprocessError::Io {
            description: format!("waiting for {}", spec.program_name()),
            source,
        })?;

        for reader in [stdout, stderr].into_iter().flatten() {
            let _ = reader.await;
        }

        let stderr_tail = tail.lock().iter().cloned().collect::<Vec<_>>().join("\n");
        tracing::info!(
            program = spec.program_name(),
            exit_code = ?status.code(),
            cancelled,
            "process exited"
        );
        Ok(ProcessExit { code: status.code(), cancelled, stderr_tail })
    }
}

/// Copy lines from a child pipe into `lines`, optionally keeping a tail.
fn forward_lines<R>(
    pipe: R,
    lines: mpsc::UnboundedSender<String>,
    tail: Option<Arc<Mutex<VecDeque<String>>>>,
) -> tokio::task::JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(pipe).lines();
        while let Ok(Some(line)) = reader.next_line().await {
            if let Some(tail) = &tail {
                let mut tail = tail.lock();
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line.clone());
            }
            // Receiver gone only means nobody is logging; keep draining the pipe
            let _ = lines.send(line);
        }
    })
}

/// Ask the child to exit with SIGTERM, escalating to SIGKILL after a grace
/// period.
async fn terminate(child: &mut Child) -> std::io::Result<std::process::ExitStatus> {
    send_sigterm(child);
    match tokio::time::timeout(TERMINATE_GRACE, child.wait()).await {
        Ok(status) => status,
        Err(_) => {
            tracing::warn!(pid = child.id(), "process ignored SIGTERM, killing");
            child.kill().await?;
            child.wait().await
        }
    }
}

#[cfg(unix)]
fn send_sigterm(child: &mut Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) else {
        return;
    };
    if let Err(e) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
        tracing::warn!(pid, error = %e, "failed to signal process");
        let _ = child.start_kill();
    }
}

#[cfg(not(unix))]
fn send_sigterm(child: &mut Child) {
    let _ = child.start_kill();
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
