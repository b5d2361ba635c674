// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executor supervision: host listing, the long-running playbook process,
//! and the stop handle shared with the task pool.

use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use ty_adapters::subprocess::LIST_HOSTS_TIMEOUT;
use ty_adapters::{CommandRunner, CommandSpec, ProcessExit};

use crate::error::TaskFailure;
use crate::playbook::parse_hosts;
use crate::task_logger::TaskLog;
use crate::workspace::check_exit;

/// Stop signalling between the pool and one runner.
///
/// A stop request cancels the task-wide token and, once the executor has
/// been launched, the token of the published process.
#[derive(Debug, Default)]
pub struct TaskControl {
    stop: CancellationToken,
    process: Mutex<Option<CancellationToken>>,
}

impl TaskControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.stop.cancel();
        if let Some(process) = self.process.lock().as_ref() {
            process.cancel();
        }
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Resolves once a stop has been requested.
    pub async fn stopped(&self) {
        self.stop.cancelled().await;
    }

    /// Whether an executor handle is currently published.
    pub fn has_process(&self) -> bool {
        self.process.lock().is_some()
    }

    /// Publish a cancellation handle for a process about to start. `None`
    /// if a stop was already requested.
    pub(crate) fn publish_process(&self) -> Option<CancellationToken> {
        let mut process = self.process.lock();
        if self.stop.is_cancelled() {
            return None;
        }
        let token = CancellationToken::new();
        *process = Some(token.clone());
        Some(token)
    }

    pub(crate) fn clear_process(&self) {
        self.process.lock().take();
    }
}

/// Runs the playbook executor for one task.
pub struct Supervisor {
    commands: Arc<dyn CommandRunner>,
    program: String,
}

impl Supervisor {
    pub fn new(commands: Arc<dyn CommandRunner>, program: impl Into<String>) -> Self {
        Self { commands, program: program.into() }
    }

    pub fn spec(&self, args: &[String], cwd: &Path, env: Vec<(String, String)>) -> CommandSpec {
        CommandSpec::new(&self.program, cwd).args(args.iter().cloned()).envs(env)
    }

    /// Hosts the playbook would touch, from `--list-hosts`.
    pub async fn list_hosts(
        &self,
        spec: &CommandSpec,
        log: TaskLog<'_>,
    ) -> Result<Vec<String>, TaskFailure> {
        let spec = spec.clone().args(["--list-hosts"]);
        log.command(&spec);
        let output = self.commands.output(&spec, LIST_HOSTS_TIMEOUT).await?;
        log.output(&output.stderr);
        let output = check_exit("ansible-playbook --list-hosts", output)?;
        Ok(parse_hosts(&output.stdout))
    }

    /// Launch the executor and wait for it to exit, streaming its output
    /// into the task log.
    ///
    /// The process is never spawned when a stop is already pending; the
    /// returned exit is then marked cancelled.
    pub async fn launch(
        &self,
        spec: &CommandSpec,
        control: &TaskControl,
        log: TaskLog<'_>,
    ) -> Result<ProcessExit, TaskFailure> {
        let Some(cancel) = control.publish_process() else {
            return Ok(ProcessExit { code: None, cancelled: true, stderr_tail: String::new() });
        };
        log.command(spec);

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let drain = async {
            while let Some(line) = rx.recv().await {
                log.output(&line);
            }
        };
        let (exit, ()) = tokio::join!(self.commands.supervise(spec, cancel, tx), drain);
        control.clear_process();
        Ok(exit?)
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
