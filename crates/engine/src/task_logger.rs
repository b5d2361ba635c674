// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only logger for per-task activity logs.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use ty_adapters::CommandSpec;

/// Append-only logger for per-task activity logs.
///
/// Writes timestamped lines to `<log_dir>/task/<task_id>.log`. Each call
/// opens, writes, and closes the file; executor output is the busiest writer
/// and arrives at line granularity.
pub struct TaskLogger {
    log_dir: PathBuf,
}

impl TaskLogger {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self { log_dir: log_dir.into() }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn path_for(&self, task_id: i64) -> PathBuf {
        self.log_dir.join("task").join(format!("{task_id}.log"))
    }

    /// Append a runner message. Also emitted through tracing.
    ///
    /// Failures are logged via tracing but do not propagate.
    pub fn append(&self, task_id: i64, message: &str) {
        tracing::info!(task_id, "{message}");
        self.write(task_id, message);
    }

    /// Record a command line about to run.
    pub fn append_command(&self, task_id: i64, spec: &CommandSpec) {
        let mut line = spec.program_name().to_string();
        for arg in &spec.args {
            line.push(' ');
            line.push_str(arg);
        }
        self.append(task_id, &format!("$ {line}"));
    }

    /// Append one line of executor output (not mirrored to tracing).
    pub fn append_output(&self, task_id: i64, line: &str) {
        self.write(task_id, line);
    }

    /// Logger bound to one task.
    pub fn scoped(&self, task_id: i64) -> TaskLog<'_> {
        TaskLog { logger: self, task_id }
    }

    fn write(&self, task_id: i64, message: &str) {
        if let Err(e) = self.write_line(&self.path_for(task_id), message) {
            tracing::warn!(task_id, error = %e, "failed to write task log");
        }
    }

    fn write_line(&self, path: &Path, message: &str) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
        for line in message.lines() {
            writeln!(file, "{ts} {line}")?;
        }
        Ok(())
    }
}

/// [`TaskLogger`] bound to one task id.
#[derive(Clone, Copy)]
pub struct TaskLog<'a> {
    logger: &'a TaskLogger,
    task_id: i64,
}

impl TaskLog<'_> {
    pub fn line(&self, message: &str) {
        self.logger.append(self.task_id, message);
    }

    pub fn command(&self, spec: &CommandSpec) {
        self.logger.append_command(self.task_id, spec);
    }

    /// Captured output of a helper command, skipping blank streams.
    pub fn output(&self, text: &str) {
        if !text.trim().is_empty() {
            self.logger.append_output(self.task_id, text.trim_end());
        }
    }
}

#[cfg(test)]
#[path = "task_logger_tests.rs"]
mod tests;
