// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy of a task run.
//!
//! A [`TaskFailure`] ends the task in `error` and the runner carries on with
//! cleanup. An [`InfrastructureError`] means the runner can no longer keep
//! the task row truthful; it escapes the task boundary.

use thiserror::Error;
use ty_adapters::SubprocessError;
use ty_core::{StatusTransitionError, TaskStatus};
use ty_storage::StoreError;

/// Failure that demotes the task to `error`.
#[derive(Debug, Error)]
pub enum TaskFailure {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    UnsupportedCredential(String),
    #[error("{command} exited with {}: {stderr}", exit_label(.code))]
    ExternalCommandFailed { command: String, code: Option<i32>, stderr: String },
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error(transparent)]
    Subprocess(#[from] SubprocessError),
}

impl TaskFailure {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        TaskFailure::Io { context: context.into(), source }
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("code {c}"),
        None => "signal".to_string(),
    }
}

/// Failure of a critical write; fatal to the runner.
#[derive(Debug, Error)]
pub enum InfrastructureError {
    #[error("store failure: {0}")]
    Store(#[from] StoreError),
    #[error("invalid status transition: {0}")]
    Transition(#[from] StatusTransitionError),
    #[error("resource arbiter is gone")]
    ArbiterClosed,
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Task(#[from] TaskFailure),
    #[error(transparent)]
    Fatal(#[from] InfrastructureError),
}

impl RunError {
    /// Classify a store error raised while loading task details: a missing
    /// row fails the task, anything else is infrastructure.
    pub fn from_lookup(err: StoreError, what: &str) -> Self {
        if err.is_not_found() {
            RunError::Task(TaskFailure::NotFound(what.to_string()))
        } else {
            RunError::Fatal(InfrastructureError::Store(err))
        }
    }
}

/// Rejected pool operation.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("task {0} is already being run")]
    AlreadyActive(i64),
    #[error("task {id} is {status}, only waiting tasks can be submitted")]
    NotWaiting { id: i64, status: TaskStatus },
    #[error("task {0} is not active")]
    NotActive(i64),
    #[error("task {id} already finished as {status}")]
    Finished { id: i64, status: TaskStatus },
    #[error("runner for task {id} panicked or was aborted")]
    RunnerLost { id: i64 },
    #[error(transparent)]
    Fatal(#[from] InfrastructureError),
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
