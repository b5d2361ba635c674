// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task row and its status machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle status of a task.
///
/// ```text
/// waiting → preparing → running → success | error
///     \          \          \
///      `----------`----------`→ stopping → stopped
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Queued, not yet admitted by the arbiter
    #[default]
    Waiting,
    /// Admitted; working directory and credentials being staged
    Preparing,
    /// Executor process running
    Running,
    /// Operator asked for a stop; the runner has not yet observed it
    Stopping,
    Stopped,
    Success,
    Error,
}

crate::simple_display! {
    TaskStatus {
        Waiting => "waiting",
        Preparing => "preparing",
        Running => "running",
        Stopping => "stopping",
        Stopped => "stopped",
        Success => "success",
        Error => "error",
    }
}

impl TaskStatus {
    /// Terminal statuses never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Stopped | TaskStatus::Success | TaskStatus::Error)
    }

    /// Statuses that mean a runner currently owns the task.
    pub fn is_active(self) -> bool {
        matches!(self, TaskStatus::Preparing | TaskStatus::Running | TaskStatus::Stopping)
    }
}

/// A status write that is illegal once a stop is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("stopping task cannot be {0}")]
pub struct StatusTransitionError(pub TaskStatus);

/// Resolve the status that is actually written when `target` is requested
/// while the task is currently `current`.
///
/// While a stop is in flight, `error` is rewritten to `stopped` and `stopped`
/// is accepted as-is. Any other target is a caller bug.
pub fn resolve_status(
    current: TaskStatus,
    target: TaskStatus,
) -> Result<TaskStatus, StatusTransitionError> {
    if current != TaskStatus::Stopping {
        return Ok(target);
    }
    match target {
        TaskStatus::Error | TaskStatus::Stopped => Ok(TaskStatus::Stopped),
        other => Err(StatusTransitionError(other)),
    }
}

/// One submitted job instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub template_id: i64,
    pub project_id: i64,
    /// Playbook override; the template's playbook is used when absent or empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playbook: Option<String>,
    /// JSON-encoded list of extra executor arguments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
    /// Inline JSON environment; replaces the template environment when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    /// Submitting user
    #[serde(default)]
    pub user_id: Option<i64>,
}

impl Task {
    /// Playbook the executor should run: the override when non-empty,
    /// otherwise the template default.
    pub fn effective_playbook<'a>(&'a self, template_playbook: &'a str) -> &'a str {
        match self.playbook.as_deref() {
            Some(p) if !p.is_empty() => p,
            _ => template_playbook,
        }
    }

    /// Inline environment JSON, if non-empty.
    pub fn inline_environment(&self) -> Option<&str> {
        self.environment.as_deref().filter(|s| !s.trim().is_empty())
    }
}

crate::builder! {
    pub struct TaskBuilder => Task {
        set {
            id: i64 = 1,
            template_id: i64 = 1,
            project_id: i64 = 1,
            debug: bool = false,
            dry_run: bool = false,
            status: TaskStatus = TaskStatus::Waiting,
        }
        option {
            playbook: String = None,
            arguments: String = None,
            environment: String = None,
            user_id: i64 = None,
        }
        computed {
            start: Option<DateTime<Utc>> = None,
            end: Option<DateTime<Utc>> = None,
        }
    }
}

/// Live-update envelope pushed to every user subscribed to the task's project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskUpdate {
    #[serde(rename = "type")]
    pub kind: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub status: TaskStatus,
    pub task_id: i64,
    pub project_id: i64,
}

impl TaskUpdate {
    pub fn from_task(task: &Task) -> Self {
        Self {
            kind: "update".to_string(),
            start: task.start,
            end: task.end,
            status: task.status,
            task_id: task.id,
            project_id: task.project_id,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
