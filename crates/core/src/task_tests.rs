// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    waiting   = { TaskStatus::Waiting,   false, false },
    preparing = { TaskStatus::Preparing, false, true },
    running   = { TaskStatus::Running,   false, true },
    stopping  = { TaskStatus::Stopping,  false, true },
    stopped   = { TaskStatus::Stopped,   true,  false },
    success   = { TaskStatus::Success,   true,  false },
    error     = { TaskStatus::Error,     true,  false },
)]
fn status_classification(status: TaskStatus, terminal: bool, active: bool) {
    assert_eq!(status.is_terminal(), terminal);
    assert_eq!(status.is_active(), active);
}

#[yare::parameterized(
    running_to_success   = { TaskStatus::Running,   TaskStatus::Success,   TaskStatus::Success },
    running_to_error     = { TaskStatus::Running,   TaskStatus::Error,     TaskStatus::Error },
    preparing_to_running = { TaskStatus::Preparing, TaskStatus::Running,   TaskStatus::Running },
    waiting_to_preparing = { TaskStatus::Waiting,   TaskStatus::Preparing, TaskStatus::Preparing },
    stopping_error       = { TaskStatus::Stopping,  TaskStatus::Error,     TaskStatus::Stopped },
    stopping_stopped     = { TaskStatus::Stopping,  TaskStatus::Stopped,   TaskStatus::Stopped },
)]
fn resolve_status_accepts(current: TaskStatus, target: TaskStatus, expected: TaskStatus) {
    assert_eq!(resolve_status(current, target), Ok(expected));
}

#[yare::parameterized(
    success   = { TaskStatus::Success },
    running   = { TaskStatus::Running },
    preparing = { TaskStatus::Preparing },
    waiting   = { TaskStatus::Waiting },
)]
fn resolve_status_rejects_while_stopping(target: TaskStatus) {
    let err = resolve_status(TaskStatus::Stopping, target).unwrap_err();
    assert_eq!(err, StatusTransitionError(target));
    assert_eq!(err.to_string(), format!("stopping task cannot be {}", target));
}

#[test]
fn status_serializes_snake_case() {
    assert_eq!(serde_json::to_string(&TaskStatus::Stopping).unwrap(), "\"stopping\"");
    let parsed: TaskStatus = serde_json::from_str("\"success\"").unwrap();
    assert_eq!(parsed, TaskStatus::Success);
}

#[test]
fn effective_playbook_prefers_non_empty_override() {
    let task = Task::builder().playbook("override.yml").build();
    assert_eq!(task.effective_playbook("site.yml"), "override.yml");

    let task = Task::builder().playbook("").build();
    assert_eq!(task.effective_playbook("site.yml"), "site.yml");

    let task = Task::builder().build();
    assert_eq!(task.effective_playbook("site.yml"), "site.yml");
}

#[test]
fn inline_environment_ignores_blank() {
    assert_eq!(Task::builder().environment("  ").build().inline_environment(), None);
    assert_eq!(
        Task::builder().environment(r#"{"a":1}"#).build().inline_environment(),
        Some(r#"{"a":1}"#)
    );
}

#[test]
fn update_envelope_shape() {
    let task = Task::builder().id(7).project_id(3).status(TaskStatus::Running).build();
    let bytes = TaskUpdate::from_task(&task).to_bytes().unwrap();
    let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(value["type"], "update");
    assert_eq!(value["status"], "running");
    assert_eq!(value["task_id"], 7);
    assert_eq!(value["project_id"], 3);
    assert!(value["start"].is_null());
    assert!(value["end"].is_null());
}
