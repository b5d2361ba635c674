// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn missing_row_fails_the_task() {
    let err = RunError::from_lookup(StoreError::not_found("template", 4), "Template");
    assert!(matches!(err, RunError::Task(TaskFailure::NotFound(_))));
    assert_eq!(err.to_string(), "Template not found");
}

#[test]
fn backend_error_is_fatal() {
    let err = RunError::from_lookup(StoreError::Backend("disk full".into()), "Template");
    assert!(matches!(err, RunError::Fatal(InfrastructureError::Store(_))));
}

#[yare::parameterized(
    exit_code = { Some(2), "git clone exited with code 2: fatal: repo" },
    signal    = { None,    "git clone exited with signal: fatal: repo" },
)]
fn external_failure_message(code: Option<i32>, expected: &str) {
    let err = TaskFailure::ExternalCommandFailed {
        command: "git clone".into(),
        code,
        stderr: "fatal: repo".into(),
    };
    assert_eq!(err.to_string(), expected);
}

#[test]
fn pool_errors_name_the_task() {
    let err = PoolError::NotWaiting { id: 3, status: TaskStatus::Success };
    assert_eq!(err.to_string(), "task 3 is success, only waiting tasks can be submitted");
    assert_eq!(PoolError::NotActive(9).to_string(), "task 9 is not active");
}
