// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::process::Stdio;

#[tokio::test]
async fn captures_output_of_fast_command() {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", "echo out; echo err >&2; exit 3"]).stdout(Stdio::piped()).stderr(Stdio::piped());
    let output = run_with_timeout(cmd, Duration::from_secs(10), "echo").await.unwrap();

    assert_eq!(output.status.code(), Some(3));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "out\n");
    assert_eq!(String::from_utf8_lossy(&output.stderr), "err\n");
}

#[tokio::test]
async fn slow_command_times_out() {
    let mut cmd = Command::new("sleep");
    cmd.arg("5");
    let err = run_with_timeout(cmd, Duration::from_millis(50), "sleep").await.unwrap_err();
    assert!(matches!(err, SubprocessError::Timeout { .. }));
    assert_eq!(err.to_string(), "sleep timed out after 0s");
}

#[tokio::test]
async fn missing_program_is_spawn_error() {
    let cmd = Command::new("/nonexistent/ty-test-binary");
    let err = run_with_timeout(cmd, Duration::from_secs(1), "missing").await.unwrap_err();
    assert!(matches!(err, SubprocessError::Spawn { ref program, .. } if program == "/nonexistent/ty-test-binary"));
}
