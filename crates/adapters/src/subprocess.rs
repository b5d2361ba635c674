// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded execution of short-lived helper commands.

use std::process::Output;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Clone or pull of a task repository.
pub const GIT_SYNC_TIMEOUT: Duration = Duration::from_secs(300);
/// Role dependency install.
pub const GALAXY_INSTALL_TIMEOUT: Duration = Duration::from_secs(600);
/// Host enumeration dry run.
pub const LIST_HOSTS_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum SubprocessError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{description} timed out after {}s", timeout.as_secs())]
    Timeout { description: String, timeout: Duration },
    #[error("{description} failed: {source}")]
    Io {
        description: String,
        #[source]
        source: std::io::Error,
    },
}

/// Run `cmd` to completion, killing it if it outlives `timeout`.
///
/// `description` names the command in errors and logs.
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    description: &str,
) -> Result<Output, SubprocessError> {
    let program = cmd.as_std().get_program().to_string_lossy().into_owned();
    cmd.kill_on_drop(true);
    let child = cmd.spawn().map_err(|source| SubprocessError::Spawn { program, source })?;
    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result
            .map_err(|source| SubprocessError::Io { description: description.to_string(), source }),
        Err(_) => {
            tracing::warn!(description, timeout_secs = timeout.as_secs(), "command timed out");
            Err(SubprocessError::Timeout { description: description.to_string(), timeout })
        }
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
