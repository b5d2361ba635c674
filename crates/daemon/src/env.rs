// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ty_engine::ConcurrencyMode;

use crate::lifecycle::LifecycleError;

/// Resolve state directory: TY_STATE_DIR > XDG_STATE_HOME/ty > ~/.local/state/ty
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Some(dir) = non_empty("TY_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Some(xdg) = non_empty("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("ty"));
    }
    let home = dirs::home_dir().ok_or(LifecycleError::NoStateDir)?;
    Ok(home.join(".local/state/ty"))
}

/// Config file location (default `<state>/config.toml`)
pub fn config_path(state_dir: &Path) -> PathBuf {
    non_empty("TY_CONFIG").map(PathBuf::from).unwrap_or_else(|| state_dir.join("config.toml"))
}

/// Working root for repositories and credential files
pub fn tmp_path() -> Option<PathBuf> {
    non_empty("TY_TMP_PATH").map(PathBuf::from)
}

pub fn concurrency_mode() -> Option<ConcurrencyMode> {
    non_empty("TY_CONCURRENCY_MODE").map(|v| ConcurrencyMode::parse(&v))
}

/// Passphrase for access key secrets. Unset or empty leaves them unencrypted.
pub fn secret_key() -> Option<String> {
    non_empty("TY_SECRET_KEY")
}

/// Hand-off poll interval override
pub fn queue_poll() -> Option<Duration> {
    std::env::var("TY_QUEUE_POLL_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}

/// Log filter directive (default `info`)
pub fn log_filter() -> String {
    non_empty("TY_LOG").unwrap_or_else(|| "info".to_string())
}

/// Send logs to stderr instead of the rolling file
pub fn log_to_stderr() -> bool {
    matches!(std::env::var("TY_LOG_STDERR").as_deref(), Ok("1") | Ok("true"))
}

fn non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
