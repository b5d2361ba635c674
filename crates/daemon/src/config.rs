// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The optional `config.toml` read at startup.
//!
//! Every field may be omitted. Environment variables override what the file
//! sets (see [`crate::env`]).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use ty_engine::{ConcurrencyMode, Executables};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Where failure alerts go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSink {
    /// Local popups only
    #[default]
    Desktop,
    /// Posted to the `[webhook]` endpoints
    Webhook,
    /// Alerts are dropped
    Off,
}

/// Endpoints for `alerts = "webhook"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WebhookConfig {
    /// Mail relay receiving `{to, subject, body}`
    pub mail_url: Option<String>,
    /// Chat bot endpoint receiving `{chat_id, text}`
    pub chat_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self { mail_url: None, chat_url: None, timeout_secs: 30 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub tmp_path: Option<PathBuf>,
    pub concurrency_mode: Option<ConcurrencyMode>,
    pub queue_poll_ms: Option<u64>,
    pub snapshot_interval_secs: Option<u64>,
    pub alerts: AlertSink,
    pub webhook: WebhookConfig,
    pub executables: Executables,
}

impl FileConfig {
    /// Read `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => return Err(ConfigError::Read { path: path.to_path_buf(), source }),
        };
        Self::parse(&text).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
