// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime settings the engine needs from the daemon.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How tasks are serialised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyMode {
    /// One task in the prepare/run section across the whole process
    #[default]
    Global,
    /// One task per project; host enumeration is skipped
    Project,
}

ty_core::simple_display! {
    ConcurrencyMode {
        Global => "global",
        Project => "project",
    }
}

impl ConcurrencyMode {
    /// `project` selects per-project serialisation; anything else is global.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("project") {
            ConcurrencyMode::Project
        } else {
            ConcurrencyMode::Global
        }
    }
}

/// Paths of the external tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Executables {
    pub git: String,
    pub galaxy: String,
    pub playbook: String,
}

impl Default for Executables {
    fn default() -> Self {
        Self {
            git: "git".to_string(),
            galaxy: "ansible-galaxy".to_string(),
            playbook: "ansible-playbook".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Working root for repositories, inventories and key files
    pub tmp_path: PathBuf,
    /// Root for per-task activity logs
    pub log_dir: PathBuf,
    pub concurrency_mode: ConcurrencyMode,
    pub executables: Executables,
}

impl EngineConfig {
    pub fn new(tmp_path: impl Into<PathBuf>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            tmp_path: tmp_path.into(),
            log_dir: log_dir.into(),
            concurrency_mode: ConcurrencyMode::default(),
            executables: Executables::default(),
        }
    }

    pub fn with_concurrency_mode(mut self, mode: ConcurrencyMode) -> Self {
        self.concurrency_mode = mode;
        self
    }

    pub fn tmp_path(&self) -> &Path {
        &self.tmp_path
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
