// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project-scoped entities a task references: templates, inventories,
//! repositories, and the users subscribed to live updates.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Git ref used when a repository URL carries no `#ref` suffix.
pub const DEFAULT_GIT_REF: &str = "master";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    /// Send mail alerts when a task fails
    #[serde(default)]
    pub alert: bool,
    /// Chat destination for failure alerts
    #[serde(default)]
    pub alert_chat: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Reusable job definition binding a playbook to an inventory and repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: i64,
    pub project_id: i64,
    pub alias: String,
    pub playbook: String,
    pub inventory_id: i64,
    pub repository_id: i64,
    #[serde(default)]
    pub environment_id: Option<i64>,
    /// Access key whose password unlocks vault-encrypted files
    #[serde(default)]
    pub vault_key_id: Option<i64>,
    /// JSON-encoded list of extra executor arguments
    #[serde(default)]
    pub arguments: Option<String>,
    /// Template arguments replace the computed argv (and no playbook is appended)
    #[serde(default)]
    pub override_arguments: bool,
}

crate::builder! {
    pub struct TemplateBuilder => Template {
        into {
            alias: String = "deploy",
            playbook: String = "site.yml",
        }
        set {
            id: i64 = 1,
            project_id: i64 = 1,
            inventory_id: i64 = 1,
            repository_id: i64 = 1,
            override_arguments: bool = false,
        }
        option {
            environment_id: i64 = None,
            vault_key_id: i64 = None,
            arguments: String = None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryKind {
    /// `inventory` is a path readable by the executor
    File,
    /// `inventory` is inline text materialised per task
    #[default]
    #[serde(other)]
    Static,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: InventoryKind,
    /// Stored path for `file` inventories, inline text otherwise
    pub inventory: String,
    #[serde(default)]
    pub ssh_key_id: Option<i64>,
    #[serde(default)]
    pub become_key_id: Option<i64>,
}

impl Inventory {
    /// Path handed to the executor with `-i`.
    pub fn path_for_task(&self, tmp: &Path, task_id: i64) -> PathBuf {
        match self.kind {
            InventoryKind::File => PathBuf::from(&self.inventory),
            InventoryKind::Static => tmp.join(format!("inventory_{task_id}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    /// Remote URL with an optional `#branch-or-tag` suffix
    pub git_url: String,
    pub ssh_key_id: i64,
}

impl Repository {
    pub fn source(&self) -> GitSource {
        GitSource::parse(&self.git_url)
    }
}

/// A repository URL split into remote and ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitSource {
    pub url: String,
    pub reference: String,
}

impl GitSource {
    /// Split `url#ref` into its parts; a bare URL tracks [`DEFAULT_GIT_REF`].
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('#') {
            Some((url, reference)) => {
                let reference = reference.split('#').next().unwrap_or(reference);
                Self { url: url.to_string(), reference: reference.to_string() }
            }
            None => Self { url: raw.to_string(), reference: DEFAULT_GIT_REF.to_string() },
        }
    }
}

#[cfg(test)]
#[path = "project_tests.rs"]
mod tests;
