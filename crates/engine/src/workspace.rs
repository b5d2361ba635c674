// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-template working copies under the tmp root.
//!
//! Layout:
//!
//! ```text
//! <tmp>/
//!   repository_<repoId>_<templateId>/   cloned source
//!     roles/requirements.yml            role manifest (optional)
//!     requirements.md5                  digest of the last installed manifest
//!   inventory_<taskId>                  materialised inline inventory
//!   access_key_<keyId>                  0600 key files
//! ```
//!
//! Directories are shared by every task of a template; callers must hold the
//! arbiter slot.

use md5::{Digest, Md5};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use ty_adapters::subprocess::{GALAXY_INSTALL_TIMEOUT, GIT_SYNC_TIMEOUT};
use ty_adapters::{CommandOutput, CommandRunner, CommandSpec};
use ty_core::{AccessKey, Inventory, InventoryKind, KeySecret, Repository};

use crate::config::Executables;
use crate::credentials::write_private;
use crate::error::TaskFailure;
use crate::playbook::process_env;
use crate::task_logger::TaskLog;

pub const REQUIREMENTS_FILE: &str = "roles/requirements.yml";
pub const REQUIREMENTS_DIGEST_FILE: &str = "requirements.md5";

/// What the repository sync did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Cloned,
    Pulled,
}

/// What the role install step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequirementsOutcome {
    /// No `roles/requirements.yml` in the repository
    Missing,
    /// Digest matched the last successful install
    Unchanged,
    Installed,
}

/// Directory a template's repository is cloned into.
pub fn repository_dir(tmp: &Path, repository_id: i64, template_id: i64) -> PathBuf {
    tmp.join(format!("repository_{repository_id}_{template_id}"))
}

/// Create the tmp root (mode 0700) if it does not exist.
pub async fn ensure_tmp_dir(tmp: &Path) -> Result<(), TaskFailure> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o700);
    builder
        .create(tmp)
        .await
        .map_err(|e| TaskFailure::io(format!("creating tmp dir {}", tmp.display()), e))
}

/// Key file git should authenticate with, if any.
///
/// Only `ssh` and `none` keys can be used for repository access.
pub fn ssh_envelope(key: &AccessKey, tmp: &Path) -> Result<Option<PathBuf>, TaskFailure> {
    match key.secret {
        KeySecret::Ssh { .. } => Ok(Some(key.path(tmp))),
        KeySecret::None => Ok(None),
        KeySecret::LoginPassword { .. } => Err(TaskFailure::UnsupportedCredential(format!(
            "unsupported access key type: {}",
            key.key_type()
        ))),
    }
}

/// MD5 of a file's contents as lowercase hex.
pub async fn file_md5(path: &Path) -> std::io::Result<String> {
    let contents = tokio::fs::read(path).await?;
    let mut hasher = Md5::new();
    hasher.update(&contents);
    Ok(format!("{:x}", hasher.finalize()))
}

/// True unless the stored digest matches the manifest. Any read failure
/// counts as a change.
pub async fn requirements_changed(manifest: &Path, digest_file: &Path) -> bool {
    let Ok(stored) = tokio::fs::read_to_string(digest_file).await else {
        return true;
    };
    match file_md5(manifest).await {
        Ok(current) => stored.trim() != current,
        Err(_) => true,
    }
}

pub(crate) fn check_exit(command: &str, output: CommandOutput) -> Result<CommandOutput, TaskFailure> {
    if output.success() {
        Ok(output)
    } else {
        Err(TaskFailure::ExternalCommandFailed {
            command: command.to_string(),
            code: output.code,
            stderr: output.stderr.trim().to_string(),
        })
    }
}

/// Repository checkout and role dependencies for one template.
pub struct WorkspaceManager {
    tmp: PathBuf,
    executables: Executables,
    commands: Arc<dyn CommandRunner>,
}

impl WorkspaceManager {
    pub fn new(
        tmp: impl Into<PathBuf>,
        executables: Executables,
        commands: Arc<dyn CommandRunner>,
    ) -> Self {
        Self { tmp: tmp.into(), executables, commands }
    }

    pub fn tmp(&self) -> &Path {
        &self.tmp
    }

    /// Clone the repository into `repo_dir`, or pull the configured ref if a
    /// checkout already exists.
    pub async fn sync_repository(
        &self,
        repository: &Repository,
        repository_key: &AccessKey,
        repo_dir: &Path,
        environment: Option<&str>,
        log: TaskLog<'_>,
    ) -> Result<SyncAction, TaskFailure> {
        let ssh_key = ssh_envelope(repository_key, &self.tmp)?;
        let source = repository.source();

        let exists = tokio::fs::try_exists(repo_dir)
            .await
            .map_err(|e| TaskFailure::io(format!("checking {}", repo_dir.display()), e))?;

        let (action, cwd, args) = if exists {
            log.line(&format!("Updating repository {}", source.url));
            (SyncAction::Pulled, repo_dir.to_path_buf(), vec!["pull", "origin", source.reference.as_str()])
        } else {
            log.line(&format!("Cloning repository {}", source.url));
            let name = repo_dir.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            let args = vec![
                "clone",
                "--recursive",
                "--branch",
                source.reference.as_str(),
                source.url.as_str(),
                name,
            ];
            (SyncAction::Cloned, self.tmp.clone(), args)
        };

        let spec = CommandSpec::new(&self.executables.git, &cwd)
            .args(args)
            .envs(process_env(&self.tmp, &cwd, environment, ssh_key.as_deref()));
        log.command(&spec);
        let output = self.commands.output(&spec, GIT_SYNC_TIMEOUT).await?;
        log.output(&output.stdout);
        log.output(&output.stderr);
        let command = match action {
            SyncAction::Cloned => "git clone",
            SyncAction::Pulled => "git pull",
        };
        check_exit(command, output)?;
        Ok(action)
    }

    /// Install role dependencies when the manifest changed since the last
    /// successful install, then record its digest.
    pub async fn install_requirements(
        &self,
        repository_key: &AccessKey,
        repo_dir: &Path,
        environment: Option<&str>,
        log: TaskLog<'_>,
    ) -> Result<RequirementsOutcome, TaskFailure> {
        let manifest = repo_dir.join(REQUIREMENTS_FILE);
        let digest_file = repo_dir.join(REQUIREMENTS_DIGEST_FILE);

        if !tokio::fs::try_exists(&manifest).await.unwrap_or(false) {
            log.line("No roles/requirements.yml file found. Skip galaxy install process.");
            return Ok(RequirementsOutcome::Missing);
        }
        if !requirements_changed(&manifest, &digest_file).await {
            log.line("roles/requirements.yml has no changes. Skip galaxy install process.");
            return Ok(RequirementsOutcome::Unchanged);
        }

        let ssh_key = ssh_envelope(repository_key, &self.tmp)?;
        let spec = CommandSpec::new(&self.executables.galaxy, repo_dir)
            .args(["install", "-r", REQUIREMENTS_FILE, "--force"])
            .envs(process_env(&self.tmp, repo_dir, environment, ssh_key.as_deref()));
        log.command(&spec);
        let output = self.commands.output(&spec, GALAXY_INSTALL_TIMEOUT).await?;
        log.output(&output.stdout);
        log.output(&output.stderr);
        check_exit("ansible-galaxy install", output)?;

        let digest = file_md5(&manifest)
            .await
            .map_err(|e| TaskFailure::io("hashing roles/requirements.yml", e))?;
        tokio::fs::write(&digest_file, digest)
            .await
            .map_err(|e| TaskFailure::io(format!("writing {}", digest_file.display()), e))?;
        Ok(RequirementsOutcome::Installed)
    }

    /// Path of the inventory for `task_id`, writing inline inventories to
    /// the tmp root first.
    pub async fn install_inventory(
        &self,
        inventory: &Inventory,
        task_id: i64,
    ) -> Result<PathBuf, TaskFailure> {
        let path = inventory.path_for_task(&self.tmp, task_id);
        if inventory.kind == InventoryKind::Static {
            write_private(&path, inventory.inventory.as_bytes())
                .await
                .map_err(|e| TaskFailure::io(format!("writing inventory {}", path.display()), e))?;
        }
        Ok(path)
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
