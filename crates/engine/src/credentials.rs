// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ephemeral credential files.
//!
//! Keys are written to their deterministic path under the tmp root with mode
//! 0600 and removed again during terminal cleanup.

use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use ty_core::{AccessKey, KeySecret};

use crate::error::TaskFailure;

/// Write `contents` to `path`, readable by the owner only.
pub(crate) async fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options.open(path).await?;
    file.write_all(contents).await?;
    file.flush().await?;
    // An existing file keeps its old mode through open()
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }
    Ok(())
}

/// Materialise an ssh key. Other key types need no file and yield `None`.
///
/// Passphrase-protected keys are rejected before anything is written.
pub async fn install_key(key: &AccessKey, tmp: &Path) -> Result<Option<PathBuf>, TaskFailure> {
    let KeySecret::Ssh { private_key, passphrase } = &key.secret else {
        return Ok(None);
    };
    if !passphrase.is_empty() {
        return Err(TaskFailure::UnsupportedCredential(format!(
            "access key {}: ssh key with passphrase not supported",
            key.name
        )));
    }
    let path = key.path(tmp);
    write_private(&path, private_key.as_bytes())
        .await
        .map_err(|e| TaskFailure::io(format!("writing access key {}", key.id), e))?;
    tracing::debug!(key_id = key.id, path = %path.display(), "access key installed");
    Ok(Some(path))
}

/// Write the vault password of `key` to its path.
pub async fn install_vault_password(key: &AccessKey, tmp: &Path) -> Result<PathBuf, TaskFailure> {
    let KeySecret::LoginPassword { password, .. } = &key.secret else {
        return Err(TaskFailure::UnsupportedCredential(format!(
            "vault key {} must be a login_password key, got {}",
            key.id,
            key.key_type()
        )));
    };
    let path = key.path(tmp);
    write_private(&path, password.as_bytes())
        .await
        .map_err(|e| TaskFailure::io(format!("writing vault password {}", key.id), e))?;
    Ok(path)
}

/// Remove a materialised key file. A missing file is fine; any other error
/// is logged and swallowed.
pub async fn destroy_key(key: &AccessKey, tmp: &Path) {
    remove_quietly(&key.path(tmp), "access key").await;
}

pub(crate) async fn remove_quietly(path: &Path, what: &str) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "{what} removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove {what}"),
    }
}

#[cfg(test)]
#[path = "credentials_tests.rs"]
mod tests;
