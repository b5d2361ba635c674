// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Access keys: typed credentials used for repository and host access.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Secret material of an access key, discriminated by credential type.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KeySecret {
    None,
    Ssh {
        private_key: String,
        #[serde(default)]
        passphrase: String,
    },
    LoginPassword {
        #[serde(default)]
        login: String,
        password: String,
    },
}

// Hand-written so secret material never reaches logs.
impl std::fmt::Debug for KeySecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySecret::None => f.write_str("None"),
            KeySecret::Ssh { passphrase, .. } => f
                .debug_struct("Ssh")
                .field("private_key", &"<redacted>")
                .field("has_passphrase", &!passphrase.is_empty())
                .finish(),
            KeySecret::LoginPassword { login, .. } => f
                .debug_struct("LoginPassword")
                .field("login", login)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// Tag-only view of [`KeySecret`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessKeyType {
    None,
    Ssh,
    LoginPassword,
}

crate::simple_display! {
    AccessKeyType {
        None => "none",
        Ssh => "ssh",
        LoginPassword => "login_password",
    }
}

impl KeySecret {
    pub fn key_type(&self) -> AccessKeyType {
        match self {
            KeySecret::None => AccessKeyType::None,
            KeySecret::Ssh { .. } => AccessKeyType::Ssh,
            KeySecret::LoginPassword { .. } => AccessKeyType::LoginPassword,
        }
    }
}

/// Rejected key material.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessKeyError {
    #[error("ssh key {0} has no private key")]
    MissingPrivateKey(i64),
    #[error("login/password key {0} has no password")]
    MissingPassword(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessKey {
    pub id: i64,
    pub name: String,
    /// `None` for global keys
    pub project_id: Option<i64>,
    pub secret: KeySecret,
}

impl AccessKey {
    /// A key that carries no material.
    pub fn none(id: i64) -> Self {
        Self { id, name: String::new(), project_id: None, secret: KeySecret::None }
    }

    pub fn key_type(&self) -> AccessKeyType {
        self.secret.key_type()
    }

    /// Deterministic on-disk location used when the key is materialised.
    pub fn path(&self, tmp: &Path) -> PathBuf {
        tmp.join(format!("access_key_{}", self.id))
    }

    /// Check that the secret has the material its type requires.
    pub fn validate(&self) -> Result<(), AccessKeyError> {
        match &self.secret {
            KeySecret::Ssh { private_key, .. } if private_key.trim().is_empty() => {
                Err(AccessKeyError::MissingPrivateKey(self.id))
            }
            KeySecret::LoginPassword { password, .. } if password.is_empty() => {
                Err(AccessKeyError::MissingPassword(self.id))
            }
            _ => Ok(()),
        }
    }

    /// Copy with secret material blanked, for display to users.
    pub fn redacted(&self) -> Self {
        let secret = match &self.secret {
            KeySecret::None => KeySecret::None,
            KeySecret::Ssh { .. } => {
                KeySecret::Ssh { private_key: String::new(), passphrase: String::new() }
            }
            KeySecret::LoginPassword { login, .. } => {
                KeySecret::LoginPassword { login: login.clone(), password: String::new() }
            }
        };
        Self { secret, ..self.clone() }
    }
}

#[cfg(test)]
#[path = "access_key_tests.rs"]
mod tests;
