// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Access key secret blobs.
//!
//! A secret is stored as base64 text. Without a configured passphrase the
//! payload is the JSON form of [`KeySecret`]; with one, it is
//! `nonce || AES-256-GCM(json)`.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::access_key::KeySecret;

const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("secret payload is malformed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("secret encryption failed")]
    Encrypt,
    #[error("secret decryption failed (wrong key or corrupted data)")]
    Decrypt,
}

/// Seals and opens access key secrets.
#[derive(Clone, Default)]
pub enum SecretCipher {
    #[default]
    Plain,
    Aes(Box<Aes256Gcm>),
}

impl std::fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretCipher::Plain => f.write_str("SecretCipher::Plain"),
            SecretCipher::Aes(_) => f.write_str("SecretCipher::Aes"),
        }
    }
}

impl SecretCipher {
    /// Derive an AES-256 key from a passphrase.
    pub fn from_passphrase(passphrase: &str) -> Self {
        let key: [u8; 32] = Sha256::digest(passphrase.as_bytes()).into();
        SecretCipher::Aes(Box::new(Aes256Gcm::new(&key.into())))
    }

    /// Cipher for an optional configured passphrase.
    pub fn from_optional(passphrase: Option<&str>) -> Self {
        match passphrase {
            Some(p) if !p.is_empty() => Self::from_passphrase(p),
            _ => SecretCipher::Plain,
        }
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, SecretCipher::Aes(_))
    }

    pub fn seal(&self, secret: &KeySecret) -> Result<String, SecretError> {
        let json = serde_json::to_vec(secret)?;
        let payload = match self {
            SecretCipher::Plain => json,
            SecretCipher::Aes(cipher) => {
                let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
                let ciphertext =
                    cipher.encrypt(&nonce, json.as_slice()).map_err(|_| SecretError::Encrypt)?;
                let mut out = nonce.to_vec();
                out.extend_from_slice(&ciphertext);
                out
            }
        };
        Ok(base64::engine::general_purpose::STANDARD.encode(payload))
    }

    pub fn open(&self, blob: &str) -> Result<KeySecret, SecretError> {
        let data = base64::engine::general_purpose::STANDARD.decode(blob.trim())?;
        let json = match self {
            SecretCipher::Plain => data,
            SecretCipher::Aes(cipher) => {
                if data.len() < NONCE_LEN {
                    return Err(SecretError::Decrypt);
                }
                let (nonce, ciphertext) = data.split_at(NONCE_LEN);
                cipher
                    .decrypt(Nonce::from_slice(nonce), ciphertext)
                    .map_err(|_| SecretError::Decrypt)?
            }
        };
        Ok(serde_json::from_slice(&json)?)
    }
}

#[cfg(test)]
#[path = "secret_tests.rs"]
mod tests;
