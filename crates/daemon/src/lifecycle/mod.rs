// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, snapshots, shutdown.

mod reconcile;
mod startup;
pub use reconcile::stranded_tasks;
pub use startup::startup;

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};
use ty_adapters::{NotifyError, SubscriptionHub};
use ty_core::{Clock, SecretCipher};
use ty_engine::{ConcurrencyMode, EngineConfig, Executables, TaskPool};
use ty_storage::{MemStore, Snapshot, StoreError};

use crate::config::{AlertSink, ConfigError, FileConfig, WebhookConfig};
use crate::env;

const DEFAULT_QUEUE_POLL: Duration = Duration::from_millis(1000);
const DEFAULT_SNAPSHOT_INTERVAL: Duration = Duration::from_secs(60);

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/ty)
    pub state_dir: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to snapshot file
    pub snapshot_path: PathBuf,
    /// Daemon log files and per-task activity logs
    pub logs_path: PathBuf,
    /// Working root for repositories, inventories and key files
    pub tmp_path: PathBuf,
    pub concurrency_mode: ConcurrencyMode,
    pub executables: Executables,
    pub cipher: SecretCipher,
    pub alerts: AlertSink,
    pub webhook: WebhookConfig,
    pub queue_poll: Duration,
    pub snapshot_interval: Duration,
}

impl Config {
    /// Load configuration for the daemon.
    ///
    /// Reads `config.toml` (if any), then applies environment overrides.
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = env::state_dir()?;
        let file = FileConfig::load(&env::config_path(&state_dir))?;
        Ok(Self::resolve(state_dir, file))
    }

    /// Combine the file settings with environment overrides.
    pub fn resolve(state_dir: PathBuf, file: FileConfig) -> Self {
        let tmp_path = env::tmp_path()
            .or(file.tmp_path)
            .unwrap_or_else(|| state_dir.join("tmp"));
        let concurrency_mode =
            env::concurrency_mode().or(file.concurrency_mode).unwrap_or_default();
        let queue_poll = env::queue_poll()
            .or(file.queue_poll_ms.filter(|ms| *ms > 0).map(Duration::from_millis))
            .unwrap_or(DEFAULT_QUEUE_POLL);
        let snapshot_interval = file
            .snapshot_interval_secs
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_SNAPSHOT_INTERVAL);

        Self {
            lock_path: state_dir.join("daemon.pid"),
            snapshot_path: state_dir.join("snapshot.json"),
            logs_path: state_dir.join("logs"),
            tmp_path,
            concurrency_mode,
            executables: file.executables,
            cipher: SecretCipher::from_optional(env::secret_key().as_deref()),
            alerts: file.alerts,
            webhook: file.webhook,
            queue_poll,
            snapshot_interval,
            state_dir,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::new(&self.tmp_path, &self.logs_path)
            .with_concurrency_mode(self.concurrency_mode);
        config.executables = self.executables.clone();
        config
    }
}

/// Daemon state during operation.
pub struct DaemonState {
    /// Configuration
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub store: MemStore,
    /// Live update connections
    pub hub: Arc<SubscriptionHub>,
    pub pool: TaskPool,
    /// When daemon started
    pub start_time: Instant,
    /// Tasks a previous run left mid-flight
    pub stranded: Vec<i64>,
}

impl DaemonState {
    /// Write the store to the snapshot file.
    pub fn save_snapshot(&self) -> Result<(), LifecycleError> {
        let snapshot = Snapshot::new(self.store.state(), self.pool.context().clock.now());
        ty_storage::save_snapshot(&self.config.snapshot_path, &snapshot)?;
        Ok(())
    }

    /// Shutdown the daemon gracefully.
    ///
    /// Active tasks are stopped and awaited so their final status reaches the
    /// snapshot.
    pub async fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        let active = self.pool.active_ids();
        if !active.is_empty() {
            info!(count = active.len(), "stopping active tasks");
        }
        self.pool.shutdown().await;

        if let Err(e) = self.save_snapshot() {
            warn!(error = %e, "failed to save shutdown snapshot");
        }

        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!(error = %e, "failed to remove lock file");
            }
        }

        info!(uptime_secs = self.start_time.elapsed().as_secs(), "daemon shutdown complete");
        Ok(())
    }
}

/// Errors that can occur during daemon lifecycle
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] ty_storage::SnapshotError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Alert setup failed: {0}")]
    Alerts(#[from] NotifyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod test_helpers;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
