// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and initialization logic.

use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use fs2::FileExt;
use tracing::{info, warn};
use ty_adapters::{
    AlertAdapter, DesktopPopupAdapter, NoopAlertAdapter, RealCommandRunner, SubscriptionHub,
    WebhookAlertAdapter,
};
use ty_core::SystemClock;
use ty_engine::{Arbiter, EngineContext, TaskLogger, TaskPool};
use ty_storage::{load_snapshot, MemStore};

use super::{reconcile, Config, DaemonState, LifecycleError};
use crate::config::AlertSink;

/// Start the daemon
pub async fn startup(config: &Config) -> Result<DaemonState, LifecycleError> {
    match startup_inner(config).await {
        Ok(state) => Ok(state),
        Err(e) => {
            // Nothing to clean up after a failed lock:
            // the PID file belongs to the already-running daemon.
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(config);
            }
            Err(e)
        }
    }
}

/// Inner startup logic - cleanup_on_failure called if this fails
async fn startup_inner(config: &Config) -> Result<DaemonState, LifecycleError> {
    // 1. Create state directory (needed for the lock)
    std::fs::create_dir_all(&config.state_dir)?;

    // 2. Acquire lock file FIRST - prevents races
    // Open without truncating so a running daemon's PID survives a failed attempt.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;

    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    // 3. Create directories
    std::fs::create_dir_all(&config.logs_path)?;
    std::fs::create_dir_all(&config.tmp_path)?;

    // 4. Load state from snapshot (if exists)
    let state = match load_snapshot(&config.snapshot_path)? {
        Some(snapshot) => {
            info!(
                tasks = snapshot.state.tasks.len(),
                created_at = %snapshot.created_at,
                "loaded snapshot"
            );
            snapshot.state
        }
        None => {
            info!("No snapshot found, starting with empty state");
            Default::default()
        }
    };
    let store = MemStore::from_state(state, config.cipher.clone());

    // 5. Wire the engine
    let hub = Arc::new(SubscriptionHub::default());
    let alerts = alert_adapter(config)?;
    let ctx = EngineContext {
        store: Arc::new(store.clone()),
        broadcaster: hub.clone(),
        alerts,
        commands: Arc::new(RealCommandRunner),
        clock: Arc::new(SystemClock),
        arbiter: Arbiter::spawn(),
        logger: Arc::new(TaskLogger::new(&config.logs_path)),
        config: Arc::new(config.engine_config()),
    };
    let pool = TaskPool::new(ctx);

    // 6. Report tasks a previous run left behind
    let stranded = reconcile::stranded_tasks(&store).await?;

    info!(
        state_dir = %config.state_dir.display(),
        mode = %config.concurrency_mode,
        encrypted_secrets = config.cipher.is_encrypted(),
        "daemon started"
    );

    Ok(DaemonState {
        config: config.clone(),
        lock_file,
        store,
        hub,
        pool,
        start_time: Instant::now(),
        stranded,
    })
}

fn alert_adapter(config: &Config) -> Result<Arc<dyn AlertAdapter>, LifecycleError> {
    let adapter: Arc<dyn AlertAdapter> = match config.alerts {
        AlertSink::Desktop => Arc::new(DesktopPopupAdapter::new()),
        AlertSink::Webhook => {
            let webhook = &config.webhook;
            if webhook.mail_url.is_none() && webhook.chat_url.is_none() {
                warn!("alerts = \"webhook\" but no [webhook] endpoint is set");
            }
            Arc::new(WebhookAlertAdapter::new(
                webhook.mail_url.clone(),
                webhook.chat_url.clone(),
                Duration::from_secs(webhook.timeout_secs.max(1)),
            )?)
        }
        AlertSink::Off => Arc::new(NoopAlertAdapter),
    };
    info!(sink = ?config.alerts, "alert delivery configured");
    Ok(adapter)
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config) {
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
