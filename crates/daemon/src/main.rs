// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tyd`: runs queued playbook tasks until SIGTERM or SIGINT.

use std::process::ExitCode;
use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use ty_daemon::{logging, startup, Config, LifecycleError, QueueLoop};

fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("tyd: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Guard flushes the file writer when main returns
    let _log_guard = match logging::init(&config.logs_path) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("tyd: {e}");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to start tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "daemon exited with error");
            eprintln!("tyd: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), LifecycleError> {
    let mut daemon = startup(&config).await?;
    info!(pid = std::process::id(), version = env!("CARGO_PKG_VERSION"), "tyd ready");

    let shutdown = CancellationToken::new();
    let queue = QueueLoop::new(
        Arc::new(daemon.store.clone()),
        daemon.pool.clone(),
        config.queue_poll,
    );
    let queue = tokio::spawn(queue.run(shutdown.clone()));

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut snapshots = tokio::time::interval(config.snapshot_interval);
    // First tick completes immediately
    snapshots.tick().await;

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("received SIGTERM");
                break;
            }
            _ = sigint.recv() => {
                info!("received SIGINT");
                break;
            }
            _ = snapshots.tick() => {
                if let Err(e) = daemon.save_snapshot() {
                    warn!(error = %e, "failed to save periodic snapshot");
                }
            }
        }
    }

    shutdown.cancel();
    if let Err(e) = queue.await {
        warn!(error = %e, "queue loop panicked");
    }
    daemon.shutdown().await
}
