// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ty-engine: task execution core.
//!
//! A [`TaskPool`] owns one [`TaskRunner`] per submitted task. Runners queue
//! on the [`Arbiter`], stage credentials and the template's working copy,
//! then supervise the playbook executor.

pub mod arbiter;
pub mod config;
pub mod credentials;
pub mod error;
pub mod playbook;
pub mod pool;
pub mod runner;
pub mod supervisor;
pub mod task_logger;
pub mod workspace;

#[cfg(test)]
mod test_support;

pub use arbiter::{Arbiter, ArbiterScope, SlotGuard};
pub use config::{ConcurrencyMode, EngineConfig, Executables};
pub use error::{InfrastructureError, PoolError, RunError, TaskFailure};
pub use pool::{TaskHandle, TaskPool};
pub use runner::{EngineContext, TaskRunner};
pub use supervisor::{Supervisor, TaskControl};
pub use task_logger::{TaskLog, TaskLogger};
pub use workspace::{RequirementsOutcome, SyncAction, WorkspaceManager};
