// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! The `tyd` daemon: owns the store, the task pool, and the process
//! lifecycle around them.

pub mod config;
pub mod env;
pub mod lifecycle;
pub mod logging;
pub mod queue;

pub use config::{AlertSink, ConfigError, FileConfig};
pub use lifecycle::{startup, Config, DaemonState, LifecycleError};
pub use queue::QueueLoop;
