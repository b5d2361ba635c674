// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ty-core: data model shared by the task runner, storage and daemon crates

pub mod macros;

pub mod access_key;
pub mod clock;
pub mod environment;
pub mod event;
pub mod project;
pub mod secret;
pub mod task;

pub use access_key::{AccessKey, AccessKeyError, AccessKeyType, KeySecret};
pub use clock::{Clock, FakeClock, SystemClock};
pub use environment::{command_environment, parse_environment, Environment, ENV_KEY};
pub use event::{Event, TASK_OBJECT_TYPE};
pub use project::{
    GitSource, Inventory, InventoryKind, Project, Repository, Template, User, DEFAULT_GIT_REF,
};
pub use secret::{SecretCipher, SecretError};
pub use task::{resolve_status, StatusTransitionError, Task, TaskStatus, TaskUpdate};

#[cfg(any(test, feature = "test-support"))]
pub use project::TemplateBuilder;
#[cfg(any(test, feature = "test-support"))]
pub use task::TaskBuilder;
