// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Storage layer: the `Store` interface the task runner consumes, and an
//! in-memory implementation persisted through JSON snapshots.

mod memory;
mod snapshot;
mod store;

pub use memory::{AccessKeyRecord, MemStore, StoreState};
pub use snapshot::{load_snapshot, save_snapshot, Snapshot, SnapshotError, CURRENT_SNAPSHOT_VERSION};
pub use store::{RetrieveQueryParams, Store, StoreError};
