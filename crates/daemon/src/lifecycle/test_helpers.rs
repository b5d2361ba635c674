// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::Config;
pub(crate) use crate::config::{AlertSink, FileConfig};
pub(crate) use serial_test::serial;
pub(crate) use std::path::Path;
pub(crate) use tempfile::tempdir;
pub(crate) use ty_core::{AccessKey, KeySecret, Task, TaskStatus};
pub(crate) use ty_storage::Store;

/// Config rooted at `dir` with alerts disabled.
pub(crate) fn test_config(dir: &Path) -> Config {
    Config::resolve(
        dir.to_path_buf(),
        FileConfig { alerts: AlertSink::Off, ..FileConfig::default() },
    )
}

pub(crate) fn task_with(status: TaskStatus) -> Task {
    Task::builder().id(0).project_id(1).status(status).build()
}
