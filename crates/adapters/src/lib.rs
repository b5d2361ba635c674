// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Adapters for the outside world: live-update fan-out, failure alerts, and
//! external processes.

pub mod alert;
pub mod broadcast;
pub mod command;
pub mod subprocess;

pub use alert::{
    Alert, AlertAdapter, DesktopPopupAdapter, NoopAlertAdapter, NotifyError, WebhookAlertAdapter,
};
pub use broadcast::{Broadcaster, Subscription, SubscriptionHub, DEFAULT_CONNECTION_CAPACITY};
pub use command::{
    CommandOutput, CommandRunner, CommandSpec, ProcessExit, RealCommandRunner,
};
pub use subprocess::SubprocessError;

#[cfg(any(test, feature = "test-support"))]
pub use alert::{AlertCall, FakeAlertAdapter};
#[cfg(any(test, feature = "test-support"))]
pub use broadcast::FakeBroadcaster;
#[cfg(any(test, feature = "test-support"))]
pub use command::{CallKind, CommandCall, FakeCommandRunner, FakeGate, FakeResponse};
