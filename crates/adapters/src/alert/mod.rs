// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Failure alerts for projects that opt in.

mod webhook;
pub use webhook::WebhookAlertAdapter;

use async_trait::async_trait;
use thiserror::Error;
use ty_core::TaskStatus;

/// Errors from alert delivery
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("send failed: {0}")]
    SendFailed(String),
    #[error("no {channel} endpoint configured")]
    NotConfigured { channel: &'static str },
    #[error("{channel} endpoint answered {status}")]
    Rejected { channel: &'static str, status: u16 },
}

/// What an alert reports: one task reaching a failure status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub task_id: i64,
    pub project_id: i64,
    pub project_name: String,
    pub template_alias: String,
    pub status: TaskStatus,
    /// Mail addresses of the project's users
    pub recipients: Vec<String>,
}

impl Alert {
    pub fn title(&self) -> String {
        format!("Task {} failed", self.task_id)
    }

    pub fn body(&self) -> String {
        format!(
            "{}: template {} finished - {}",
            self.project_name,
            self.template_alias,
            self.status.to_string().to_uppercase()
        )
    }
}

/// Delivery channels for failure alerts.
///
/// Callers treat every error as best-effort: it is logged, never fatal.
#[async_trait]
pub trait AlertAdapter: Send + Sync + 'static {
    async fn send_mail(&self, alert: &Alert) -> Result<(), NotifyError>;

    async fn send_chat(&self, chat_id: &str, alert: &Alert) -> Result<(), NotifyError>;
}

/// Mirrors alerts as popups on the daemon host.
///
/// Nothing is mailed or posted: both channels end in a local notification,
/// which suits a single-operator install. [`WebhookAlertAdapter`] delivers.
///
/// On macOS, `notify-rust` goes through `mac-notification-sys`, whose first
/// call runs an AppleScript bundle lookup that blocks forever in a daemon
/// without Automation permission. The bundle identifier is pre-set at
/// construction to skip it.
#[derive(Clone, Copy, Debug, Default)]
pub struct DesktopPopupAdapter;

impl DesktopPopupAdapter {
    pub fn new() -> Self {
        #[cfg(target_os = "macos")]
        {
            let _ = mac_notification_sys::set_application("com.apple.Terminal");
        }
        Self
    }

    fn show(summary: String, body: String) {
        // Notification::show() is synchronous on some platforms
        tokio::task::spawn_blocking(move || {
            match notify_rust::Notification::new().summary(&summary).body(&body).show() {
                Ok(_) => tracing::info!(%summary, "alert popup shown"),
                Err(e) => tracing::warn!(%summary, error = %e, "alert popup failed"),
            }
        });
    }
}

#[async_trait]
impl AlertAdapter for DesktopPopupAdapter {
    async fn send_mail(&self, alert: &Alert) -> Result<(), NotifyError> {
        tracing::info!(task_id = alert.task_id, "showing mail alert locally");
        Self::show(alert.title(), alert.body());
        Ok(())
    }

    async fn send_chat(&self, chat_id: &str, alert: &Alert) -> Result<(), NotifyError> {
        tracing::info!(task_id = alert.task_id, %chat_id, "showing chat alert locally");
        Self::show(format!("[{chat_id}] {}", alert.title()), alert.body());
        Ok(())
    }
}

/// Logs alerts without delivering them.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopAlertAdapter;

#[async_trait]
impl AlertAdapter for NoopAlertAdapter {
    async fn send_mail(&self, alert: &Alert) -> Result<(), NotifyError> {
        tracing::info!(task_id = alert.task_id, "mail alert suppressed (alerts disabled)");
        Ok(())
    }

    async fn send_chat(&self, chat_id: &str, alert: &Alert) -> Result<(), NotifyError> {
        tracing::info!(task_id = alert.task_id, %chat_id, "chat alert suppressed (alerts disabled)");
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{Alert, AlertAdapter, NotifyError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Recorded alert delivery
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum AlertCall {
        Mail(Alert),
        Chat { chat_id: String, alert: Alert },
    }

    #[derive(Default)]
    struct FakeAlertState {
        calls: Vec<AlertCall>,
        fail: bool,
    }

    /// Fake alert adapter for testing
    #[derive(Clone, Default)]
    pub struct FakeAlertAdapter {
        inner: Arc<Mutex<FakeAlertState>>,
    }

    impl FakeAlertAdapter {
        pub fn new() -> Self {
            Self::default()
        }

        /// Get all recorded deliveries
        pub fn calls(&self) -> Vec<AlertCall> {
            self.inner.lock().calls.clone()
        }

        /// Make every delivery fail (calls are still recorded)
        pub fn fail_sends(&self) {
            self.inner.lock().fail = true;
        }

        fn record(&self, call: AlertCall) -> Result<(), NotifyError> {
            let mut inner = self.inner.lock();
            inner.calls.push(call);
            if inner.fail {
                return Err(NotifyError::SendFailed("fake failure".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl AlertAdapter for FakeAlertAdapter {
        async fn send_mail(&self, alert: &Alert) -> Result<(), NotifyError> {
            self.record(AlertCall::Mail(alert.clone()))
        }

        async fn send_chat(&self, chat_id: &str, alert: &Alert) -> Result<(), NotifyError> {
            self.record(AlertCall::Chat { chat_id: chat_id.to_string(), alert: alert.clone() })
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{AlertCall, FakeAlertAdapter};

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
