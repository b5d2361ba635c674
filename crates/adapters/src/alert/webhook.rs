// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP delivery for failure alerts.
//!
//! Mail goes to a relay endpoint as `{to, subject, body, ...}`. Chat goes to a
//! bot endpoint as `{chat_id, text}`, which is the shape of Telegram's
//! `sendMessage`.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

use super::{Alert, AlertAdapter, NotifyError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts alerts as JSON to a mail relay and a chat bot endpoint.
///
/// Either endpoint may be absent; sends on that channel then fail with
/// [`NotifyError::NotConfigured`].
#[derive(Clone, Debug)]
pub struct WebhookAlertAdapter {
    client: Client,
    mail_url: Option<String>,
    chat_url: Option<String>,
}

impl WebhookAlertAdapter {
    pub fn new(
        mail_url: Option<String>,
        chat_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::SendFailed(e.to_string()))?;
        Ok(Self { client, mail_url, chat_url })
    }

    async fn post(
        &self,
        channel: &'static str,
        url: Option<&str>,
        payload: serde_json::Value,
    ) -> Result<(), NotifyError> {
        let url = url.ok_or(NotifyError::NotConfigured { channel })?;
        let response = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::SendFailed(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected { channel, status: status.as_u16() });
        }
        Ok(())
    }
}

#[async_trait]
impl AlertAdapter for WebhookAlertAdapter {
    async fn send_mail(&self, alert: &Alert) -> Result<(), NotifyError> {
        if alert.recipients.is_empty() {
            return Err(NotifyError::SendFailed("no recipients with an email address".into()));
        }
        tracing::info!(task_id = alert.task_id, recipients = alert.recipients.len(), "sending mail alert");
        let payload = json!({
            "to": alert.recipients,
            "subject": alert.title(),
            "body": alert.body(),
            "task_id": alert.task_id,
            "project_id": alert.project_id,
            "status": alert.status,
        });
        self.post("mail", self.mail_url.as_deref(), payload).await
    }

    async fn send_chat(&self, chat_id: &str, alert: &Alert) -> Result<(), NotifyError> {
        tracing::info!(task_id = alert.task_id, %chat_id, "sending chat alert");
        let payload = json!({
            "chat_id": chat_id,
            "text": format!("{}\n{}", alert.title(), alert.body()),
        });
        self.post("chat", self.chat_url.as_deref(), payload).await
    }
}

#[cfg(test)]
#[path = "webhook_tests.rs"]
mod tests;
