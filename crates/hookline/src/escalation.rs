/*
 *  Copyright 2026 Hookline Developers
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Operator escalation for deliveries that could not be completed.
//!
//! When a task ends in `failed` the worker hands an [`EscalationMessage`] to
//! the [`EscalationNotifier`], which looks up operator contacts and pushes
//! the message through every configured [`EscalationChannel`]. Nothing in
//! here returns an error to the worker: channel and directory failures are
//! logged and reported in the [`EscalationReport`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::audit;
use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::error::EscalationError;
use crate::models::DeliveryTask;
use crate::partner::Partner;

/// Diagnostic sent to operators about a terminally failed task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationMessage {
    pub task_id: UniversalUuid,
    pub partner_id: String,
    pub partner_name: String,
    pub endpoint_url: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub last_error: Option<String>,
    pub last_response_status: Option<i32>,
    pub failed_at: UniversalTimestamp,
}

impl EscalationMessage {
    /// Builds the message from the task as it was after its final update.
    ///
    /// `partner` is `None` when the partner could not be found; the endpoint
    /// is then reported as unknown.
    pub fn for_task(task: &DeliveryTask, partner: Option<&Partner>) -> Self {
        Self {
            task_id: task.id,
            partner_id: task.partner_id.clone(),
            partner_name: partner
                .map(|p| p.display_name().to_string())
                .unwrap_or_else(|| task.partner_id.clone()),
            endpoint_url: partner
                .map(|p| p.endpoint_url.clone())
                .unwrap_or_else(|| "<unknown>".to_string()),
            attempts: task.attempts,
            max_attempts: task.max_attempts,
            last_error: task.last_error.clone(),
            last_response_status: task.last_response_status,
            failed_at: task.completed_at.unwrap_or(task.updated_at),
        }
    }

    pub fn subject(&self) -> String {
        format!(
            "Webhook delivery to {} failed after {} attempts",
            self.partner_name, self.attempts
        )
    }

    pub fn body(&self) -> String {
        let status = self
            .last_response_status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "none".to_string());
        format!(
            "Task:          {}\n\
             Partner:       {} ({})\n\
             Endpoint:      {}\n\
             Attempts:      {}/{}\n\
             Last status:   {}\n\
             Last error:    {}\n\
             Failed at:     {}\n",
            self.task_id,
            self.partner_name,
            self.partner_id,
            self.endpoint_url,
            self.attempts,
            self.max_attempts,
            status,
            self.last_error.as_deref().unwrap_or("none"),
            self.failed_at,
        )
    }
}

/// Someone to notify about failed deliveries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorContact {
    pub name: String,
    /// Email address, chat handle, or whatever the channel understands.
    pub address: String,
}

#[async_trait]
pub trait OperatorDirectory: Send + Sync {
    async fn operator_contacts(&self) -> Result<Vec<OperatorContact>, EscalationError>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticOperatorDirectory {
    contacts: Vec<OperatorContact>,
}

impl StaticOperatorDirectory {
    pub fn new(contacts: Vec<OperatorContact>) -> Self {
        Self { contacts }
    }
}

#[async_trait]
impl OperatorDirectory for StaticOperatorDirectory {
    async fn operator_contacts(&self) -> Result<Vec<OperatorContact>, EscalationError> {
        Ok(self.contacts.clone())
    }
}

/// Transport for escalation messages (email gateway, chat webhook, ...).
#[async_trait]
pub trait EscalationChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn send(
        &self,
        recipients: &[OperatorContact],
        message: &EscalationMessage,
    ) -> Result<(), EscalationError>;
}

/// Writes escalations to the log at error level.
#[derive(Debug, Clone, Default)]
pub struct LogChannel;

#[async_trait]
impl EscalationChannel for LogChannel {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(
        &self,
        recipients: &[OperatorContact],
        message: &EscalationMessage,
    ) -> Result<(), EscalationError> {
        let addresses: Vec<&str> = recipients.iter().map(|c| c.address.as_str()).collect();
        tracing::error!(
            task_id = %message.task_id,
            partner_id = %message.partner_id,
            endpoint = %message.endpoint_url,
            attempts = message.attempts,
            recipients = ?addresses,
            "{}\n{}",
            message.subject(),
            message.body()
        );
        Ok(())
    }
}

/// POSTs the escalation as JSON to an operator-facing webhook.
#[derive(Debug, Clone)]
pub struct WebhookChannel {
    client: reqwest::Client,
    url: String,
}

#[derive(Serialize)]
struct WebhookEscalation<'a> {
    subject: String,
    body: String,
    recipients: &'a [OperatorContact],
    delivery: &'a EscalationMessage,
}

impl WebhookChannel {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, EscalationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("hookline-escalation/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| EscalationError::Channel {
                channel: "webhook".to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl EscalationChannel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(
        &self,
        recipients: &[OperatorContact],
        message: &EscalationMessage,
    ) -> Result<(), EscalationError> {
        let payload = WebhookEscalation {
            subject: message.subject(),
            body: message.body(),
            recipients,
            delivery: message,
        };

        let channel_error = |message: String| EscalationError::Channel {
            channel: "webhook".to_string(),
            message,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| channel_error(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(channel_error(format!("HTTP {}", response.status().as_u16())))
        }
    }
}

/// Result of one channel dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelResult {
    pub channel: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EscalationReport {
    pub recipients: usize,
    pub channels: Vec<ChannelResult>,
}

impl EscalationReport {
    /// True if at least one channel accepted the message.
    pub fn delivered(&self) -> bool {
        self.channels.iter().any(|c| c.error.is_none())
    }
}

/// Fans an escalation out to every channel.
#[derive(Clone)]
pub struct EscalationNotifier {
    operators: Arc<dyn OperatorDirectory>,
    channels: Vec<Arc<dyn EscalationChannel>>,
}

impl std::fmt::Debug for EscalationNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.channels.iter().map(|c| c.name()).collect();
        f.debug_struct("EscalationNotifier")
            .field("channels", &names)
            .finish()
    }
}

impl EscalationNotifier {
    pub fn new(operators: Arc<dyn OperatorDirectory>) -> Self {
        Self {
            operators,
            channels: Vec::new(),
        }
    }

    pub fn with_channel(mut self, channel: Arc<dyn EscalationChannel>) -> Self {
        self.channels.push(channel);
        self
    }

    /// Notifier that only logs, with no operator contacts.
    pub fn log_only() -> Self {
        Self::new(Arc::new(StaticOperatorDirectory::default())).with_channel(Arc::new(LogChannel))
    }

    /// Dispatches `message`. Never fails.
    pub async fn escalate(&self, message: &EscalationMessage) -> EscalationReport {
        let recipients = match self.operators.operator_contacts().await {
            Ok(contacts) => contacts,
            Err(e) => {
                audit::log_escalation_failed(message.task_id, "operator_directory", &e.to_string());
                Vec::new()
            }
        };

        if recipients.is_empty() {
            tracing::warn!(task_id = %message.task_id, "No operator contacts for escalation");
        }

        let mut report = EscalationReport {
            recipients: recipients.len(),
            channels: Vec::with_capacity(self.channels.len()),
        };

        for channel in &self.channels {
            let error = match channel.send(&recipients, message).await {
                Ok(()) => {
                    audit::log_escalation_sent(message.task_id, channel.name(), recipients.len());
                    None
                }
                Err(e) => {
                    audit::log_escalation_failed(message.task_id, channel.name(), &e.to_string());
                    Some(e.to_string())
                }
            };
            report.channels.push(ChannelResult {
                channel: channel.name().to_string(),
                error,
            });
        }

        let outcome = if report.delivered() { "sent" } else { "failed" };
        metrics::counter!("hookline_escalations_total", "outcome" => outcome).increment(1);

        report
    }
}
