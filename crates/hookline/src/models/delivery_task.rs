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

//! Delivery task model.
//!
//! A [`DeliveryTask`] is one queued webhook notification together with its
//! retry history. Rows are created by `enqueue`, changed only by a worker
//! holding the claim, and never deleted.
//!
//! These are API-level types; backend-specific models handle storage.

use serde::{Deserialize, Serialize};

use crate::backoff::RetryPolicy;
use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};

/// Attempt ceiling used when the caller does not choose one.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 5;

/// Longest `last_error` kept on a row.
const MAX_ERROR_LEN: usize = 1024;

/// Lifecycle state of a delivery task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Created, never attempted.
    Pending,
    /// Attempted at least once (or claimed), more attempts allowed.
    Retrying,
    /// Delivered with a 2xx response. Terminal.
    Success,
    /// Gave up. Terminal.
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Retrying => "retrying",
            DeliveryStatus::Success => "success",
            DeliveryStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(DeliveryStatus::Pending),
            "retrying" => Some(DeliveryStatus::Retrying),
            "success" => Some(DeliveryStatus::Success),
            "failed" => Some(DeliveryStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryStatus::Success | DeliveryStatus::Failed)
    }

    /// Statuses `claim_due` may pick up.
    pub fn claimable() -> [DeliveryStatus; 2] {
        [DeliveryStatus::Pending, DeliveryStatus::Retrying]
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A queued webhook notification (domain type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryTask {
    pub id: UniversalUuid,
    pub partner_id: String,
    /// Canonical JSON, byte-identical on every attempt.
    pub payload: String,
    pub status: DeliveryStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub next_retry_at: Option<UniversalTimestamp>,
    pub last_error: Option<String>,
    pub last_response_status: Option<i32>,
    pub last_response_time_ms: Option<i64>,
    /// End of the current claim lease, if the task is claimed.
    pub locked_until: Option<UniversalTimestamp>,
    /// Token of the claim currently allowed to record an outcome.
    pub claim_token: Option<UniversalUuid>,
    pub claimed_by: Option<String>,
    pub created_at: UniversalTimestamp,
    pub last_attempt_at: Option<UniversalTimestamp>,
    pub completed_at: Option<UniversalTimestamp>,
    pub updated_at: UniversalTimestamp,
}

impl DeliveryTask {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// True once a failed task has used every attempt.
    pub fn is_exhausted(&self) -> bool {
        self.status == DeliveryStatus::Failed && self.attempts >= self.max_attempts
    }
}

/// Input to `enqueue`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDeliveryTask {
    pub partner_id: String,
    pub payload: serde_json::Value,
    pub max_attempts: i32,
}

impl NewDeliveryTask {
    pub fn new(partner_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            partner_id: partner_id.into(),
            payload,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

/// Network-level failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    /// Endpoint URL could not be used at all.
    InvalidEndpoint,
    Other,
}

impl TransportErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::InvalidEndpoint => "invalid_endpoint",
            TransportErrorKind::Other => "other",
        }
    }
}

/// What happened when a worker tried to deliver a task once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttemptResult {
    /// 2xx response.
    Delivered {
        status_code: u16,
        response_time_ms: i64,
    },
    /// Any other HTTP status.
    Rejected {
        status_code: u16,
        response_time_ms: i64,
        body_excerpt: Option<String>,
    },
    /// No HTTP response was received.
    Transport {
        kind: TransportErrorKind,
        message: String,
        response_time_ms: i64,
    },
    /// The partner is unknown or inactive; nothing was sent.
    PartnerUnavailable { reason: String },
}

impl AttemptResult {
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptResult::Delivered { .. })
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            AttemptResult::Delivered { status_code, .. }
            | AttemptResult::Rejected { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    pub fn response_time_ms(&self) -> Option<i64> {
        match self {
            AttemptResult::Delivered {
                response_time_ms, ..
            }
            | AttemptResult::Rejected {
                response_time_ms, ..
            }
            | AttemptResult::Transport {
                response_time_ms, ..
            } => Some(*response_time_ms),
            AttemptResult::PartnerUnavailable { .. } => None,
        }
    }

    /// Diagnostic text stored in `last_error`; `None` on success.
    pub fn error_message(&self) -> Option<String> {
        let message = match self {
            AttemptResult::Delivered { .. } => return None,
            AttemptResult::Rejected {
                status_code,
                body_excerpt,
                ..
            } => match body_excerpt {
                Some(body) if !body.is_empty() => format!("HTTP {status_code}: {body}"),
                _ => format!("HTTP {status_code}"),
            },
            AttemptResult::Transport { kind, message, .. } => {
                format!("{} error: {}", kind.as_str(), message)
            }
            AttemptResult::PartnerUnavailable { reason } => reason.clone(),
        };
        Some(truncate(message, MAX_ERROR_LEN))
    }
}

fn truncate(mut s: String, max: usize) -> String {
    if s.len() > max {
        let mut cut = max;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
    }
    s
}

/// Which way a task moved after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Delivered,
    RetryScheduled,
    /// Failed after using every attempt.
    Exhausted,
    /// Failed early on a non-retryable response.
    Abandoned,
}

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Delivered => "delivered",
            Transition::RetryScheduled => "retry_scheduled",
            Transition::Exhausted => "exhausted",
            Transition::Abandoned => "abandoned",
        }
    }

    /// Terminal failures are handed to the escalation notifier.
    pub fn requires_escalation(&self) -> bool {
        matches!(self, Transition::Exhausted | Transition::Abandoned)
    }
}

/// New values for a task after one attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub transition: Transition,
    pub status: DeliveryStatus,
    pub attempts: i32,
    pub next_retry_at: Option<UniversalTimestamp>,
    pub last_error: Option<String>,
    pub last_response_status: Option<i32>,
    pub last_response_time_ms: Option<i64>,
    pub last_attempt_at: UniversalTimestamp,
    pub completed_at: Option<UniversalTimestamp>,
}

impl DeliveryOutcome {
    /// Applies one attempt's result to `task`.
    ///
    /// Every attempt, successful or not, counts toward `attempts`, which
    /// never exceeds `max_attempts`. A failure that leaves attempts in hand
    /// schedules the next try with `policy`; the last permitted failure
    /// ends the task.
    pub fn from_attempt(
        task: &DeliveryTask,
        result: &AttemptResult,
        now: UniversalTimestamp,
        policy: &RetryPolicy,
    ) -> Self {
        let attempts = task.attempts.saturating_add(1).min(task.max_attempts);
        let last_response_status = result.status_code().map(i32::from);
        let last_response_time_ms = result.response_time_ms();

        if result.is_success() {
            return Self {
                transition: Transition::Delivered,
                status: DeliveryStatus::Success,
                attempts,
                next_retry_at: None,
                last_error: None,
                last_response_status,
                last_response_time_ms,
                last_attempt_at: now,
                completed_at: Some(now),
            };
        }

        let non_retryable = match result {
            AttemptResult::Rejected { status_code, .. } => !policy.is_retryable_status(*status_code),
            _ => false,
        };

        let transition = if attempts >= task.max_attempts {
            Transition::Exhausted
        } else if non_retryable {
            Transition::Abandoned
        } else {
            Transition::RetryScheduled
        };

        let (status, next_retry_at, completed_at) = match transition {
            Transition::RetryScheduled => (
                DeliveryStatus::Retrying,
                Some(policy.next_retry_at(now, attempts)),
                None,
            ),
            _ => (DeliveryStatus::Failed, None, Some(now)),
        };

        Self {
            transition,
            status,
            attempts,
            next_retry_at,
            last_error: result.error_message(),
            last_response_status,
            last_response_time_ms,
            last_attempt_at: now,
            completed_at,
        }
    }
}

/// Aggregate queue health for monitoring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub pending: i64,
    pub retrying: i64,
    pub success: i64,
    pub failed: i64,
    pub total: i64,
    /// `success / (success + failed)`; `None` until something is terminal.
    pub success_rate: Option<f64>,
    /// Mean of the last recorded response time across tasks that have one.
    pub average_latency_ms: Option<f64>,
}

impl StatusSummary {
    /// Builds a summary from per-status rows of
    /// `(status, count, latency_sum_ms, latency_samples)`.
    pub fn from_rows(rows: impl IntoIterator<Item = (String, i64, i64, i64)>) -> Self {
        let mut summary = StatusSummary::default();
        let mut latency_sum: i64 = 0;
        let mut latency_samples: i64 = 0;

        for (status, count, sum_ms, samples) in rows {
            match DeliveryStatus::from_str(&status) {
                Some(DeliveryStatus::Pending) => summary.pending += count,
                Some(DeliveryStatus::Retrying) => summary.retrying += count,
                Some(DeliveryStatus::Success) => summary.success += count,
                Some(DeliveryStatus::Failed) => summary.failed += count,
                None => continue,
            }
            summary.total += count;
            latency_sum = latency_sum.saturating_add(sum_ms);
            latency_samples += samples;
        }

        let terminal = summary.success + summary.failed;
        if terminal > 0 {
            summary.success_rate = Some(summary.success as f64 / terminal as f64);
        }
        if latency_samples > 0 {
            summary.average_latency_ms = Some(latency_sum as f64 / latency_samples as f64);
        }
        summary
    }
}
