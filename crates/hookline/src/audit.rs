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

//! Structured delivery audit events.
//!
//! Every state change a worker makes is logged here with an `event_type`
//! field so log pipelines can index deliveries without parsing messages.
//! Events go to the `hookline::audit` target.

use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};

/// Event type identifiers.
pub mod events {
    pub const TASK_ENQUEUED: &str = "delivery.enqueued";
    pub const TASK_CLAIMED: &str = "delivery.claimed";
    pub const DELIVERY_SUCCEEDED: &str = "delivery.succeeded";
    pub const RETRY_SCHEDULED: &str = "delivery.retry_scheduled";
    pub const DELIVERY_EXHAUSTED: &str = "delivery.exhausted";
    pub const DELIVERY_ABANDONED: &str = "delivery.abandoned";
    pub const CLAIM_RELEASED: &str = "delivery.released";
    /// Outcome was not written because the claim no longer held.
    pub const OUTCOME_STALE: &str = "delivery.outcome_stale";
    pub const ESCALATION_SENT: &str = "escalation.sent";
    pub const ESCALATION_FAILED: &str = "escalation.failed";
    pub const USAGE_RECORD_FAILED: &str = "usage.record_failed";
}

pub fn log_task_enqueued(task_id: UniversalUuid, partner_id: &str, max_attempts: i32) {
    tracing::info!(
        target: "hookline::audit",
        event_type = events::TASK_ENQUEUED,
        task_id = %task_id,
        partner_id = %partner_id,
        max_attempts,
        "Delivery task enqueued"
    );
}

pub fn log_tasks_claimed(worker_id: &str, count: usize) {
    tracing::debug!(
        target: "hookline::audit",
        event_type = events::TASK_CLAIMED,
        worker_id = %worker_id,
        count,
        "Claimed due delivery tasks"
    );
}

pub fn log_delivery_succeeded(
    task_id: UniversalUuid,
    partner_id: &str,
    attempts: i32,
    status_code: Option<i32>,
    response_time_ms: Option<i64>,
) {
    tracing::info!(
        target: "hookline::audit",
        event_type = events::DELIVERY_SUCCEEDED,
        task_id = %task_id,
        partner_id = %partner_id,
        attempts,
        status_code = status_code.unwrap_or_default(),
        response_time_ms = response_time_ms.unwrap_or_default(),
        "Webhook delivered"
    );
}

pub fn log_retry_scheduled(
    task_id: UniversalUuid,
    partner_id: &str,
    attempts: i32,
    max_attempts: i32,
    next_retry_at: Option<UniversalTimestamp>,
    error: Option<&str>,
) {
    tracing::warn!(
        target: "hookline::audit",
        event_type = events::RETRY_SCHEDULED,
        task_id = %task_id,
        partner_id = %partner_id,
        attempts,
        max_attempts,
        next_retry_at = %next_retry_at.map(|t| t.to_string()).unwrap_or_default(),
        error = error.unwrap_or("<none>"),
        "Webhook delivery failed, retry scheduled"
    );
}

pub fn log_delivery_exhausted(
    task_id: UniversalUuid,
    partner_id: &str,
    attempts: i32,
    error: Option<&str>,
) {
    tracing::error!(
        target: "hookline::audit",
        event_type = events::DELIVERY_EXHAUSTED,
        task_id = %task_id,
        partner_id = %partner_id,
        attempts,
        error = error.unwrap_or("<none>"),
        "Webhook delivery exhausted all attempts"
    );
}

pub fn log_delivery_abandoned(
    task_id: UniversalUuid,
    partner_id: &str,
    attempts: i32,
    error: Option<&str>,
) {
    tracing::error!(
        target: "hookline::audit",
        event_type = events::DELIVERY_ABANDONED,
        task_id = %task_id,
        partner_id = %partner_id,
        attempts,
        error = error.unwrap_or("<none>"),
        "Webhook delivery abandoned on non-retryable response"
    );
}

pub fn log_claim_released(task_id: UniversalUuid, partner_id: &str, reason: &str) {
    tracing::info!(
        target: "hookline::audit",
        event_type = events::CLAIM_RELEASED,
        task_id = %task_id,
        partner_id = %partner_id,
        reason = %reason,
        "Delivery claim released without consuming an attempt"
    );
}

pub fn log_outcome_stale(task_id: UniversalUuid, worker_id: &str) {
    tracing::warn!(
        target: "hookline::audit",
        event_type = events::OUTCOME_STALE,
        task_id = %task_id,
        worker_id = %worker_id,
        "Claim no longer held; outcome discarded"
    );
}

pub fn log_escalation_sent(task_id: UniversalUuid, channel: &str, recipients: usize) {
    tracing::info!(
        target: "hookline::audit",
        event_type = events::ESCALATION_SENT,
        task_id = %task_id,
        channel = %channel,
        recipients,
        "Escalation dispatched"
    );
}

pub fn log_escalation_failed(task_id: UniversalUuid, channel: &str, error: &str) {
    tracing::error!(
        target: "hookline::audit",
        event_type = events::ESCALATION_FAILED,
        task_id = %task_id,
        channel = %channel,
        error = %error,
        "Escalation could not be dispatched"
    );
}

pub fn log_usage_record_failed(task_id: UniversalUuid, partner_id: &str, error: &str) {
    tracing::error!(
        target: "hookline::audit",
        event_type = events::USAGE_RECORD_FAILED,
        task_id = %task_id,
        partner_id = %partner_id,
        error = %error,
        "Failed to append usage record"
    );
}
