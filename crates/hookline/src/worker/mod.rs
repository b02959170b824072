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

//! # Delivery Worker
//!
//! Claims due [`DeliveryTask`]s and posts each one, signed, to its partner.
//!
//! A cycle claims up to `batch_size` tasks, then delivers them in parallel
//! with at most `max_concurrency` requests in flight. Each attempt ends in
//! one of:
//!
//! - **delivered**: the task becomes `success` and a usage record is written
//! - **retry scheduled**: `next_retry_at` moves forward on the backoff curve
//! - **exhausted / abandoned**: the task becomes `failed` and operators are
//!   escalated to exactly once
//! - **released**: the attempt was cut short by shutdown or the partner
//!   directory was unreachable; the claim is dropped without charging an
//!   attempt
//! - **deferred**: the task waited for a delivery slot so long that its lease
//!   would run out before the request timeout; it is released unsent and
//!   picked up by a later cycle
//!
//! Only the claim holder can settle a task. When `record_outcome` finds the
//! claim gone the result is discarded as stale.

pub mod client;
pub mod config;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

use crate::audit;
use crate::dal::DAL;
use crate::database::universal_types::{current_timestamp, UniversalTimestamp, UniversalUuid};
use crate::error::WorkerError;
use crate::escalation::{EscalationMessage, EscalationNotifier};
use crate::models::{AttemptResult, DeliveryOutcome, DeliveryTask, Transition};
use crate::partner::{Partner, PartnerDirectory};
use crate::usage::UsageRecorder;

pub use client::{WebhookClient, ATTEMPT_HEADER, ID_HEADER};
pub use config::{DeliveryWorkerConfig, DeliveryWorkerConfigBuilder};

/// Where a cycle reads the current time from.
#[derive(Debug, Clone, Copy)]
enum Clock {
    System,
    Fixed(UniversalTimestamp),
}

impl Clock {
    fn now(&self) -> UniversalTimestamp {
        match self {
            Clock::System => current_timestamp(),
            Clock::Fixed(at) => *at,
        }
    }
}

/// How a claimed task left the cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskDisposition {
    /// An attempt was made and recorded.
    Settled(Transition),
    /// The claim was dropped without consuming an attempt.
    Released,
    /// Not sent because the remaining lease could not cover a full request.
    Deferred,
    /// The claim had already been lost; nothing was recorded.
    Stale,
    /// Storage failed while settling. The lease expires on its own.
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedTask {
    pub task_id: UniversalUuid,
    pub partner_id: String,
    pub disposition: TaskDisposition,
}

/// Summary of one [`DeliveryWorker::run_cycle`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub claimed: usize,
    pub processed: Vec<ProcessedTask>,
    /// Per-task futures that panicked.
    pub panicked: usize,
}

impl CycleReport {
    pub fn count(&self, transition: Transition) -> usize {
        self.processed
            .iter()
            .filter(|p| p.disposition == TaskDisposition::Settled(transition))
            .count()
    }

    pub fn delivered(&self) -> usize {
        self.count(Transition::Delivered)
    }

    pub fn retry_scheduled(&self) -> usize {
        self.count(Transition::RetryScheduled)
    }

    /// Exhausted plus abandoned.
    pub fn failed(&self) -> usize {
        self.count(Transition::Exhausted) + self.count(Transition::Abandoned)
    }

    pub fn released(&self) -> usize {
        self.processed
            .iter()
            .filter(|p| p.disposition == TaskDisposition::Released)
            .count()
    }

    pub fn deferred(&self) -> usize {
        self.processed
            .iter()
            .filter(|p| p.disposition == TaskDisposition::Deferred)
            .count()
    }

    pub fn stale(&self) -> usize {
        self.processed
            .iter()
            .filter(|p| p.disposition == TaskDisposition::Stale)
            .count()
    }

    pub fn errors(&self) -> usize {
        self.processed
            .iter()
            .filter(|p| matches!(p.disposition, TaskDisposition::Error(_)))
            .count()
            + self.panicked
    }

    pub fn disposition_of(&self, task_id: UniversalUuid) -> Option<&TaskDisposition> {
        self.processed
            .iter()
            .find(|p| p.task_id == task_id)
            .map(|p| &p.disposition)
    }
}

struct WorkerInner {
    dal: DAL,
    partners: Arc<dyn PartnerDirectory>,
    notifier: Arc<EscalationNotifier>,
    usage: UsageRecorder,
    client: WebhookClient,
    config: DeliveryWorkerConfig,
    lease: chrono::Duration,
    slots: Arc<Semaphore>,
}

/// Periodic delivery process. Cheap to clone; clones share the same
/// concurrency limit.
#[derive(Clone)]
pub struct DeliveryWorker {
    inner: Arc<WorkerInner>,
}

impl std::fmt::Debug for DeliveryWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryWorker")
            .field("worker_id", &self.inner.config.worker_id())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl DeliveryWorker {
    pub fn new(
        dal: DAL,
        partners: Arc<dyn PartnerDirectory>,
        notifier: Arc<EscalationNotifier>,
        config: DeliveryWorkerConfig,
    ) -> Result<Self, WorkerError> {
        config.validate()?;
        let client = WebhookClient::new(config.request_timeout(), config.user_agent())?;
        let lease = chrono::Duration::from_std(config.claim_lease())
            .map_err(|e| WorkerError::Config(format!("claim_lease out of range: {e}")))?;

        Ok(Self {
            inner: Arc::new(WorkerInner {
                usage: UsageRecorder::new(dal.clone()),
                slots: Arc::new(Semaphore::new(config.max_concurrency())),
                dal,
                partners,
                notifier,
                client,
                config,
                lease,
            }),
        })
    }

    pub fn config(&self) -> &DeliveryWorkerConfig {
        &self.inner.config
    }

    /// Runs one cycle against the system clock.
    pub async fn run_cycle(&self) -> Result<CycleReport, WorkerError> {
        let (_keep, shutdown) = watch::channel(false);
        self.cycle(Clock::System, shutdown).await
    }

    /// Runs one cycle as if the time were `now`.
    ///
    /// Both the due check and every recorded outcome use `now`, which makes
    /// the retry schedule reproducible.
    pub async fn run_cycle_at(&self, now: UniversalTimestamp) -> Result<CycleReport, WorkerError> {
        let (_keep, shutdown) = watch::channel(false);
        self.cycle(Clock::Fixed(now), shutdown).await
    }

    /// Runs one cycle that gives up in-flight attempts once `shutdown`
    /// becomes `true`. Abandoned attempts are released, not charged.
    pub async fn run_cycle_until(
        &self,
        shutdown: watch::Receiver<bool>,
    ) -> Result<CycleReport, WorkerError> {
        self.cycle(Clock::System, shutdown).await
    }

    /// Runs cycles every `poll_interval` until `shutdown` becomes `true`.
    ///
    /// A full batch, or one that deferred tasks, is followed immediately by
    /// another cycle so a backlog drains without waiting. A failed cycle is
    /// logged and retried on the next tick.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), WorkerError> {
        let config = &self.inner.config;
        tracing::info!(
            worker_id = %config.worker_id(),
            batch_size = config.batch_size(),
            max_concurrency = config.max_concurrency(),
            poll_interval_secs = config.poll_interval().as_secs(),
            "Delivery worker started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let backlog = match self.cycle(Clock::System, shutdown.clone()).await {
                Ok(report) => {
                    log_cycle(&report);
                    (report.claimed as i64 >= config.batch_size() && report.released() == 0)
                        || report.deferred() > 0
                }
                Err(e) => {
                    tracing::error!(error = %e, "Delivery cycle failed");
                    false
                }
            };

            if backlog {
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(config.poll_interval()) => {}
                _ = shutdown_signalled(&mut shutdown) => break,
            }
        }

        tracing::info!(worker_id = %config.worker_id(), "Delivery worker stopped");
        Ok(())
    }

    async fn cycle(
        &self,
        clock: Clock,
        shutdown: watch::Receiver<bool>,
    ) -> Result<CycleReport, WorkerError> {
        let inner = &self.inner;
        let claimed_at = Instant::now();
        let tasks = inner
            .dal
            .delivery_task()
            .claim_due(
                inner.config.batch_size(),
                clock.now(),
                inner.lease,
                inner.config.worker_id(),
            )
            .await?;

        let mut report = CycleReport {
            claimed: tasks.len(),
            ..Default::default()
        };
        if tasks.is_empty() {
            return Ok(report);
        }
        audit::log_tasks_claimed(inner.config.worker_id(), tasks.len());

        let mut join_set = JoinSet::new();
        for task in tasks {
            let inner = Arc::clone(inner);
            let mut shutdown = shutdown.clone();
            join_set.spawn(async move {
                tokio::select! {
                    biased;
                    _ = shutdown_signalled(&mut shutdown) => {
                        inner.release(&task, clock, "worker shutting down").await
                    }
                    permit = Arc::clone(&inner.slots).acquire_owned() => match permit {
                        Ok(_permit) => inner.process(task, clock, claimed_at, shutdown).await,
                        Err(_) => inner.release(&task, clock, "delivery slots closed").await,
                    },
                }
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(processed) => report.processed.push(processed),
                Err(e) => {
                    tracing::error!(error = %e, "Delivery task panicked");
                    report.panicked += 1;
                }
            }
        }

        Ok(report)
    }
}

impl WorkerInner {
    async fn process(
        &self,
        task: DeliveryTask,
        clock: Clock,
        claimed_at: Instant,
        mut shutdown: watch::Receiver<bool>,
    ) -> ProcessedTask {
        let Some(claim_token) = task.claim_token else {
            return processed(&task, TaskDisposition::Error("claimed task has no claim token".into()));
        };

        let partner = match self.partners.get_partner(&task.partner_id).await {
            Ok(partner) => partner,
            Err(e) => {
                let reason = format!("partner directory unavailable: {e}");
                return self.release(&task, clock, &reason).await;
            }
        };

        let result = match &partner {
            None => AttemptResult::PartnerUnavailable {
                reason: format!("partner '{}' not found", task.partner_id),
            },
            Some(p) if !p.active => AttemptResult::PartnerUnavailable {
                reason: format!("partner '{}' is inactive", p.id),
            },
            Some(p) => {
                // The POST must finish before another worker can reclaim.
                if !lease_covers_attempt(
                    claimed_at.elapsed(),
                    self.config.request_timeout(),
                    self.config.claim_lease(),
                ) {
                    return self.defer(&task, clock).await;
                }
                tokio::select! {
                    biased;
                    _ = shutdown_signalled(&mut shutdown) => {
                        return self.release(&task, clock, "worker shutting down").await;
                    }
                    result = self.client.deliver(&task, p) => result,
                }
            }
        };

        let now = clock.now();
        let outcome =
            DeliveryOutcome::from_attempt(&task, &result, now, self.config.retry_policy());

        let updated = match self
            .dal
            .delivery_task()
            .record_outcome(task.id, claim_token, &outcome, now)
            .await
        {
            Ok(Some(updated)) => updated,
            Ok(None) => {
                audit::log_outcome_stale(task.id, self.config.worker_id());
                metrics::counter!("hookline_deliveries_total", "outcome" => "stale").increment(1);
                return processed(&task, TaskDisposition::Stale);
            }
            Err(e) => {
                tracing::error!(
                    task_id = %task.id,
                    partner_id = %task.partner_id,
                    error = %e,
                    "Failed to record delivery outcome"
                );
                return processed(&task, TaskDisposition::Error(e.to_string()));
            }
        };

        metrics::counter!("hookline_deliveries_total", "outcome" => outcome.transition.as_str())
            .increment(1);
        self.after_settle(&updated, outcome.transition, partner.as_ref())
            .await;

        processed(&updated, TaskDisposition::Settled(outcome.transition))
    }

    /// Side effects owed by the writer that settled the task.
    async fn after_settle(
        &self,
        task: &DeliveryTask,
        transition: Transition,
        partner: Option<&Partner>,
    ) {
        match transition {
            Transition::Delivered => {
                audit::log_delivery_succeeded(
                    task.id,
                    &task.partner_id,
                    task.attempts,
                    task.last_response_status,
                    task.last_response_time_ms,
                );
                let endpoint = partner.map(|p| p.endpoint_url.as_str()).unwrap_or_default();
                self.usage
                    .record(
                        task,
                        endpoint,
                        task.last_response_status.unwrap_or_default(),
                        task.last_response_time_ms.unwrap_or_default(),
                    )
                    .await;
            }
            Transition::RetryScheduled => audit::log_retry_scheduled(
                task.id,
                &task.partner_id,
                task.attempts,
                task.max_attempts,
                task.next_retry_at,
                task.last_error.as_deref(),
            ),
            Transition::Exhausted | Transition::Abandoned => {
                if transition == Transition::Exhausted {
                    audit::log_delivery_exhausted(
                        task.id,
                        &task.partner_id,
                        task.attempts,
                        task.last_error.as_deref(),
                    );
                } else {
                    audit::log_delivery_abandoned(
                        task.id,
                        &task.partner_id,
                        task.attempts,
                        task.last_error.as_deref(),
                    );
                }
                let message = EscalationMessage::for_task(task, partner);
                let report = self.notifier.escalate(&message).await;
                if !report.delivered() {
                    tracing::warn!(task_id = %task.id, "No escalation channel accepted the message");
                }
            }
        }
    }

    async fn defer(&self, task: &DeliveryTask, clock: Clock) -> ProcessedTask {
        let mut processed = self
            .release(task, clock, "claim lease too short for another attempt")
            .await;
        if processed.disposition == TaskDisposition::Released {
            metrics::counter!("hookline_deliveries_total", "outcome" => "deferred").increment(1);
            processed.disposition = TaskDisposition::Deferred;
        }
        processed
    }

    async fn release(&self, task: &DeliveryTask, clock: Clock, reason: &str) -> ProcessedTask {
        let Some(claim_token) = task.claim_token else {
            return processed(task, TaskDisposition::Error("claimed task has no claim token".into()));
        };

        match self
            .dal
            .delivery_task()
            .release(task.id, claim_token, clock.now())
            .await
        {
            Ok(true) => {
                audit::log_claim_released(task.id, &task.partner_id, reason);
                processed(task, TaskDisposition::Released)
            }
            Ok(false) => processed(task, TaskDisposition::Stale),
            Err(e) => {
                tracing::error!(task_id = %task.id, error = %e, "Failed to release claim");
                processed(task, TaskDisposition::Error(e.to_string()))
            }
        }
    }
}

fn processed(task: &DeliveryTask, disposition: TaskDisposition) -> ProcessedTask {
    ProcessedTask {
        task_id: task.id,
        partner_id: task.partner_id.clone(),
        disposition,
    }
}

/// Whether an attempt started `elapsed` after claiming ends, at worst,
/// before the claim lease does.
fn lease_covers_attempt(elapsed: Duration, request_timeout: Duration, lease: Duration) -> bool {
    elapsed
        .checked_add(request_timeout)
        .map_or(false, |worst_case| worst_case < lease)
}

/// Resolves once `true` is observed. Pends forever if the sender is gone.
async fn shutdown_signalled(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

fn log_cycle(report: &CycleReport) {
    if report.claimed == 0 {
        tracing::debug!("No due delivery tasks");
        return;
    }
    tracing::info!(
        claimed = report.claimed,
        delivered = report.delivered(),
        retry_scheduled = report.retry_scheduled(),
        failed = report.failed(),
        released = report.released(),
        deferred = report.deferred(),
        stale = report.stale(),
        errors = report.errors(),
        "Delivery cycle complete"
    );
}
