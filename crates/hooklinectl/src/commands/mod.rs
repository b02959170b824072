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


//! Subcommand implementations and the wiring they share.

pub mod config;
pub mod enqueue;
pub mod inspect;
pub mod migrate;
pub mod run;
pub mod sign;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use hookline::escalation::{LogChannel, StaticOperatorDirectory, WebhookChannel};
use hookline::{
    Database, DeliveryWorker, DeliveryWorkerConfig, EscalationNotifier, OperatorContact,
    RetryPolicy, StaticPartnerDirectory, DAL,
};
use tracing::info;

use crate::config::HooklineConfig;

/// Opens the configured database and applies migrations.
pub async fn connect(config: &HooklineConfig) -> Result<DAL> {
    let database = Database::try_new(&config.database.url, config.database.pool_size)
        .context("Failed to connect to database")?;
    database
        .run_migrations()
        .await
        .context("Failed to run database migrations")?;
    info!(backend = database.backend().as_str(), "Database ready");
    Ok(DAL::new(database))
}

pub fn retry_policy(config: &HooklineConfig) -> RetryPolicy {
    RetryPolicy::new(
        config.retry.base_delay_secs,
        config.retry.multiplier,
        config.retry.max_delay_secs,
    )
    .with_fail_fast_on_permanent_errors(config.retry.fail_fast_on_permanent_errors)
}

pub fn worker_config(config: &HooklineConfig) -> DeliveryWorkerConfig {
    let worker = &config.worker;
    let mut builder = DeliveryWorkerConfig::builder()
        .batch_size(worker.batch_size)
        .max_concurrency(worker.max_concurrency)
        .request_timeout(Duration::from_secs(worker.request_timeout_secs))
        .poll_interval(Duration::from_secs(worker.poll_interval_secs))
        .claim_lease(Duration::from_secs(worker.claim_lease_secs))
        .retry_policy(retry_policy(config));
    if let Some(worker_id) = &worker.worker_id {
        builder = builder.worker_id(worker_id.clone());
    }
    builder.build()
}

/// Log channel always; the operator webhook when one is configured.
pub fn notifier(config: &HooklineConfig) -> Result<EscalationNotifier> {
    let contacts = config
        .escalation
        .operators
        .iter()
        .map(|op| OperatorContact {
            name: op.name.clone(),
            address: op.address.clone(),
        })
        .collect();

    let mut notifier = EscalationNotifier::new(Arc::new(StaticOperatorDirectory::new(contacts)))
        .with_channel(Arc::new(LogChannel));

    if let Some(url) = config.escalation.webhook_url.as_deref().filter(|u| !u.is_empty()) {
        let channel = WebhookChannel::new(
            url,
            Duration::from_secs(config.escalation.webhook_timeout_secs),
        )
        .context("Failed to build escalation webhook channel")?;
        notifier = notifier.with_channel(Arc::new(channel));
    }
    Ok(notifier)
}

pub async fn build_worker(config: &HooklineConfig) -> Result<DeliveryWorker> {
    if config.partners.is_empty() {
        tracing::warn!("No partners configured; every delivery will fail as unknown partner");
    }
    let dal = connect(config).await?;
    let partners = Arc::new(StaticPartnerDirectory::new(config.partners.clone()));
    let worker = DeliveryWorker::new(
        dal,
        partners,
        Arc::new(notifier(config)?),
        worker_config(config),
    )
    .context("Invalid worker configuration")?;
    Ok(worker)
}
