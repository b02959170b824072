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

//! Delivery worker configuration.

use std::time::Duration;

use crate::backoff::RetryPolicy;
use crate::error::WorkerError;

/// Settings for a [`DeliveryWorker`](super::DeliveryWorker).
///
/// ```rust,ignore
/// let config = DeliveryWorkerConfig::builder()
///     .batch_size(100)
///     .max_concurrency(20)
///     .request_timeout(Duration::from_secs(10))
///     .build();
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct DeliveryWorkerConfig {
    worker_id: String,
    batch_size: i64,
    max_concurrency: usize,
    request_timeout: Duration,
    poll_interval: Duration,
    claim_lease: Duration,
    retry_policy: RetryPolicy,
    user_agent: String,
}

impl Default for DeliveryWorkerConfig {
    fn default() -> Self {
        DeliveryWorkerConfigBuilder::default().build()
    }
}

impl DeliveryWorkerConfig {
    pub fn builder() -> DeliveryWorkerConfigBuilder {
        DeliveryWorkerConfigBuilder::default()
    }

    /// Identifier written to `claimed_by` on claimed rows.
    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Maximum tasks claimed per cycle.
    pub fn batch_size(&self) -> i64 {
        self.batch_size
    }

    /// Maximum deliveries in flight at once.
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Hard timeout for one HTTP POST.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Pause between cycles when running periodically.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// How long a claim hides a task from other workers.
    pub fn claim_lease(&self) -> Duration {
        self.claim_lease
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Checks values that would break delivery guarantees.
    ///
    /// The lease must outlive the request timeout, otherwise a slow attempt
    /// could be claimed and sent a second time by another worker.
    pub fn validate(&self) -> Result<(), WorkerError> {
        if self.batch_size < 1 {
            return Err(WorkerError::Config("batch_size must be at least 1".into()));
        }
        if self.max_concurrency < 1 {
            return Err(WorkerError::Config(
                "max_concurrency must be at least 1".into(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(WorkerError::Config("request_timeout must be non-zero".into()));
        }
        if self.claim_lease <= self.request_timeout {
            return Err(WorkerError::Config(format!(
                "claim_lease ({:?}) must exceed request_timeout ({:?})",
                self.claim_lease, self.request_timeout
            )));
        }
        Ok(())
    }
}

/// Builder for [`DeliveryWorkerConfig`].
#[derive(Debug, Clone)]
pub struct DeliveryWorkerConfigBuilder {
    config: DeliveryWorkerConfig,
}

impl Default for DeliveryWorkerConfigBuilder {
    fn default() -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self {
            config: DeliveryWorkerConfig {
                worker_id: format!("hookline-{}", &suffix[..8]),
                batch_size: 50,
                max_concurrency: 10,
                request_timeout: Duration::from_secs(30),
                poll_interval: Duration::from_secs(30),
                claim_lease: Duration::from_secs(180),
                retry_policy: RetryPolicy::default(),
                user_agent: concat!("hookline/", env!("CARGO_PKG_VERSION")).to_string(),
            },
        }
    }
}

impl DeliveryWorkerConfigBuilder {
    pub fn worker_id(mut self, value: impl Into<String>) -> Self {
        self.config.worker_id = value.into();
        self
    }

    pub fn batch_size(mut self, value: i64) -> Self {
        self.config.batch_size = value;
        self
    }

    pub fn max_concurrency(mut self, value: usize) -> Self {
        self.config.max_concurrency = value;
        self
    }

    pub fn request_timeout(mut self, value: Duration) -> Self {
        self.config.request_timeout = value;
        self
    }

    pub fn poll_interval(mut self, value: Duration) -> Self {
        self.config.poll_interval = value;
        self
    }

    pub fn claim_lease(mut self, value: Duration) -> Self {
        self.config.claim_lease = value;
        self
    }

    pub fn retry_policy(mut self, value: RetryPolicy) -> Self {
        self.config.retry_policy = value;
        self
    }

    pub fn user_agent(mut self, value: impl Into<String>) -> Self {
        self.config.user_agent = value.into();
        self
    }

    pub fn build(self) -> DeliveryWorkerConfig {
        self.config
    }
}
