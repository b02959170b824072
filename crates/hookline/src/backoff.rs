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

//! Retry scheduling.
//!
//! The delay before the next attempt grows geometrically with the number of
//! failed attempts so far and is capped:
//!
//! ```text
//! delay_seconds(a) = min(base * multiplier^(a - 1), max)
//! ```
//!
//! With the defaults (30 s, x4, 2 h) attempts 1 through 5 wait 30 s, 2 min,
//! 8 min, 32 min and 2 h.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::database::universal_types::UniversalTimestamp;

pub const DEFAULT_BASE_DELAY_SECS: u64 = 30;
pub const DEFAULT_BACKOFF_MULTIPLIER: u64 = 4;
pub const DEFAULT_MAX_DELAY_SECS: u64 = 7200;
/// Upper bound on any configured delay (30 days).
pub const MAX_DELAY_LIMIT_SECS: u64 = 30 * 24 * 60 * 60;

/// Backoff parameters and failure classification for delivery attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    base_delay_secs: u64,
    multiplier: u64,
    max_delay_secs: u64,
    fail_fast_on_permanent_errors: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_secs: DEFAULT_BASE_DELAY_SECS,
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_delay_secs: DEFAULT_MAX_DELAY_SECS,
            fail_fast_on_permanent_errors: false,
        }
    }
}

impl RetryPolicy {
    /// Builds a policy. A multiplier below 1 is raised to 1 so delays never
    /// shrink as attempts grow, and `max_delay_secs` is capped at
    /// [`MAX_DELAY_LIMIT_SECS`].
    pub fn new(base_delay_secs: u64, multiplier: u64, max_delay_secs: u64) -> Self {
        Self {
            base_delay_secs,
            multiplier: multiplier.max(1),
            max_delay_secs: max_delay_secs.min(MAX_DELAY_LIMIT_SECS),
            fail_fast_on_permanent_errors: false,
        }
    }

    /// When enabled, a 4xx response other than 408 or 429 ends the task
    /// immediately instead of consuming the remaining attempts.
    pub fn with_fail_fast_on_permanent_errors(mut self, enabled: bool) -> Self {
        self.fail_fast_on_permanent_errors = enabled;
        self
    }

    pub fn base_delay_secs(&self) -> u64 {
        self.base_delay_secs
    }

    pub fn multiplier(&self) -> u64 {
        self.multiplier
    }

    pub fn max_delay_secs(&self) -> u64 {
        self.max_delay_secs
    }

    pub fn fail_fast_on_permanent_errors(&self) -> bool {
        self.fail_fast_on_permanent_errors
    }

    /// Seconds to wait after the `attempts`-th failure.
    ///
    /// `attempts` is the count after incrementing for the failure just
    /// recorded. Values below 1 are treated as 1.
    pub fn delay_seconds(&self, attempts: i32) -> u64 {
        let exponent = attempts.max(1).unsigned_abs() - 1;
        self.multiplier
            .saturating_pow(exponent)
            .saturating_mul(self.base_delay_secs)
            .min(self.max_delay_secs)
    }

    pub fn delay(&self, attempts: i32) -> Duration {
        // deserialized policies bypass `new`
        let secs = self.delay_seconds(attempts).min(MAX_DELAY_LIMIT_SECS);
        Duration::seconds(secs as i64)
    }

    pub fn next_retry_at(&self, now: UniversalTimestamp, attempts: i32) -> UniversalTimestamp {
        now.plus(self.delay(attempts))
    }

    /// Whether `status_code` should be retried under this policy.
    pub fn is_retryable_status(&self, status_code: u16) -> bool {
        !self.fail_fast_on_permanent_errors || !is_permanent_client_error(status_code)
    }
}

/// 4xx responses that retrying will not fix. 408 and 429 are excluded.
pub fn is_permanent_client_error(status_code: u16) -> bool {
    (400..500).contains(&status_code) && status_code != 408 && status_code != 429
}

/// Delay under the default policy.
pub fn delay_seconds(attempts: i32) -> u64 {
    RetryPolicy::default().delay_seconds(attempts)
}
