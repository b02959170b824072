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


use crate::config::types::*;

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://hookline.db".to_string(),
            pool_size: 10,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: None,
            batch_size: 50,
            max_concurrency: 10,
            request_timeout_secs: 30,
            poll_interval_secs: 30,
            claim_lease_secs: 180,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_secs: hookline::backoff::DEFAULT_BASE_DELAY_SECS,
            multiplier: hookline::backoff::DEFAULT_BACKOFF_MULTIPLIER,
            max_delay_secs: hookline::backoff::DEFAULT_MAX_DELAY_SECS,
            max_attempts: hookline::models::DEFAULT_MAX_ATTEMPTS,
            fail_fast_on_permanent_errors: false,
        }
    }
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            tolerance_secs: hookline::crypto::DEFAULT_TOLERANCE_SECS,
        }
    }
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            webhook_timeout_secs: 10,
            operators: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Commented template written by `hooklinectl config init`.
pub fn generate_default_config_toml() -> String {
    r#"# hooklinectl configuration
#
# Values may reference environment variables:
#   ${VAR}            required
#   ${VAR:-default}   optional with fallback
#   ${VAR:?message}   required, fails with message

[database]
url = "${HOOKLINE_DATABASE_URL:-sqlite://hookline.db}"
pool_size = 10

[worker]
# worker_id = "hookline-1"
batch_size = 50
max_concurrency = 10
request_timeout_secs = 30
poll_interval_secs = 30
# Must exceed request_timeout_secs. A task that waits for a slot until less than
# request_timeout_secs of its lease is left is released unsent.
claim_lease_secs = 180

[retry]
# delay after the n-th failure = min(base * multiplier^(n-1), max)
base_delay_secs = 30
multiplier = 4
max_delay_secs = 7200
max_attempts = 5
# Stop retrying on 4xx responses other than 408 and 429.
fail_fast_on_permanent_errors = false

[signature]
tolerance_secs = 300

[escalation]
# webhook_url = "${HOOKLINE_ESCALATION_WEBHOOK:-}"
webhook_timeout_secs = 10

# [[escalation.operators]]
# name = "On-call"
# address = "oncall@example.com"

[logging]
level = "info"
json = false

# [[partners]]
# id = "acme"
# name = "Acme Corp"
# endpoint_url = "https://hooks.acme.example/hookline"
# secret = "${ACME_WEBHOOK_SECRET:?set the Acme signing secret}"
"#
    .to_string()
}
