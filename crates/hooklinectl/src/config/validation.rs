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


use std::collections::HashSet;

use crate::config::{types::*, ValidationError};
use hookline::backoff::MAX_DELAY_LIMIT_SECS;
use hookline::database::BackendType;

pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

impl Validate for HooklineConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = Vec::new();

        if let Err(e) = self.database.validate() {
            errors.push(e);
        }
        if let Err(e) = self.worker.validate() {
            errors.push(e);
        }
        if let Err(e) = self.retry.validate() {
            errors.push(e);
        }
        if let Err(e) = self.logging.validate() {
            errors.push(e);
        }
        if self.signature.tolerance_secs <= 0 {
            errors.push(ValidationError::InvalidValue {
                field: "signature.tolerance_secs",
                message: "must be positive".to_string(),
            });
        }
        if let Err(e) = validate_partners(&self.partners) {
            errors.push(e);
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ValidationError::Multiple { errors }),
        }
    }
}

impl Validate for DatabaseConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if BackendType::from_url(&self.url).is_err() {
            return Err(ValidationError::InvalidDatabaseUrl {
                url: self.url.clone(),
            });
        }
        if self.pool_size == 0 || self.pool_size > 100 {
            return Err(ValidationError::InvalidPoolSize {
                size: self.pool_size,
            });
        }
        Ok(())
    }
}

impl Validate for WorkerConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.batch_size < 1 {
            return Err(ValidationError::InvalidValue {
                field: "worker.batch_size",
                message: "must be at least 1".to_string(),
            });
        }
        if self.max_concurrency == 0 {
            return Err(ValidationError::InvalidValue {
                field: "worker.max_concurrency",
                message: "must be at least 1".to_string(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "worker.request_timeout_secs",
                message: "must be positive".to_string(),
            });
        }
        if self.claim_lease_secs <= self.request_timeout_secs {
            return Err(ValidationError::InvalidValue {
                field: "worker.claim_lease_secs",
                message: format!(
                    "{} must exceed request_timeout_secs ({})",
                    self.claim_lease_secs, self.request_timeout_secs
                ),
            });
        }
        Ok(())
    }
}

impl Validate for RetryConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts < 1 {
            return Err(ValidationError::InvalidValue {
                field: "retry.max_attempts",
                message: "must be at least 1".to_string(),
            });
        }
        if self.max_delay_secs < self.base_delay_secs {
            return Err(ValidationError::InvalidValue {
                field: "retry.max_delay_secs",
                message: "must not be below base_delay_secs".to_string(),
            });
        }
        if self.max_delay_secs > MAX_DELAY_LIMIT_SECS {
            return Err(ValidationError::InvalidValue {
                field: "retry.max_delay_secs",
                message: format!("must not exceed {MAX_DELAY_LIMIT_SECS} seconds"),
            });
        }
        Ok(())
    }
}

impl Validate for LoggingConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        match self.level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => Ok(()),
            _ => Err(ValidationError::InvalidLogLevel {
                level: self.level.clone(),
            }),
        }
    }
}

fn validate_partners(partners: &[hookline::Partner]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for partner in partners {
        let invalid = |message: &str| ValidationError::InvalidPartner {
            id: partner.id.clone(),
            message: message.to_string(),
        };
        if partner.id.trim().is_empty() {
            return Err(invalid("id must not be empty"));
        }
        if !seen.insert(partner.id.as_str()) {
            return Err(invalid("duplicate partner id"));
        }
        if partner.secret.is_empty() {
            return Err(invalid("secret must not be empty"));
        }
        match url::Url::parse(&partner.endpoint_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => return Err(invalid("endpoint_url must be an http(s) URL")),
        }
    }
    Ok(())
}
