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

//! Signed HTTP POST of one delivery task.

use std::time::{Duration, Instant};

use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::redirect::Policy;

use crate::crypto::{sign_body, SIGNATURE_HEADER};
use crate::error::WorkerError;
use crate::models::{AttemptResult, DeliveryTask, TransportErrorKind};
use crate::partner::Partner;

/// Task id header; stable across attempts so receivers can deduplicate.
pub const ID_HEADER: &str = "X-Webhook-Id";
/// 1-based number of the attempt being made.
pub const ATTEMPT_HEADER: &str = "X-Webhook-Attempt";

const BODY_EXCERPT_LEN: usize = 256;

/// HTTP client used by the worker.
///
/// Redirects are not followed: a 3xx counts as a failed attempt so the
/// signed body is never replayed to a location the partner did not register.
#[derive(Debug, Clone)]
pub struct WebhookClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl WebhookClient {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, WorkerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .redirect(Policy::none())
            .build()
            .map_err(|e| WorkerError::HttpClient(e.to_string()))?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sends `task` to `partner` once and classifies the result.
    ///
    /// Never returns an error: anything short of a 2xx response is a failed
    /// attempt described by the returned [`AttemptResult`].
    pub async fn deliver(&self, task: &DeliveryTask, partner: &Partner) -> AttemptResult {
        let url = match parse_endpoint(&partner.endpoint_url) {
            Ok(url) => url,
            Err(message) => {
                return AttemptResult::Transport {
                    kind: TransportErrorKind::InvalidEndpoint,
                    message,
                    response_time_ms: 0,
                }
            }
        };

        let signature = sign_body(&task.payload, &partner.secret, Utc::now().timestamp());
        let headers = match build_headers(task, &signature.to_string()) {
            Ok(headers) => headers,
            Err(message) => {
                return AttemptResult::Transport {
                    kind: TransportErrorKind::Other,
                    message,
                    response_time_ms: 0,
                }
            }
        };

        tracing::debug!(
            task_id = %task.id,
            partner_id = %task.partner_id,
            attempt = task.attempts + 1,
            "Posting webhook"
        );

        let started = Instant::now();
        let sent = self
            .client
            .post(url)
            .headers(headers)
            .body(task.payload.clone())
            .send()
            .await;

        match sent {
            Ok(response) => {
                let status_code = response.status().as_u16();
                if response.status().is_success() {
                    AttemptResult::Delivered {
                        status_code,
                        response_time_ms: elapsed_ms(started),
                    }
                } else {
                    let body_excerpt = read_excerpt(response).await;
                    AttemptResult::Rejected {
                        status_code,
                        response_time_ms: elapsed_ms(started),
                        body_excerpt,
                    }
                }
            }
            Err(e) => AttemptResult::Transport {
                kind: classify(&e),
                message: e.to_string(),
                response_time_ms: elapsed_ms(started),
            },
        }
    }
}

fn parse_endpoint(raw: &str) -> Result<url::Url, String> {
    let url = url::Url::parse(raw).map_err(|e| format!("invalid endpoint URL '{raw}': {e}"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(format!("unsupported endpoint scheme '{other}'")),
    }
}

fn build_headers(task: &DeliveryTask, signature: &str) -> Result<HeaderMap, String> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    let pairs = [
        (SIGNATURE_HEADER, signature.to_string()),
        (ID_HEADER, task.id.to_string()),
        (ATTEMPT_HEADER, (task.attempts + 1).to_string()),
    ];
    for (name, value) in pairs {
        let value = HeaderValue::from_str(&value).map_err(|e| format!("bad {name} header: {e}"))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

fn classify(error: &reqwest::Error) -> TransportErrorKind {
    if error.is_timeout() {
        TransportErrorKind::Timeout
    } else if error.is_connect() {
        TransportErrorKind::Connect
    } else if error.is_builder() {
        TransportErrorKind::InvalidEndpoint
    } else {
        TransportErrorKind::Other
    }
}

fn elapsed_ms(started: Instant) -> i64 {
    i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX)
}

async fn read_excerpt(mut response: reqwest::Response) -> Option<String> {
    let mut buf = Vec::new();
    while buf.len() < BODY_EXCERPT_LEN {
        match response.chunk().await {
            Ok(Some(chunk)) => buf.extend_from_slice(&chunk),
            Ok(None) => break,
            Err(_) => break,
        }
    }
    buf.truncate(BODY_EXCERPT_LEN);
    let text = String::from_utf8_lossy(&buf).trim().to_string();
    (!text.is_empty()).then_some(text)
}
