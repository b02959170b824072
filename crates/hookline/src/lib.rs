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

//! # Hookline
//!
//! Asynchronous, signed webhook delivery with retries, escalation and usage
//! accounting.
//!
//! Producers [`enqueue`](dal::DeliveryTaskDAL::enqueue) a JSON payload for a
//! partner. A [`DeliveryWorker`] periodically claims due tasks, signs each
//! payload with the partner's secret and POSTs it to the partner endpoint.
//!
//! ```text
//! pending ──claim──▶ retrying ──2xx──▶ success
//!                      │  ▲
//!              failure │  │ backoff: 30s, 2m, 8m, 32m, 2h (cap)
//!                      ▼  │
//!                    retrying ──last attempt fails──▶ failed ──▶ escalation
//! ```
//!
//! ## Modules
//!
//! - [`crypto`]: `t=<ts>,v1=<hex>` signatures over canonical JSON
//! - [`dal`]: queue store on PostgreSQL or SQLite
//! - [`worker`]: claim, deliver and settle loop
//! - [`escalation`]: operator notification on terminal failure
//! - [`usage`]: one usage record per successful delivery
//! - [`partner`]: partner endpoint and secret lookup
//!
//! ## Receiving side
//!
//! ```rust
//! use hookline::crypto::{sign_at, verify_at, SignatureError};
//! use serde_json::json;
//!
//! let payload = json!({"event": "invoice.paid", "amount": 1200});
//! let signed = sign_at(&payload, "whsec_test", 1_700_000_000);
//!
//! assert!(verify_at(&payload, &signed.header.to_string(), "whsec_test", 300, 1_700_000_010).is_ok());
//! assert_eq!(
//!     verify_at(&payload, &signed.header.to_string(), "whsec_test", 300, 1_700_000_301),
//!     Err(SignatureError::Stale)
//! );
//! ```

pub mod audit;
pub mod backoff;
pub mod crypto;
pub mod dal;
pub mod database;
pub mod error;
pub mod escalation;
pub mod models;
pub mod partner;
pub mod usage;
pub mod worker;

pub use backoff::RetryPolicy;
pub use dal::DAL;
pub use database::{Database, UniversalTimestamp, UniversalUuid};
pub use error::{DatabaseError, DirectoryError, EscalationError, StorageError, WorkerError};
pub use escalation::{
    EscalationChannel, EscalationMessage, EscalationNotifier, LogChannel, OperatorContact,
    OperatorDirectory, StaticOperatorDirectory, WebhookChannel,
};
pub use models::{
    AttemptResult, DeliveryOutcome, DeliveryStatus, DeliveryTask, NewDeliveryTask, StatusSummary,
    Transition, UsageRecord,
};
pub use partner::{Partner, PartnerDirectory, StaticPartnerDirectory};
pub use usage::UsageRecorder;
pub use worker::{CycleReport, DeliveryWorker, DeliveryWorkerConfig, TaskDisposition};

/// Installs a global `tracing` subscriber.
///
/// `RUST_LOG` wins over `default_filter` when set. With `json` the output is
/// one JSON object per line, which keeps the `hookline::audit` event fields
/// machine-readable.
pub fn init_logging(default_filter: &str, json: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let registry = tracing_subscriber::registry().with(filter);
    let installed = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    };
    if installed.is_err() {
        tracing::debug!("Global tracing subscriber already installed");
    }
}
