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

//! PostgreSQL row types.
//!
//! Native `Uuid` and `TIMESTAMP` columns; converted to domain types at the
//! DAL boundary.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use uuid::Uuid;

use crate::database::schema::postgres::*;
use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::error::StorageError;
use crate::models::{DeliveryOutcome, DeliveryStatus, DeliveryTask, UsageRecord};

// ============================================================================
// Delivery Task Models
// ============================================================================

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = delivery_tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PgDeliveryTask {
    pub id: Uuid,
    pub partner_id: String,
    pub payload: String,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub next_retry_at: Option<NaiveDateTime>,
    pub last_error: Option<String>,
    pub last_response_status: Option<i32>,
    pub last_response_time_ms: Option<i64>,
    pub locked_until: Option<NaiveDateTime>,
    pub claim_token: Option<Uuid>,
    pub claimed_by: Option<String>,
    pub created_at: NaiveDateTime,
    pub last_attempt_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = delivery_tasks)]
pub struct NewPgDeliveryTask {
    pub id: Uuid,
    pub partner_id: String,
    pub payload: String,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub next_retry_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Columns written when an attempt settles. Clears the claim.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = delivery_tasks)]
#[diesel(treat_none_as_null = true)]
pub struct PgOutcomeChangeset {
    pub status: String,
    pub attempts: i32,
    pub next_retry_at: Option<NaiveDateTime>,
    pub last_error: Option<String>,
    pub last_response_status: Option<i32>,
    pub last_response_time_ms: Option<i64>,
    pub last_attempt_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    pub locked_until: Option<NaiveDateTime>,
    pub claim_token: Option<Uuid>,
    pub updated_at: NaiveDateTime,
}

impl PgOutcomeChangeset {
    pub fn new(outcome: &DeliveryOutcome, now: UniversalTimestamp) -> Self {
        Self {
            status: outcome.status.as_str().to_string(),
            attempts: outcome.attempts,
            next_retry_at: outcome.next_retry_at.map(|t| t.to_naive()),
            last_error: outcome.last_error.clone(),
            last_response_status: outcome.last_response_status,
            last_response_time_ms: outcome.last_response_time_ms,
            last_attempt_at: Some(outcome.last_attempt_at.to_naive()),
            completed_at: outcome.completed_at.map(|t| t.to_naive()),
            locked_until: None,
            claim_token: None,
            updated_at: now.to_naive(),
        }
    }
}

impl TryFrom<PgDeliveryTask> for DeliveryTask {
    type Error = StorageError;

    fn try_from(row: PgDeliveryTask) -> Result<Self, Self::Error> {
        let status = DeliveryStatus::from_str(&row.status).ok_or_else(|| {
            StorageError::InvalidRecord(format!(
                "delivery task {} has unknown status '{}'",
                row.id, row.status
            ))
        })?;

        Ok(DeliveryTask {
            id: UniversalUuid(row.id),
            partner_id: row.partner_id,
            payload: row.payload,
            status,
            attempts: row.attempts,
            max_attempts: row.max_attempts,
            next_retry_at: row.next_retry_at.map(UniversalTimestamp::from_naive),
            last_error: row.last_error,
            last_response_status: row.last_response_status,
            last_response_time_ms: row.last_response_time_ms,
            locked_until: row.locked_until.map(UniversalTimestamp::from_naive),
            claim_token: row.claim_token.map(UniversalUuid),
            claimed_by: row.claimed_by,
            created_at: UniversalTimestamp::from_naive(row.created_at),
            last_attempt_at: row.last_attempt_at.map(UniversalTimestamp::from_naive),
            completed_at: row.completed_at.map(UniversalTimestamp::from_naive),
            updated_at: UniversalTimestamp::from_naive(row.updated_at),
        })
    }
}

// ============================================================================
// Usage Record Models
// ============================================================================

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = usage_records)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PgUsageRecord {
    pub id: Uuid,
    pub delivery_task_id: Uuid,
    pub partner_id: String,
    pub endpoint_url: String,
    pub status_code: i32,
    pub response_time_ms: i64,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = usage_records)]
pub struct NewPgUsageRecord {
    pub id: Uuid,
    pub delivery_task_id: Uuid,
    pub partner_id: String,
    pub endpoint_url: String,
    pub status_code: i32,
    pub response_time_ms: i64,
    pub created_at: NaiveDateTime,
}

impl From<PgUsageRecord> for UsageRecord {
    fn from(row: PgUsageRecord) -> Self {
        UsageRecord {
            id: UniversalUuid(row.id),
            delivery_task_id: UniversalUuid(row.delivery_task_id),
            partner_id: row.partner_id,
            endpoint_url: row.endpoint_url,
            status_code: row.status_code,
            response_time_ms: row.response_time_ms,
            created_at: UniversalTimestamp::from_naive(row.created_at),
        }
    }
}
