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

//! SQLite row types.
//!
//! UUIDs are 16-byte BLOBs and timestamps are fixed-width RFC 3339 TEXT
//! (see [`UniversalTimestamp::to_sqlite_string`]), so SQL string
//! comparisons on timestamp columns order chronologically.

use diesel::prelude::*;

use crate::database::schema::sqlite::*;
use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::error::StorageError;
use crate::models::{DeliveryOutcome, DeliveryStatus, DeliveryTask, UsageRecord};

pub fn uuid_to_blob(id: &UniversalUuid) -> Vec<u8> {
    id.as_bytes().to_vec()
}

pub fn blob_to_uuid(blob: &[u8]) -> Result<UniversalUuid, StorageError> {
    UniversalUuid::from_bytes(blob)
        .map_err(|e| StorageError::InvalidRecord(format!("invalid UUID blob: {e}")))
}

pub fn parse_timestamp(text: &str) -> Result<UniversalTimestamp, StorageError> {
    UniversalTimestamp::from_rfc3339(text)
        .map_err(|e| StorageError::InvalidRecord(format!("invalid timestamp '{text}': {e}")))
}

fn parse_optional_timestamp(
    text: Option<String>,
) -> Result<Option<UniversalTimestamp>, StorageError> {
    text.as_deref().map(parse_timestamp).transpose()
}

// ============================================================================
// Delivery Task Models
// ============================================================================

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = delivery_tasks)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SqliteDeliveryTask {
    pub id: Vec<u8>,
    pub partner_id: String,
    pub payload: String,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub next_retry_at: Option<String>,
    pub last_error: Option<String>,
    pub last_response_status: Option<i32>,
    pub last_response_time_ms: Option<i64>,
    pub locked_until: Option<String>,
    pub claim_token: Option<Vec<u8>>,
    pub claimed_by: Option<String>,
    pub created_at: String,
    pub last_attempt_at: Option<String>,
    pub completed_at: Option<String>,
    pub updated_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = delivery_tasks)]
pub struct NewSqliteDeliveryTask {
    pub id: Vec<u8>,
    pub partner_id: String,
    pub payload: String,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub next_retry_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Columns written when an attempt settles. Clears the claim.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = delivery_tasks)]
#[diesel(treat_none_as_null = true)]
pub struct SqliteOutcomeChangeset {
    pub status: String,
    pub attempts: i32,
    pub next_retry_at: Option<String>,
    pub last_error: Option<String>,
    pub last_response_status: Option<i32>,
    pub last_response_time_ms: Option<i64>,
    pub last_attempt_at: Option<String>,
    pub completed_at: Option<String>,
    pub locked_until: Option<String>,
    pub claim_token: Option<Vec<u8>>,
    pub updated_at: String,
}

impl SqliteOutcomeChangeset {
    pub fn new(outcome: &DeliveryOutcome, now: UniversalTimestamp) -> Self {
        Self {
            status: outcome.status.as_str().to_string(),
            attempts: outcome.attempts,
            next_retry_at: outcome.next_retry_at.map(|t| t.to_sqlite_string()),
            last_error: outcome.last_error.clone(),
            last_response_status: outcome.last_response_status,
            last_response_time_ms: outcome.last_response_time_ms,
            last_attempt_at: Some(outcome.last_attempt_at.to_sqlite_string()),
            completed_at: outcome.completed_at.map(|t| t.to_sqlite_string()),
            locked_until: None,
            claim_token: None,
            updated_at: now.to_sqlite_string(),
        }
    }
}

impl TryFrom<SqliteDeliveryTask> for DeliveryTask {
    type Error = StorageError;

    fn try_from(row: SqliteDeliveryTask) -> Result<Self, Self::Error> {
        let id = blob_to_uuid(&row.id)?;
        let status = DeliveryStatus::from_str(&row.status).ok_or_else(|| {
            StorageError::InvalidRecord(format!(
                "delivery task {} has unknown status '{}'",
                id, row.status
            ))
        })?;

        Ok(DeliveryTask {
            id,
            partner_id: row.partner_id,
            payload: row.payload,
            status,
            attempts: row.attempts,
            max_attempts: row.max_attempts,
            next_retry_at: parse_optional_timestamp(row.next_retry_at)?,
            last_error: row.last_error,
            last_response_status: row.last_response_status,
            last_response_time_ms: row.last_response_time_ms,
            locked_until: parse_optional_timestamp(row.locked_until)?,
            claim_token: row.claim_token.as_deref().map(blob_to_uuid).transpose()?,
            claimed_by: row.claimed_by,
            created_at: parse_timestamp(&row.created_at)?,
            last_attempt_at: parse_optional_timestamp(row.last_attempt_at)?,
            completed_at: parse_optional_timestamp(row.completed_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

// ============================================================================
// Usage Record Models
// ============================================================================

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = usage_records)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SqliteUsageRecord {
    pub id: Vec<u8>,
    pub delivery_task_id: Vec<u8>,
    pub partner_id: String,
    pub endpoint_url: String,
    pub status_code: i32,
    pub response_time_ms: i64,
    pub created_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = usage_records)]
pub struct NewSqliteUsageRecord {
    pub id: Vec<u8>,
    pub delivery_task_id: Vec<u8>,
    pub partner_id: String,
    pub endpoint_url: String,
    pub status_code: i32,
    pub response_time_ms: i64,
    pub created_at: String,
}

impl TryFrom<SqliteUsageRecord> for UsageRecord {
    type Error = StorageError;

    fn try_from(row: SqliteUsageRecord) -> Result<Self, Self::Error> {
        Ok(UsageRecord {
            id: blob_to_uuid(&row.id)?,
            delivery_task_id: blob_to_uuid(&row.delivery_task_id)?,
            partner_id: row.partner_id,
            endpoint_url: row.endpoint_url,
            status_code: row.status_code,
            response_time_ms: row.response_time_ms,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}
