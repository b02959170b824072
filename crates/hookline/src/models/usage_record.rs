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

//! Usage records: one append-only row per successful delivery.

use serde::{Deserialize, Serialize};

use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: UniversalUuid,
    pub delivery_task_id: UniversalUuid,
    pub partner_id: String,
    pub endpoint_url: String,
    pub status_code: i32,
    pub response_time_ms: i64,
    pub created_at: UniversalTimestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUsageRecord {
    pub delivery_task_id: UniversalUuid,
    pub partner_id: String,
    pub endpoint_url: String,
    pub status_code: i32,
    pub response_time_ms: i64,
}
