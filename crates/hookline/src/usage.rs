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

//! Appends a usage record for every successful delivery.

use crate::audit;
use crate::dal::DAL;
use crate::models::{DeliveryTask, NewUsageRecord, UsageRecord};

/// Writes usage records for delivered tasks.
///
/// Recording never fails the delivery: a storage error is logged and the
/// caller receives `None`.
#[derive(Clone, Debug)]
pub struct UsageRecorder {
    dal: DAL,
}

impl UsageRecorder {
    pub fn new(dal: DAL) -> Self {
        Self { dal }
    }

    pub async fn record(
        &self,
        task: &DeliveryTask,
        endpoint_url: &str,
        status_code: i32,
        response_time_ms: i64,
    ) -> Option<UsageRecord> {
        let new_record = NewUsageRecord {
            delivery_task_id: task.id,
            partner_id: task.partner_id.clone(),
            endpoint_url: endpoint_url.to_string(),
            status_code,
            response_time_ms,
        };

        match self.dal.usage_record().create(new_record).await {
            Ok(record) => Some(record),
            Err(e) => {
                audit::log_usage_record_failed(task.id, &task.partner_id, &e.to_string());
                None
            }
        }
    }
}
