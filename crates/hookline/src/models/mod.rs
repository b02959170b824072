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

//! Domain models shared by the DAL, the worker and callers.

pub mod delivery_task;
pub mod usage_record;

pub use delivery_task::{
    AttemptResult, DeliveryOutcome, DeliveryStatus, DeliveryTask, NewDeliveryTask,
    StatusSummary, Transition, TransportErrorKind, DEFAULT_MAX_ATTEMPTS,
};
pub use usage_record::{NewUsageRecord, UsageRecord};
