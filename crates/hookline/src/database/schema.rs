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

//! Diesel table definitions, one module per backend.

#[cfg(feature = "postgres")]
pub mod postgres {
    diesel::table! {
        delivery_tasks (id) {
            id -> Uuid,
            partner_id -> Text,
            payload -> Text,
            status -> Text,
            attempts -> Int4,
            max_attempts -> Int4,
            next_retry_at -> Nullable<Timestamp>,
            last_error -> Nullable<Text>,
            last_response_status -> Nullable<Int4>,
            last_response_time_ms -> Nullable<Int8>,
            locked_until -> Nullable<Timestamp>,
            claim_token -> Nullable<Uuid>,
            claimed_by -> Nullable<Text>,
            created_at -> Timestamp,
            last_attempt_at -> Nullable<Timestamp>,
            completed_at -> Nullable<Timestamp>,
            updated_at -> Timestamp,
        }
    }

    diesel::table! {
        usage_records (id) {
            id -> Uuid,
            delivery_task_id -> Uuid,
            partner_id -> Text,
            endpoint_url -> Text,
            status_code -> Int4,
            response_time_ms -> Int8,
            created_at -> Timestamp,
        }
    }
}

#[cfg(feature = "sqlite")]
pub mod sqlite {
    diesel::table! {
        delivery_tasks (id) {
            id -> Binary,
            partner_id -> Text,
            payload -> Text,
            status -> Text,
            attempts -> Integer,
            max_attempts -> Integer,
            next_retry_at -> Nullable<Text>,
            last_error -> Nullable<Text>,
            last_response_status -> Nullable<Integer>,
            last_response_time_ms -> Nullable<BigInt>,
            locked_until -> Nullable<Text>,
            claim_token -> Nullable<Binary>,
            claimed_by -> Nullable<Text>,
            created_at -> Text,
            last_attempt_at -> Nullable<Text>,
            completed_at -> Nullable<Text>,
            updated_at -> Text,
        }
    }

    diesel::table! {
        usage_records (id) {
            id -> Binary,
            delivery_task_id -> Binary,
            partner_id -> Text,
            endpoint_url -> Text,
            status_code -> Integer,
            response_time_ms -> BigInt,
            created_at -> Text,
        }
    }
}
