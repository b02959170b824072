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


//! Enqueue validation, outcome recording and the claim-token guard.

use chrono::Duration;
use hookline::database::universal_types::current_timestamp;
use hookline::error::StorageError;
use hookline::models::{
    AttemptResult, DeliveryOutcome, DeliveryStatus, NewDeliveryTask, NewUsageRecord, Transition,
};
use hookline::RetryPolicy;
use serde_json::json;

use crate::fixtures::{invoice_task, TestFixture, PARTNER_ID};

#[tokio::test]
async fn test_enqueue_sets_initial_state() {
    let fixture = TestFixture::sqlite().await;
    let t0 = current_timestamp();

    let task = fixture
        .dal
        .delivery_task()
        .enqueue_at(
            NewDeliveryTask::new(PARTNER_ID, json!({"b": 1, "a": {"d": 2, "c": 3}})),
            t0,
        )
        .await
        .expect("Failed to enqueue");

    assert_eq!(task.status, DeliveryStatus::Pending);
    assert_eq!(task.attempts, 0);
    assert_eq!(task.max_attempts, 5);
    assert_eq!(task.next_retry_at, Some(t0));
    assert_eq!(task.created_at, t0);
    assert_eq!(task.payload, r#"{"a":{"c":3,"d":2},"b":1}"#);

    let fetched = fixture.dal.delivery_task().get(task.id).await.unwrap();
    assert_eq!(fetched, Some(task));
}

#[tokio::test]
async fn test_enqueue_rejects_invalid_input() {
    let fixture = TestFixture::sqlite().await;

    let empty_partner = fixture
        .dal
        .delivery_task()
        .enqueue(NewDeliveryTask::new("  ", json!({})))
        .await;
    assert!(matches!(empty_partner, Err(StorageError::InvalidInput(_))));

    let zero_attempts = fixture
        .dal
        .delivery_task()
        .enqueue(invoice_task(1).with_max_attempts(0))
        .await;
    assert!(matches!(zero_attempts, Err(StorageError::InvalidInput(_))));

    let all = fixture.dal.delivery_task().list(None, 10).await.unwrap();
    assert!(all.is_empty());
}

#[tokio::test]
async fn test_record_outcome_applies_once() {
    let fixture = TestFixture::sqlite().await;
    let dal = &fixture.dal;
    let t0 = current_timestamp();
    dal.delivery_task().enqueue_at(invoice_task(1), t0).await.unwrap();

    let claimed = dal
        .delivery_task()
        .claim_due(1, t0, Duration::seconds(90), "worker-a")
        .await
        .unwrap();
    let task = &claimed[0];
    let token = task.claim_token.unwrap();
    let outcome = DeliveryOutcome::from_attempt(
        task,
        &AttemptResult::Delivered {
            status_code: 204,
            response_time_ms: 87,
        },
        t0,
        &RetryPolicy::default(),
    );

    let settled = dal
        .delivery_task()
        .record_outcome(task.id, token, &outcome, t0)
        .await
        .unwrap()
        .expect("First write should win");
    assert_eq!(settled.status, DeliveryStatus::Success);
    assert_eq!(settled.attempts, 1);
    assert_eq!(settled.last_response_status, Some(204));
    assert_eq!(settled.last_response_time_ms, Some(87));
    assert_eq!(settled.completed_at, Some(t0));
    assert_eq!(settled.next_retry_at, None);
    assert_eq!(settled.claim_token, None);

    let replay = dal
        .delivery_task()
        .record_outcome(task.id, token, &outcome, t0)
        .await
        .unwrap();
    assert!(replay.is_none(), "a settled task must not change again");
}

#[tokio::test]
async fn test_superseded_claim_cannot_record() {
    let fixture = TestFixture::sqlite().await;
    let dal = &fixture.dal;
    let t0 = current_timestamp();
    dal.delivery_task().enqueue_at(invoice_task(1), t0).await.unwrap();

    let slow = dal
        .delivery_task()
        .claim_due(1, t0, Duration::seconds(10), "slow-worker")
        .await
        .unwrap()
        .remove(0);

    let t1 = t0.plus(Duration::seconds(11));
    let fast = dal
        .delivery_task()
        .claim_due(1, t1, Duration::seconds(10), "fast-worker")
        .await
        .unwrap()
        .remove(0);

    let failure = AttemptResult::Rejected {
        status_code: 500,
        response_time_ms: 30,
        body_excerpt: Some("internal error".into()),
    };
    let late = DeliveryOutcome::from_attempt(&slow, &failure, t1, &RetryPolicy::default());
    let stale = dal
        .delivery_task()
        .record_outcome(slow.id, slow.claim_token.unwrap(), &late, t1)
        .await
        .unwrap();
    assert!(stale.is_none());

    let unchanged = dal.delivery_task().get(slow.id).await.unwrap().unwrap();
    assert_eq!(unchanged.attempts, 0);
    assert_eq!(unchanged.claimed_by.as_deref(), Some("fast-worker"));

    let current = DeliveryOutcome::from_attempt(&fast, &failure, t1, &RetryPolicy::default());
    assert_eq!(current.transition, Transition::RetryScheduled);
    let updated = dal
        .delivery_task()
        .record_outcome(fast.id, fast.claim_token.unwrap(), &current, t1)
        .await
        .unwrap()
        .expect("Current claim holder should record");
    assert_eq!(updated.attempts, 1);
    assert_eq!(updated.next_retry_at, Some(t1.plus(Duration::seconds(30))));
    assert_eq!(updated.last_error.as_deref(), Some("HTTP 500: internal error"));
}

#[tokio::test]
async fn test_list_filters_by_status() {
    let fixture = TestFixture::sqlite().await;
    let dal = &fixture.dal;
    let t0 = current_timestamp();
    for i in 0..3 {
        dal.delivery_task()
            .enqueue_at(invoice_task(i), t0.plus(Duration::seconds(i as i64)))
            .await
            .unwrap();
    }
    dal.delivery_task()
        .claim_due(1, t0.plus(Duration::seconds(5)), Duration::seconds(90), "w")
        .await
        .unwrap();

    let pending = dal
        .delivery_task()
        .list(Some(DeliveryStatus::Pending), 10)
        .await
        .unwrap();
    assert_eq!(pending.len(), 2);
    assert!(pending[0].created_at > pending[1].created_at, "newest first");

    let retrying = dal
        .delivery_task()
        .list(Some(DeliveryStatus::Retrying), 10)
        .await
        .unwrap();
    assert_eq!(retrying.len(), 1);

    assert_eq!(dal.delivery_task().list(None, 2).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_usage_records_by_partner() {
    let fixture = TestFixture::sqlite().await;
    let dal = &fixture.dal;
    let task = dal.delivery_task().enqueue(invoice_task(1)).await.unwrap();

    let record = dal
        .usage_record()
        .create(NewUsageRecord {
            delivery_task_id: task.id,
            partner_id: PARTNER_ID.into(),
            endpoint_url: "https://acme.example/hooks".into(),
            status_code: 200,
            response_time_ms: 45,
        })
        .await
        .expect("Failed to create usage record");
    assert_eq!(record.delivery_task_id, task.id);

    assert_eq!(dal.usage_record().count_for_partner(PARTNER_ID).await.unwrap(), 1);
    assert_eq!(dal.usage_record().count_for_partner("other").await.unwrap(), 0);
    let for_task = dal.usage_record().list_for_task(task.id).await.unwrap();
    assert_eq!(for_task, vec![record]);
}
