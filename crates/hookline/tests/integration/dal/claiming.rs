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


//! Claiming must hand each due task to exactly one worker.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Duration;
use hookline::dal::DAL;
use hookline::database::universal_types::current_timestamp;
use hookline::models::{AttemptResult, DeliveryOutcome, DeliveryStatus};
use hookline::RetryPolicy;
use tokio::sync::Barrier;

use crate::fixtures::{invoice_task, TestFixture};

#[tokio::test]
async fn test_claim_due_returns_oldest_first_up_to_limit() {
    let fixture = TestFixture::sqlite().await;
    let dal = &fixture.dal;
    let t0 = current_timestamp();

    let mut ids = Vec::new();
    for i in 0..4 {
        let task = dal
            .delivery_task()
            .enqueue_at(invoice_task(i), t0.plus(Duration::seconds(i as i64)))
            .await
            .expect("Failed to enqueue");
        ids.push(task.id);
    }

    let now = t0.plus(Duration::seconds(10));
    let claimed = dal
        .delivery_task()
        .claim_due(3, now, Duration::seconds(90), "worker-a")
        .await
        .expect("Failed to claim");

    let claimed_ids: Vec<_> = claimed.iter().map(|t| t.id).collect();
    assert_eq!(claimed_ids, ids[..3].to_vec());

    for task in &claimed {
        assert_eq!(task.status, DeliveryStatus::Retrying);
        assert_eq!(task.attempts, 0);
        assert_eq!(task.claimed_by.as_deref(), Some("worker-a"));
        assert_eq!(task.locked_until, Some(now.plus(Duration::seconds(90))));
        assert!(task.claim_token.is_some());
    }

    let rest = dal
        .delivery_task()
        .claim_due(10, now, Duration::seconds(90), "worker-b")
        .await
        .expect("Failed to claim");
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].id, ids[3]);
}

#[tokio::test]
async fn test_claim_due_skips_future_and_terminal_tasks() {
    let fixture = TestFixture::sqlite().await;
    let dal = &fixture.dal;
    let t0 = current_timestamp();

    let later = dal
        .delivery_task()
        .enqueue_at(invoice_task(1), t0.plus(Duration::minutes(5)))
        .await
        .unwrap();
    let done = dal.delivery_task().enqueue_at(invoice_task(2), t0).await.unwrap();

    // Settle `done` as delivered.
    let claimed = dal
        .delivery_task()
        .claim_due(10, t0, Duration::seconds(90), "worker-a")
        .await
        .unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].id, done.id);
    let outcome = DeliveryOutcome::from_attempt(
        &claimed[0],
        &AttemptResult::Delivered {
            status_code: 200,
            response_time_ms: 12,
        },
        t0,
        &RetryPolicy::default(),
    );
    dal.delivery_task()
        .record_outcome(done.id, claimed[0].claim_token.unwrap(), &outcome, t0)
        .await
        .unwrap()
        .expect("Claim holder should settle the task");

    let again = dal
        .delivery_task()
        .claim_due(10, t0.plus(Duration::hours(1)), Duration::seconds(90), "worker-b")
        .await
        .unwrap();
    let again_ids: Vec<_> = again.iter().map(|t| t.id).collect();
    assert_eq!(again_ids, vec![later.id], "terminal task must not be claimed again");
}

#[tokio::test]
async fn test_lease_hides_task_until_it_expires() {
    let fixture = TestFixture::sqlite().await;
    let dal = &fixture.dal;
    let t0 = current_timestamp();
    let task = dal.delivery_task().enqueue_at(invoice_task(1), t0).await.unwrap();

    let first = dal
        .delivery_task()
        .claim_due(1, t0, Duration::seconds(90), "worker-a")
        .await
        .unwrap();
    assert_eq!(first.len(), 1);

    let during = dal
        .delivery_task()
        .claim_due(1, t0.plus(Duration::seconds(89)), Duration::seconds(90), "worker-b")
        .await
        .unwrap();
    assert!(during.is_empty(), "leased task must not be claimed twice");

    let after = dal
        .delivery_task()
        .claim_due(1, t0.plus(Duration::seconds(90)), Duration::seconds(90), "worker-b")
        .await
        .unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].id, task.id);
    assert_eq!(after[0].claimed_by.as_deref(), Some("worker-b"));
    assert_ne!(after[0].claim_token, first[0].claim_token);
}

#[tokio::test]
async fn test_release_keeps_attempts_and_retry_time() {
    let fixture = TestFixture::sqlite().await;
    let dal = &fixture.dal;
    let t0 = current_timestamp();
    dal.delivery_task().enqueue_at(invoice_task(1), t0).await.unwrap();

    // One failed attempt moves next_retry_at to t0 + 30s.
    let claimed = dal
        .delivery_task()
        .claim_due(1, t0, Duration::seconds(90), "worker-a")
        .await
        .unwrap();
    let outcome = DeliveryOutcome::from_attempt(
        &claimed[0],
        &AttemptResult::Rejected {
            status_code: 503,
            response_time_ms: 20,
            body_excerpt: None,
        },
        t0,
        &RetryPolicy::default(),
    );
    dal.delivery_task()
        .record_outcome(claimed[0].id, claimed[0].claim_token.unwrap(), &outcome, t0)
        .await
        .unwrap()
        .unwrap();

    let t1 = t0.plus(Duration::seconds(30));
    let claimed = dal
        .delivery_task()
        .claim_due(1, t1, Duration::seconds(90), "worker-a")
        .await
        .unwrap();
    let task = &claimed[0];

    let wrong_token = hookline::UniversalUuid::new_v4();
    assert!(!dal.delivery_task().release(task.id, wrong_token, t1).await.unwrap());

    assert!(dal
        .delivery_task()
        .release(task.id, task.claim_token.unwrap(), t1)
        .await
        .unwrap());

    let released = dal.delivery_task().get(task.id).await.unwrap().unwrap();
    assert_eq!(released.status, DeliveryStatus::Retrying);
    assert_eq!(released.attempts, 1);
    assert_eq!(released.next_retry_at, Some(t1));
    assert_eq!(released.locked_until, None);
    assert_eq!(released.claim_token, None);

    // Releasing does not delay the task: it is due again right away.
    let reclaimed = dal
        .delivery_task()
        .claim_due(1, t1, Duration::seconds(90), "worker-b")
        .await
        .unwrap();
    assert_eq!(reclaimed.len(), 1);
}

/// Many workers claiming at once never receive the same task.
#[tokio::test]
async fn test_concurrent_claiming_no_duplicates() {
    let fixture = TestFixture::sqlite().await;
    let t0 = current_timestamp();

    const NUM_TASKS: usize = 20;
    const NUM_WORKERS: usize = 8;

    let mut created = HashSet::new();
    for i in 0..NUM_TASKS {
        let task = fixture
            .dal
            .delivery_task()
            .enqueue_at(invoice_task(i as u32), t0)
            .await
            .expect("Failed to enqueue");
        created.insert(task.id);
    }

    let barrier = Arc::new(Barrier::new(NUM_WORKERS));
    let mut handles = Vec::new();
    for worker in 0..NUM_WORKERS {
        let dal = DAL::new(fixture.database.clone());
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            let mut claimed = Vec::new();
            for _ in 0..4 {
                let batch = dal
                    .delivery_task()
                    .claim_due(2, t0, Duration::seconds(90), &format!("worker-{worker}"))
                    .await
                    .expect("Claim failed");
                claimed.extend(batch.into_iter().map(|t| t.id));
            }
            claimed
        }));
    }

    let mut all = Vec::new();
    for handle in handles {
        all.extend(handle.await.expect("Worker panicked"));
    }

    let unique: HashSet<_> = all.iter().copied().collect();
    assert_eq!(
        all.len(),
        unique.len(),
        "some tasks were claimed by more than one worker"
    );
    assert_eq!(unique, created, "every due task should be claimed once");
}
