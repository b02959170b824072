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


use chrono::Duration;
use hookline::database::universal_types::current_timestamp;
use hookline::models::{AttemptResult, DeliveryOutcome, DeliveryTask, StatusSummary};
use hookline::{RetryPolicy, DAL};

use crate::fixtures::{invoice_task, TestFixture};

async fn settle(dal: &DAL, task: &DeliveryTask, result: AttemptResult) {
    let now = task.next_retry_at.unwrap_or(task.created_at);
    let outcome = DeliveryOutcome::from_attempt(task, &result, now, &RetryPolicy::default());
    dal.delivery_task()
        .record_outcome(task.id, task.claim_token.unwrap(), &outcome, now)
        .await
        .unwrap()
        .expect("claim holder should settle");
}

#[tokio::test]
async fn test_empty_queue_summary() {
    let fixture = TestFixture::sqlite().await;
    let summary = fixture.dal.delivery_task().status_summary().await.unwrap();
    assert_eq!(summary, StatusSummary::default());
}

#[tokio::test]
async fn test_summary_counts_rate_and_latency() {
    let fixture = TestFixture::sqlite().await;
    let dal = &fixture.dal;
    let t0 = current_timestamp();

    for i in 0..5 {
        dal.delivery_task()
            .enqueue_at(invoice_task(i).with_max_attempts(1), t0.plus(Duration::seconds(i as i64)))
            .await
            .unwrap();
    }

    let claimed = dal
        .delivery_task()
        .claim_due(4, t0.plus(Duration::seconds(10)), Duration::seconds(90), "w")
        .await
        .unwrap();
    assert_eq!(claimed.len(), 4);

    // Three successes at 100/200/300 ms, one permanent failure at 400 ms,
    // one task still pending, never attempted.
    for (task, ms) in claimed[..3].iter().zip([100, 200, 300]) {
        settle(
            dal,
            task,
            AttemptResult::Delivered {
                status_code: 200,
                response_time_ms: ms,
            },
        )
        .await;
    }
    settle(
        dal,
        &claimed[3],
        AttemptResult::Rejected {
            status_code: 502,
            response_time_ms: 400,
            body_excerpt: None,
        },
    )
    .await;

    let summary = dal.delivery_task().status_summary().await.unwrap();
    assert_eq!(summary.pending, 1);
    assert_eq!(summary.retrying, 0);
    assert_eq!(summary.success, 3);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.total, 5);
    assert_eq!(summary.success_rate, Some(0.75));
    assert_eq!(summary.average_latency_ms, Some(250.0));
}
