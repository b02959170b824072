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


//! Claim leases across workers sharing one queue.

use std::collections::HashMap;
use std::time::Duration;

use hookline::models::DeliveryStatus;
use hookline::worker::{DeliveryWorkerConfig, ID_HEADER};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::fixtures::{
    directory_with, invoice_task, partner_at, recording_notifier, worker_with_config, TestFixture,
};

fn slow_lane_config(worker_id: &str) -> DeliveryWorkerConfig {
    DeliveryWorkerConfig::builder()
        .worker_id(worker_id)
        .batch_size(4)
        .max_concurrency(1)
        .request_timeout(Duration::from_secs(1))
        .claim_lease(Duration::from_millis(1500))
        .poll_interval(Duration::from_millis(50))
        .build()
}

#[tokio::test]
async fn test_queued_tasks_are_not_sent_after_lease_runs_short() {
    let fixture = TestFixture::sqlite().await;
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(900)))
        .mount(&server)
        .await;
    let endpoint = format!("{}/hooks", server.uri());

    let mut ids = Vec::new();
    for invoice in 0..4 {
        let task = fixture
            .dal
            .delivery_task()
            .enqueue(invoice_task(invoice))
            .await
            .unwrap();
        ids.push(task.id);
    }

    let (notifier, _) = recording_notifier();
    let worker_a = worker_with_config(
        &fixture.dal,
        directory_with(vec![partner_at(&endpoint)]),
        notifier.clone(),
        slow_lane_config("worker-a"),
    );
    let worker_b = worker_with_config(
        &fixture.dal,
        directory_with(vec![partner_at(&endpoint)]),
        notifier,
        slow_lane_config("worker-b"),
    );

    // B starts after A's lease has expired.
    let (report_a, report_b) = tokio::join!(worker_a.run_cycle(), async {
        tokio::time::sleep(Duration::from_millis(1700)).await;
        worker_b.run_cycle().await
    });
    let report_a = report_a.unwrap();
    let report_b = report_b.unwrap();

    // Only the first task fits in A's lease; the rest wait 900ms for the slot
    // and are handed back unsent.
    assert_eq!(report_a.claimed, 4);
    assert_eq!(report_a.delivered(), 1);
    assert_eq!(report_a.deferred(), 3);
    assert_eq!(report_a.stale(), 0);
    assert_eq!(report_b.stale(), 0);
    assert!(report_b.delivered() >= 1);

    for _ in 0..8 {
        let remaining = fixture
            .dal
            .delivery_task()
            .list(Some(DeliveryStatus::Retrying), 10)
            .await
            .unwrap();
        if remaining.is_empty() {
            break;
        }
        worker_a.run_cycle().await.unwrap();
    }

    let mut posts_per_task: HashMap<String, usize> = HashMap::new();
    for request in server.received_requests().await.expect("recording enabled") {
        let id = request
            .headers
            .get(ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        *posts_per_task.entry(id).or_default() += 1;
    }
    assert_eq!(posts_per_task.len(), 4);
    assert!(
        posts_per_task.values().all(|&count| count == 1),
        "a task was posted more than once: {posts_per_task:?}"
    );

    for id in ids {
        let task = fixture.dal.delivery_task().get(id).await.unwrap().unwrap();
        assert_eq!(task.status, DeliveryStatus::Success);
        assert_eq!(task.attempts, 1);
    }
}
