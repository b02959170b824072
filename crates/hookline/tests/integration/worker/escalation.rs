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


//! Exhaustion and escalation.

use std::sync::Arc;

use chrono::Duration;
use hookline::database::universal_types::current_timestamp;
use hookline::escalation::EscalationNotifier;
use hookline::models::{DeliveryStatus, Transition};
use hookline::worker::TaskDisposition;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::fixtures::{
    directory_with, invoice_task, operators, partner_at, recording_notifier, worker,
    BrokenChannel, RecordingChannel, TestFixture,
};

async fn failing_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_five_failures_exhaust_and_escalate_once() {
    let fixture = TestFixture::sqlite().await;
    let server = failing_server().await;
    let (notifier, escalations) = recording_notifier();
    let worker = worker(
        &fixture.dal,
        directory_with(vec![partner_at(&format!("{}/hooks", server.uri()))]),
        notifier,
    );

    let t0 = current_timestamp();
    let task = fixture
        .dal
        .delivery_task()
        .enqueue_at(invoice_task(1), t0)
        .await
        .unwrap();

    let mut now = t0;
    let mut delays = Vec::new();
    for attempt in 1..=5 {
        let report = worker.run_cycle_at(now).await.unwrap();
        assert_eq!(report.claimed, 1, "attempt {attempt} should be claimed");

        let current = fixture.dal.delivery_task().get(task.id).await.unwrap().unwrap();
        assert_eq!(current.attempts, attempt);
        match current.next_retry_at {
            Some(next) => {
                delays.push((next.into_inner() - now.into_inner()).num_seconds());
                now = next;
            }
            None => assert_eq!(attempt, 5),
        }
    }
    assert_eq!(delays, vec![30, 120, 480, 1920]);

    let failed = fixture.dal.delivery_task().get(task.id).await.unwrap().unwrap();
    assert_eq!(failed.status, DeliveryStatus::Failed);
    assert_eq!(failed.attempts, 5);
    assert_eq!(failed.next_retry_at, None);
    assert!(failed.is_exhausted());
    assert_eq!(failed.last_response_status, Some(500));

    let messages = escalations.messages();
    assert_eq!(messages.len(), 1, "escalate exactly once");
    assert_eq!(messages[0].task_id, task.id);
    assert_eq!(messages[0].attempts, 5);
    assert_eq!(messages[0].partner_name, "Acme Corp");
    assert_eq!(messages[0].last_response_status, Some(500));

    // A failed task is never picked up again.
    let later = worker.run_cycle_at(now.plus(Duration::days(1))).await.unwrap();
    assert_eq!(later.claimed, 0);
    assert_eq!(escalations.messages().len(), 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 5);
    assert_eq!(
        fixture
            .dal
            .usage_record()
            .count_for_partner(&task.partner_id)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn test_single_attempt_task_escalates_immediately() {
    let fixture = TestFixture::sqlite().await;
    let server = failing_server().await;
    let (notifier, escalations) = recording_notifier();
    let worker = worker(
        &fixture.dal,
        directory_with(vec![partner_at(&server.uri())]),
        notifier,
    );

    let t0 = current_timestamp();
    let task = fixture
        .dal
        .delivery_task()
        .enqueue_at(invoice_task(1).with_max_attempts(1), t0)
        .await
        .unwrap();

    let report = worker.run_cycle_at(t0).await.unwrap();
    assert_eq!(
        report.disposition_of(task.id),
        Some(&TaskDisposition::Settled(Transition::Exhausted))
    );
    assert_eq!(escalations.messages().len(), 1);
}

#[tokio::test]
async fn test_broken_channel_does_not_affect_delivery_state() {
    let fixture = TestFixture::sqlite().await;
    let server = failing_server().await;
    let recording = Arc::new(RecordingChannel::default());
    let notifier = EscalationNotifier::new(operators())
        .with_channel(Arc::new(BrokenChannel))
        .with_channel(recording.clone());
    let worker = worker(
        &fixture.dal,
        directory_with(vec![partner_at(&server.uri())]),
        Arc::new(notifier),
    );

    let t0 = current_timestamp();
    let task = fixture
        .dal
        .delivery_task()
        .enqueue_at(invoice_task(1).with_max_attempts(1), t0)
        .await
        .unwrap();

    let report = worker.run_cycle_at(t0).await.expect("escalation errors are swallowed");
    assert_eq!(report.failed(), 1);
    assert_eq!(report.errors(), 0);

    let failed = fixture.dal.delivery_task().get(task.id).await.unwrap().unwrap();
    assert_eq!(failed.status, DeliveryStatus::Failed);
    // The healthy channel still got the message.
    assert_eq!(recording.messages().len(), 1);
}

#[tokio::test]
async fn test_notifier_with_no_channels_still_settles() {
    let fixture = TestFixture::sqlite().await;
    let server = failing_server().await;
    let notifier = Arc::new(EscalationNotifier::new(operators()));
    let worker = worker(
        &fixture.dal,
        directory_with(vec![partner_at(&server.uri())]),
        notifier,
    );

    let t0 = current_timestamp();
    fixture
        .dal
        .delivery_task()
        .enqueue_at(invoice_task(1).with_max_attempts(1), t0)
        .await
        .unwrap();

    let report = worker.run_cycle_at(t0).await.unwrap();
    assert_eq!(report.failed(), 1);
}
