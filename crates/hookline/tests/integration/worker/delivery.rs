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


//! End-to-end delivery against a mock partner endpoint.

use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use chrono::{Duration, Utc};
use hookline::crypto::{verify_body, DEFAULT_TOLERANCE_SECS, SIGNATURE_HEADER};
use hookline::database::universal_types::current_timestamp;
use hookline::models::{DeliveryStatus, Transition};
use hookline::worker::{DeliveryWorkerConfig, TaskDisposition, ATTEMPT_HEADER, ID_HEADER};
use hookline::{Partner, RetryPolicy};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::fixtures::{
    directory_with, invoice_task, partner_at, recording_notifier, worker, worker_with_config,
    TestFixture, UnavailableDirectory, PARTNER_ID, PARTNER_SECRET,
};

async fn partner_server(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hooks"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;
    server
}

fn hooks_url(server: &MockServer) -> String {
    format!("{}/hooks", server.uri())
}

#[tokio::test]
async fn test_first_attempt_success() {
    let fixture = TestFixture::sqlite().await;
    let server = partner_server(200).await;
    let (notifier, escalations) = recording_notifier();
    let worker = worker(
        &fixture.dal,
        directory_with(vec![partner_at(&hooks_url(&server))]),
        notifier,
    );

    let t0 = current_timestamp();
    let task = fixture
        .dal
        .delivery_task()
        .enqueue_at(invoice_task(1), t0)
        .await
        .unwrap();

    let report = worker.run_cycle_at(t0).await.expect("cycle failed");
    assert_eq!(report.claimed, 1);
    assert_eq!(report.delivered(), 1);
    assert_eq!(
        report.disposition_of(task.id),
        Some(&TaskDisposition::Settled(Transition::Delivered))
    );

    let delivered = fixture.dal.delivery_task().get(task.id).await.unwrap().unwrap();
    assert_eq!(delivered.status, DeliveryStatus::Success);
    assert_eq!(delivered.attempts, 1);
    assert_eq!(delivered.last_response_status, Some(200));
    assert!(delivered.last_response_time_ms.is_some());
    assert_eq!(delivered.completed_at, Some(t0));

    let usage = fixture.dal.usage_record().list_for_task(task.id).await.unwrap();
    assert_eq!(usage.len(), 1);
    assert_eq!(usage[0].partner_id, PARTNER_ID);
    assert_eq!(usage[0].endpoint_url, hooks_url(&server));
    assert_eq!(usage[0].status_code, 200);

    assert!(escalations.messages().is_empty());

    // Nothing left to do.
    let idle = worker.run_cycle_at(t0.plus(Duration::hours(3))).await.unwrap();
    assert_eq!(idle.claimed, 0);
}

#[tokio::test]
async fn test_request_is_signed_and_identified() {
    let fixture = TestFixture::sqlite().await;
    let server = partner_server(202).await;
    let (notifier, _) = recording_notifier();
    let worker = worker(
        &fixture.dal,
        directory_with(vec![partner_at(&hooks_url(&server))]),
        notifier,
    );

    let task = fixture
        .dal
        .delivery_task()
        .enqueue(invoice_task(7))
        .await
        .unwrap();
    worker.run_cycle().await.unwrap();

    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 1);
    let request = &requests[0];

    let body = String::from_utf8(request.body.clone()).unwrap();
    assert_eq!(body, task.payload);

    let header = |name: &str| {
        request
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| panic!("missing {name} header"))
    };
    assert_eq!(header(ID_HEADER), task.id.to_string());
    assert_eq!(header(ATTEMPT_HEADER), "1");
    assert_eq!(header("content-type"), "application/json");

    let signature = header(SIGNATURE_HEADER);
    assert!(signature.starts_with("t="));
    verify_body(
        &body,
        &signature,
        PARTNER_SECRET,
        DEFAULT_TOLERANCE_SECS,
        Utc::now().timestamp(),
    )
    .expect("receiver should accept the signature");
    assert!(verify_body(
        &body,
        &signature,
        "wrong-secret",
        DEFAULT_TOLERANCE_SECS,
        Utc::now().timestamp()
    )
    .is_err());
}

#[tokio::test]
async fn test_failure_then_success_follows_backoff() {
    let fixture = TestFixture::sqlite().await;
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let (notifier, escalations) = recording_notifier();
    let worker = worker(
        &fixture.dal,
        directory_with(vec![partner_at(&hooks_url(&server))]),
        notifier,
    );

    let t0 = current_timestamp();
    let task = fixture
        .dal
        .delivery_task()
        .enqueue_at(invoice_task(1), t0)
        .await
        .unwrap();

    let first = worker.run_cycle_at(t0).await.unwrap();
    assert_eq!(first.retry_scheduled(), 1);

    let retrying = fixture.dal.delivery_task().get(task.id).await.unwrap().unwrap();
    assert_eq!(retrying.status, DeliveryStatus::Retrying);
    assert_eq!(retrying.attempts, 1);
    assert_eq!(retrying.next_retry_at, Some(t0.plus(Duration::seconds(30))));
    assert_eq!(retrying.last_response_status, Some(500));
    assert_eq!(
        retrying.last_error.as_deref(),
        Some("HTTP 500: upstream down")
    );

    let early = worker
        .run_cycle_at(t0.plus(Duration::seconds(29)))
        .await
        .unwrap();
    assert_eq!(early.claimed, 0, "task is not due before its retry time");

    let second = worker
        .run_cycle_at(t0.plus(Duration::seconds(30)))
        .await
        .unwrap();
    assert_eq!(second.delivered(), 1);

    let done = fixture.dal.delivery_task().get(task.id).await.unwrap().unwrap();
    assert_eq!(done.status, DeliveryStatus::Success);
    assert_eq!(done.attempts, 2);
    assert_eq!(done.last_error, None);
    assert_eq!(
        fixture.dal.usage_record().count_for_partner(PARTNER_ID).await.unwrap(),
        1
    );
    assert!(escalations.messages().is_empty());

    let requests = server.received_requests().await.unwrap();
    let attempts: Vec<_> = requests
        .iter()
        .map(|r| r.headers.get(ATTEMPT_HEADER).unwrap().to_str().unwrap().to_string())
        .collect();
    assert_eq!(attempts, vec!["1", "2"]);
}

#[tokio::test]
async fn test_connection_error_counts_as_failure() {
    let fixture = TestFixture::sqlite().await;
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let (notifier, _) = recording_notifier();
    let worker = worker(
        &fixture.dal,
        directory_with(vec![partner_at(&format!("http://127.0.0.1:{port}/hooks"))]),
        notifier,
    );

    let t0 = current_timestamp();
    let task = fixture
        .dal
        .delivery_task()
        .enqueue_at(invoice_task(1), t0)
        .await
        .unwrap();
    let report = worker.run_cycle_at(t0).await.unwrap();
    assert_eq!(report.retry_scheduled(), 1);

    let failed = fixture.dal.delivery_task().get(task.id).await.unwrap().unwrap();
    assert_eq!(failed.status, DeliveryStatus::Retrying);
    assert_eq!(failed.attempts, 1);
    assert_eq!(failed.last_response_status, None);
    assert!(failed.last_error.is_some());
}

#[tokio::test]
async fn test_slow_endpoint_times_out() {
    let fixture = TestFixture::sqlite().await;
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(StdDuration::from_secs(5)))
        .mount(&server)
        .await;

    let (notifier, _) = recording_notifier();
    let config = DeliveryWorkerConfig::builder()
        .worker_id("timeout-worker")
        .request_timeout(StdDuration::from_millis(300))
        .claim_lease(StdDuration::from_secs(10))
        .build();
    let worker = worker_with_config(
        &fixture.dal,
        directory_with(vec![partner_at(&hooks_url(&server))]),
        notifier,
        config,
    );

    let t0 = current_timestamp();
    let task = fixture
        .dal
        .delivery_task()
        .enqueue_at(invoice_task(1), t0)
        .await
        .unwrap();

    let started = Instant::now();
    worker.run_cycle_at(t0).await.unwrap();
    assert!(started.elapsed() < StdDuration::from_secs(4));

    let timed_out = fixture.dal.delivery_task().get(task.id).await.unwrap().unwrap();
    assert_eq!(timed_out.status, DeliveryStatus::Retrying);
    assert_eq!(timed_out.attempts, 1);
    assert!(timed_out
        .last_error
        .as_deref()
        .is_some_and(|e| e.starts_with("timeout")));
}

#[tokio::test]
async fn test_unknown_and_inactive_partners_fail_the_attempt() {
    let fixture = TestFixture::sqlite().await;
    let server = partner_server(200).await;
    let (notifier, _) = recording_notifier();
    let dormant = Partner::new("dormant", hooks_url(&server), "secret").inactive();
    let worker = worker(&fixture.dal, directory_with(vec![dormant]), notifier);

    let t0 = current_timestamp();
    let unknown = fixture
        .dal
        .delivery_task()
        .enqueue_at(invoice_task(1), t0)
        .await
        .unwrap();
    let inactive = fixture
        .dal
        .delivery_task()
        .enqueue_at(
            hookline::NewDeliveryTask::new("dormant", serde_json::json!({"event": "ping"})),
            t0,
        )
        .await
        .unwrap();

    let report = worker.run_cycle_at(t0).await.unwrap();
    assert_eq!(report.retry_scheduled(), 2);

    let unknown = fixture.dal.delivery_task().get(unknown.id).await.unwrap().unwrap();
    assert_eq!(unknown.attempts, 1);
    assert_eq!(unknown.last_error.as_deref(), Some("partner 'acme' not found"));

    let inactive = fixture.dal.delivery_task().get(inactive.id).await.unwrap().unwrap();
    assert_eq!(inactive.attempts, 1);
    assert_eq!(
        inactive.last_error.as_deref(),
        Some("partner 'dormant' is inactive")
    );

    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_directory_outage_releases_without_charging() {
    let fixture = TestFixture::sqlite().await;
    let (notifier, _) = recording_notifier();
    let worker = worker(&fixture.dal, Arc::new(UnavailableDirectory), notifier);

    let t0 = current_timestamp();
    let task = fixture
        .dal
        .delivery_task()
        .enqueue_at(invoice_task(1), t0)
        .await
        .unwrap();

    let report = worker.run_cycle_at(t0).await.unwrap();
    assert_eq!(report.released(), 1);

    let released = fixture.dal.delivery_task().get(task.id).await.unwrap().unwrap();
    assert_eq!(released.status, DeliveryStatus::Retrying);
    assert_eq!(released.attempts, 0);
    assert_eq!(released.next_retry_at, Some(t0));
    assert_eq!(released.locked_until, None);
}

#[tokio::test]
async fn test_permanent_rejection_fails_fast_when_enabled() {
    let fixture = TestFixture::sqlite().await;
    let server = partner_server(404).await;

    for (fail_fast, expected_status) in [
        (false, DeliveryStatus::Retrying),
        (true, DeliveryStatus::Failed),
    ] {
        let (notifier, escalations) = recording_notifier();
        let config = DeliveryWorkerConfig::builder()
            .worker_id("fail-fast-worker")
            .retry_policy(RetryPolicy::default().with_fail_fast_on_permanent_errors(fail_fast))
            .build();
        let worker = worker_with_config(
            &fixture.dal,
            directory_with(vec![partner_at(&hooks_url(&server))]),
            notifier,
            config,
        );

        let t0 = current_timestamp();
        let task = fixture
            .dal
            .delivery_task()
            .enqueue_at(invoice_task(1), t0)
            .await
            .unwrap();
        let report = worker.run_cycle_at(t0).await.unwrap();
        assert_eq!(report.claimed, 1);

        let after = fixture.dal.delivery_task().get(task.id).await.unwrap().unwrap();
        assert_eq!(after.status, expected_status);
        assert_eq!(after.attempts, 1);
        assert_eq!(escalations.messages().len(), usize::from(fail_fast));
        if fail_fast {
            assert_eq!(report.count(Transition::Abandoned), 1);
        }
    }
}

#[tokio::test]
async fn test_concurrency_is_bounded() {
    let fixture = TestFixture::sqlite().await;
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(StdDuration::from_millis(300)))
        .mount(&server)
        .await;

    let (notifier, _) = recording_notifier();
    let config = DeliveryWorkerConfig::builder()
        .worker_id("bounded-worker")
        .max_concurrency(2)
        .request_timeout(StdDuration::from_secs(5))
        .claim_lease(StdDuration::from_secs(30))
        .build();
    let worker = worker_with_config(
        &fixture.dal,
        directory_with(vec![partner_at(&hooks_url(&server))]),
        notifier,
        config,
    );

    let t0 = current_timestamp();
    for i in 0..6 {
        fixture
            .dal
            .delivery_task()
            .enqueue_at(invoice_task(i), t0)
            .await
            .unwrap();
    }

    let started = Instant::now();
    let report = worker.run_cycle_at(t0).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(report.delivered(), 6);
    // Six 300ms requests, two at a time, need at least three rounds.
    assert!(
        elapsed >= StdDuration::from_millis(850),
        "six requests finished in {elapsed:?} with a limit of two"
    );
}
