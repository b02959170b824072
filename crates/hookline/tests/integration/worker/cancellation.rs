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


//! Shutdown while deliveries are in flight.

use std::time::Duration as StdDuration;

use hookline::database::universal_types::current_timestamp;
use hookline::models::DeliveryStatus;
use hookline::worker::TaskDisposition;
use tokio::sync::watch;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use hookline::worker::DeliveryWorkerConfig;

use crate::fixtures::{
    directory_with, invoice_task, partner_at, recording_notifier, worker, worker_with_config,
    TestFixture,
};

#[tokio::test]
async fn test_shutdown_releases_in_flight_task() {
    let fixture = TestFixture::sqlite().await;
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(StdDuration::from_secs(5)))
        .mount(&server)
        .await;

    let (notifier, _) = recording_notifier();
    let config = DeliveryWorkerConfig::builder()
        .worker_id("shutdown-worker")
        .request_timeout(StdDuration::from_secs(20))
        .claim_lease(StdDuration::from_secs(60))
        .build();
    let worker = worker_with_config(
        &fixture.dal,
        directory_with(vec![partner_at(&server.uri())]),
        notifier,
        config,
    );

    let task = fixture.dal.delivery_task().enqueue(invoice_task(1)).await.unwrap();
    let due_at = task.next_retry_at;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let cycle = {
        let worker = worker.clone();
        tokio::spawn(async move { worker.run_cycle_until(shutdown_rx).await })
    };

    // Wait for the request to reach the endpoint, then pull the plug.
    for _ in 0..100 {
        if !server.received_requests().await.unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(StdDuration::from_millis(20)).await;
    }
    shutdown_tx.send(true).unwrap();

    let report = tokio::time::timeout(StdDuration::from_secs(2), cycle)
        .await
        .expect("cycle should stop promptly")
        .unwrap()
        .unwrap();
    assert_eq!(report.disposition_of(task.id), Some(&TaskDisposition::Released));

    let released = fixture.dal.delivery_task().get(task.id).await.unwrap().unwrap();
    assert_eq!(released.status, DeliveryStatus::Retrying);
    assert_eq!(released.attempts, 0);
    assert_eq!(released.next_retry_at, due_at);
    assert_eq!(released.locked_until, None);
    assert_eq!(released.claim_token, None);
}

#[tokio::test]
async fn test_run_loop_delivers_until_shutdown() {
    let fixture = TestFixture::sqlite().await;
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let (notifier, _) = recording_notifier();
    let worker = worker(
        &fixture.dal,
        directory_with(vec![partner_at(&server.uri())]),
        notifier,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let running = {
        let worker = worker.clone();
        tokio::spawn(async move { worker.run(shutdown_rx).await })
    };

    let task = fixture.dal.delivery_task().enqueue(invoice_task(1)).await.unwrap();

    let mut status = DeliveryStatus::Pending;
    for _ in 0..100 {
        status = fixture
            .dal
            .delivery_task()
            .get(task.id)
            .await
            .unwrap()
            .unwrap()
            .status;
        if status == DeliveryStatus::Success {
            break;
        }
        tokio::time::sleep(StdDuration::from_millis(50)).await;
    }
    assert_eq!(status, DeliveryStatus::Success);

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(StdDuration::from_secs(2), running)
        .await
        .expect("worker should stop after shutdown")
        .unwrap()
        .expect("run returned an error");
}
