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


//! `run` and `run-once`.

use anyhow::Result;
use hookline::CycleReport;
use serde_json::json;
use tokio::sync::watch;
use tracing::info;

use super::build_worker;
use crate::config::HooklineConfig;

/// Runs the worker until Ctrl-C or SIGTERM. In-flight deliveries are
/// abandoned and released so the next worker picks them up without losing
/// an attempt.
pub async fn run(config: &HooklineConfig) -> Result<()> {
    let worker = build_worker(config).await?;
    let mut signals = ShutdownSignals::install()?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        let signal = signals.recv().await;
        info!(signal, "Shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    worker.run(shutdown_rx).await?;
    Ok(())
}

/// Process signals that stop the worker.
struct ShutdownSignals {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl ShutdownSignals {
    /// Registers the handlers immediately so a signal arriving before the
    /// first `recv` is not lost.
    fn install() -> std::io::Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            terminate: tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?,
        })
    }

    /// Waits for the next shutdown signal and returns its name.
    async fn recv(&mut self) -> &'static str {
        #[cfg(unix)]
        let terminate = self.terminate.recv();
        #[cfg(not(unix))]
        let terminate = std::future::pending::<Option<()>>();

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "Failed to listen for Ctrl-C; shutting down");
                }
                "SIGINT"
            }
            _ = terminate => "SIGTERM",
        }
    }
}

pub async fn run_once(config: &HooklineConfig, as_json: bool) -> Result<()> {
    let worker = build_worker(config).await?;
    let report = worker.run_cycle().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report_json(&report))?);
    } else {
        println!("claimed:          {}", report.claimed);
        println!("delivered:        {}", report.delivered());
        println!("retry scheduled:  {}", report.retry_scheduled());
        println!("failed:           {}", report.failed());
        println!("released:         {}", report.released());
        println!("deferred:         {}", report.deferred());
        println!("stale:            {}", report.stale());
        println!("errors:           {}", report.errors());
    }
    Ok(())
}

fn report_json(report: &CycleReport) -> serde_json::Value {
    json!({
        "claimed": report.claimed,
        "delivered": report.delivered(),
        "retry_scheduled": report.retry_scheduled(),
        "failed": report.failed(),
        "released": report.released(),
        "deferred": report.deferred(),
        "stale": report.stale(),
        "errors": report.errors(),
    })
}
