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


//! Read-only queue inspection: `stats`, `list` and `show`.

use anyhow::{anyhow, Context, Result};
use hookline::{DeliveryStatus, DeliveryTask, StatusSummary, UniversalUuid};

use super::connect;
use crate::config::HooklineConfig;

pub async fn stats(config: &HooklineConfig, as_json: bool) -> Result<()> {
    let dal = connect(config).await?;
    let summary = dal.delivery_task().status_summary().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", format_summary(&summary));
    }
    Ok(())
}

pub async fn list(
    config: &HooklineConfig,
    status: Option<DeliveryStatus>,
    limit: i64,
    as_json: bool,
) -> Result<()> {
    let dal = connect(config).await?;
    let tasks = dal.delivery_task().list(status, limit).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&tasks)?);
        return Ok(());
    }
    if tasks.is_empty() {
        println!("No delivery tasks");
        return Ok(());
    }
    println!(
        "{:<36}  {:<16}  {:<8}  {:>8}  {}",
        "ID", "PARTNER", "STATUS", "ATTEMPTS", "NEXT RETRY"
    );
    for task in &tasks {
        println!("{}", format_row(task));
    }
    Ok(())
}

pub async fn show(config: &HooklineConfig, id: &str, as_json: bool) -> Result<()> {
    let id: UniversalUuid = id
        .parse()
        .with_context(|| format!("'{id}' is not a task id"))?;
    let dal = connect(config).await?;
    let task = dal
        .delivery_task()
        .get(id)
        .await?
        .ok_or_else(|| anyhow!("Delivery task {id} not found"))?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&task)?);
        return Ok(());
    }

    println!("id:              {}", task.id);
    println!("partner:         {}", task.partner_id);
    println!("status:          {}", task.status);
    println!("attempts:        {}/{}", task.attempts, task.max_attempts);
    println!("created:         {}", task.created_at);
    println!("next retry:      {}", optional(task.next_retry_at));
    println!("last attempt:    {}", optional(task.last_attempt_at));
    println!("completed:       {}", optional(task.completed_at));
    println!("last status:     {}", optional(task.last_response_status));
    println!("last latency ms: {}", optional(task.last_response_time_ms));
    println!("last error:      {}", task.last_error.as_deref().unwrap_or("-"));
    println!("payload:         {}", task.payload);
    Ok(())
}

fn optional<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

fn format_row(task: &DeliveryTask) -> String {
    format!(
        "{:<36}  {:<16}  {:<8}  {:>8}  {}",
        task.id,
        task.partner_id,
        task.status.as_str(),
        format!("{}/{}", task.attempts, task.max_attempts),
        optional(task.next_retry_at),
    )
}

fn format_summary(summary: &StatusSummary) -> String {
    let rate = summary
        .success_rate
        .map(|r| format!("{:.1}%", r * 100.0))
        .unwrap_or_else(|| "-".to_string());
    let latency = summary
        .average_latency_ms
        .map(|ms| format!("{ms:.0} ms"))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "pending:       {}\nretrying:      {}\nsuccess:       {}\nfailed:        {}\ntotal:         {}\nsuccess rate:  {}\navg latency:   {}\n",
        summary.pending,
        summary.retrying,
        summary.success,
        summary.failed,
        summary.total,
        rate,
        latency
    )
}
