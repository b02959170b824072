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


use std::io::Read;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use hookline::NewDeliveryTask;

use super::connect;
use crate::config::HooklineConfig;

pub async fn run(
    config: &HooklineConfig,
    partner: &str,
    payload: Option<&str>,
    payload_file: Option<&Path>,
    max_attempts: Option<i32>,
) -> Result<()> {
    let raw = match (payload, payload_file) {
        (Some(inline), _) => inline.to_string(),
        (None, Some(path)) => read_payload_file(path)?,
        (None, None) => return Err(anyhow!("Either --payload or --payload-file is required")),
    };
    let payload = parse_payload(&raw)?;

    if !config.partners.iter().any(|p| p.id == partner) {
        tracing::warn!(partner_id = %partner, "Partner is not in the local configuration");
    }

    let dal = connect(config).await?;
    let task = dal
        .delivery_task()
        .enqueue(
            NewDeliveryTask::new(partner, payload)
                .with_max_attempts(max_attempts.unwrap_or(config.retry.max_attempts)),
        )
        .await
        .context("Failed to enqueue delivery")?;

    println!("{}", task.id);
    Ok(())
}

fn read_payload_file(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read payload from stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read payload file {}", path.display()))
}

fn parse_payload(raw: &str) -> Result<serde_json::Value> {
    let value: serde_json::Value =
        serde_json::from_str(raw).context("Payload is not valid JSON")?;
    if !value.is_object() {
        return Err(anyhow!("Payload must be a JSON object"));
    }
    Ok(value)
}
