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


//! `sign` and `verify`, for partners testing their receiving endpoint.

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use hookline::crypto::{sign_at, verify_body, SIGNATURE_HEADER};

pub fn sign(secret: &str, payload: &str, timestamp: Option<i64>) -> Result<()> {
    let (header, body) = signed_request(secret, payload, timestamp.unwrap_or_else(now))?;
    println!("{SIGNATURE_HEADER}: {header}");
    println!("{body}");
    Ok(())
}

pub fn verify(secret: &str, payload: &str, header: &str, tolerance_secs: i64) -> Result<()> {
    verify_body(payload, header, secret, tolerance_secs, now())
        .map_err(|e| anyhow!("Signature rejected: {}", e.reason()))?;
    println!("Signature valid");
    Ok(())
}

/// Returns the header value and the exact body that was signed.
fn signed_request(secret: &str, payload: &str, timestamp: i64) -> Result<(String, String)> {
    let value: serde_json::Value =
        serde_json::from_str(payload).context("Payload is not valid JSON")?;
    let signed = sign_at(&value, secret, timestamp);
    Ok((signed.header.to_string(), signed.body))
}

fn now() -> i64 {
    Utc::now().timestamp()
}
