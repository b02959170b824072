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

//! HMAC-SHA256 webhook signatures.
//!
//! A signature binds the canonical payload to the Unix time it was produced:
//!
//! ```text
//! X-Webhook-Signature: t=<unix seconds>,v1=<hex(HMAC-SHA256(secret, "<t>.<canonical json>"))>
//! ```
//!
//! Receivers parse the header, reject timestamps more than the tolerance
//! (300 s by default) away from their clock, recompute the MAC with the
//! shared secret, and compare in constant time.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

use super::canonical::{canonical_json, canonicalize_str};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature on outbound requests.
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Maximum clock skew accepted by [`verify`].
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

const SCHEME_V1: &str = "v1";
const HEX_SIGNATURE_LEN: usize = 64;

/// Why a signature was rejected. Checks run in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("bad format")]
    BadFormat,
    #[error("stale")]
    Stale,
    #[error("signature mismatch")]
    Mismatch,
}

impl SignatureError {
    pub fn reason(&self) -> &'static str {
        match self {
            SignatureError::BadFormat => "bad format",
            SignatureError::Stale => "stale",
            SignatureError::Mismatch => "signature mismatch",
        }
    }
}

/// Parsed `t=...,v1=...` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    /// Lowercase hex MAC.
    pub signature: String,
}

impl fmt::Display for SignatureHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={},{}={}", self.timestamp, SCHEME_V1, self.signature)
    }
}

impl FromStr for SignatureHeader {
    type Err = SignatureError;

    /// Accepts `t` and `v1` in any order; unknown schemes are ignored so
    /// receivers keep working if further schemes are added.
    fn from_str(header: &str) -> Result<Self, Self::Err> {
        let mut timestamp = None;
        let mut signature = None;

        for part in header.split(',') {
            let (key, value) = part
                .trim()
                .split_once('=')
                .ok_or(SignatureError::BadFormat)?;
            match key {
                "t" => {
                    if timestamp.is_some() {
                        return Err(SignatureError::BadFormat);
                    }
                    let parsed = value
                        .parse::<i64>()
                        .map_err(|_| SignatureError::BadFormat)?;
                    timestamp = Some(parsed);
                }
                SCHEME_V1 => {
                    if signature.is_some() {
                        return Err(SignatureError::BadFormat);
                    }
                    if value.len() != HEX_SIGNATURE_LEN
                        || !value.bytes().all(|b| b.is_ascii_hexdigit())
                    {
                        return Err(SignatureError::BadFormat);
                    }
                    signature = Some(value.to_ascii_lowercase());
                }
                _ => {}
            }
        }

        match (timestamp, signature) {
            (Some(timestamp), Some(signature)) => Ok(SignatureHeader {
                timestamp,
                signature,
            }),
            _ => Err(SignatureError::BadFormat),
        }
    }
}

/// Canonical body plus the header to send with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPayload {
    pub body: String,
    pub header: SignatureHeader,
}

/// Raw MAC over `"{timestamp}.{body}"`.
fn compute_mac(secret: &str, timestamp: i64, body: &str) -> HmacSha256 {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body.as_bytes());
    mac
}

/// Hex signature of an already-canonical `body` at `timestamp`.
pub fn compute_signature(secret: &str, timestamp: i64, body: &str) -> String {
    hex::encode(compute_mac(secret, timestamp, body).finalize().into_bytes())
}

/// Signs `payload` with the current time.
pub fn sign(payload: &Value, secret: &str) -> SignedPayload {
    sign_at(payload, secret, Utc::now().timestamp())
}

pub fn sign_at(payload: &Value, secret: &str, timestamp: i64) -> SignedPayload {
    let body = canonical_json(payload);
    let header = sign_body(&body, secret, timestamp);
    SignedPayload { body, header }
}

/// Signs a body that is already canonical JSON, such as a stored payload.
pub fn sign_body(body: &str, secret: &str, timestamp: i64) -> SignatureHeader {
    SignatureHeader {
        timestamp,
        signature: compute_signature(secret, timestamp, body),
    }
}

/// Verifies `header` for `payload` against the current clock with the
/// default tolerance.
pub fn verify(payload: &Value, header: &str, secret: &str) -> Result<(), SignatureError> {
    verify_at(
        payload,
        header,
        secret,
        DEFAULT_TOLERANCE_SECS,
        Utc::now().timestamp(),
    )
}

/// Verifies against an explicit clock reading and tolerance.
pub fn verify_at(
    payload: &Value,
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<(), SignatureError> {
    verify_canonical(&canonical_json(payload), header, secret, tolerance_secs, now)
}

/// Verifies a raw request body. JSON bodies are canonicalized first so the
/// check does not depend on the receiver's framework re-encoding the body.
pub fn verify_body(
    body: &str,
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<(), SignatureError> {
    match canonicalize_str(body) {
        Ok(canonical) => verify_canonical(&canonical, header, secret, tolerance_secs, now),
        Err(_) => verify_canonical(body, header, secret, tolerance_secs, now),
    }
}

fn verify_canonical(
    body: &str,
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<(), SignatureError> {
    let parsed: SignatureHeader = header.parse()?;

    if now.abs_diff(parsed.timestamp) > tolerance_secs.unsigned_abs() {
        return Err(SignatureError::Stale);
    }

    let provided = hex::decode(&parsed.signature).map_err(|_| SignatureError::BadFormat)?;
    let expected = compute_mac(secret, parsed.timestamp, body)
        .finalize()
        .into_bytes();

    if bool::from(expected.as_slice().ct_eq(provided.as_slice())) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}
