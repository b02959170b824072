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

//! Payload canonicalization and webhook signatures.

pub mod canonical;
pub mod signature;

pub use canonical::{canonical_json, canonicalize_str};
pub use signature::{
    compute_signature, sign, sign_at, sign_body, verify, verify_at, verify_body,
    SignatureError, SignatureHeader, SignedPayload, DEFAULT_TOLERANCE_SECS, SIGNATURE_HEADER,
};
