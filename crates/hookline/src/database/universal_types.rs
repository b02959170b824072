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

//! Backend-neutral identifier and timestamp wrappers.
//!
//! Domain types carry `UniversalUuid` and `UniversalTimestamp`. The
//! PostgreSQL models store native `Uuid`/`NaiveDateTime` columns and the
//! SQLite models store 16-byte blobs and fixed-width RFC 3339 text; both
//! convert at the DAL boundary.

use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque identifier for delivery tasks, claims and usage records.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct UniversalUuid(pub Uuid);

impl UniversalUuid {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Bytes for SQLite BLOB storage.
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, uuid::Error> {
        Uuid::from_slice(bytes).map(UniversalUuid)
    }
}

impl fmt::Display for UniversalUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for UniversalUuid {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<UniversalUuid> for Uuid {
    fn from(wrapper: UniversalUuid) -> Self {
        wrapper.0
    }
}

impl std::str::FromStr for UniversalUuid {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(UniversalUuid)
    }
}

/// UTC instant used for every lifecycle column.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct UniversalTimestamp(pub DateTime<Utc>);

impl UniversalTimestamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    pub fn into_inner(self) -> DateTime<Utc> {
        self.0
    }

    /// Fixed-width text form used by the SQLite backend.
    ///
    /// Always microsecond precision with a `Z` suffix, so string comparison
    /// in SQL orders the same way as the instants themselves.
    pub fn to_sqlite_string(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    pub fn from_rfc3339(s: &str) -> Result<Self, chrono::ParseError> {
        DateTime::parse_from_rfc3339(s).map(|dt| UniversalTimestamp(dt.with_timezone(&Utc)))
    }

    /// PostgreSQL `TIMESTAMP` value.
    pub fn to_naive(&self) -> chrono::NaiveDateTime {
        self.0.naive_utc()
    }

    pub fn from_naive(naive: chrono::NaiveDateTime) -> Self {
        UniversalTimestamp(Utc.from_utc_datetime(&naive))
    }

    /// Truncates to whole microseconds, the precision both backends keep.
    pub fn truncated(self) -> Self {
        let nanos = self.0.nanosecond();
        match self.0.with_nanosecond(nanos - nanos % 1_000) {
            Some(dt) => UniversalTimestamp(dt),
            None => self,
        }
    }

    /// Adds `delta`, saturating at the ends of the representable range.
    pub fn plus(self, delta: Duration) -> Self {
        match self.0.checked_add_signed(delta) {
            Some(dt) => UniversalTimestamp(dt),
            None if delta < Duration::zero() => UniversalTimestamp(DateTime::<Utc>::MIN_UTC),
            None => UniversalTimestamp(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// Unix seconds, as used in signature headers.
    pub fn unix_seconds(&self) -> i64 {
        self.0.timestamp()
    }
}

impl fmt::Display for UniversalTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for UniversalTimestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl From<UniversalTimestamp> for DateTime<Utc> {
    fn from(wrapper: UniversalTimestamp) -> Self {
        wrapper.0
    }
}

pub fn current_timestamp() -> UniversalTimestamp {
    UniversalTimestamp::now().truncated()
}
